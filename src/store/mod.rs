#[cfg(test)]
mod tests;

pub mod cache;
pub mod config;
pub mod factory;
pub mod seed;
pub mod sqlite;

use std::cell::RefCell;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use cache::{Cache, DisableCache, UnionCache};
use log::debug;
use sqlite::{Sqlite, SqliteTransaction};

use crate::types::policy::{
    AiApplication, AiApplicationConfig, AiApplicationPolicy, RequestType, VectorDb,
    VectorDbPolicy,
};

/// Read access to the governance data an authorization decision needs.
///
/// Every lookup is keyed by the request, implementations may cache freely as
/// long as the returned data is already narrowed to the requester.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn get_application(&self, application_key: &str) -> Result<Option<AiApplication>>;

    async fn get_application_config(
        &self,
        application_id: u64,
    ) -> Result<Option<AiApplicationConfig>>;

    /// Policies of the application whose tags intersect `traits`, ordered by
    /// id.
    async fn get_policies(
        &self,
        application_id: u64,
        request_type: RequestType,
        traits: &[String],
    ) -> Result<Vec<AiApplicationPolicy>>;

    async fn get_user_groups(&self, user_id: &str) -> Result<Vec<String>>;

    /// The vector database attached to the application, if any.
    async fn get_vector_db(&self, application_id: u64) -> Result<Option<VectorDb>>;

    /// Vector db policies naming the user or one of the groups in an allow or
    /// deny list.
    async fn get_vector_db_policies(
        &self,
        vector_db_id: u64,
        user_id: &str,
        groups: &[String],
    ) -> Result<Vec<VectorDbPolicy>>;
}

/// Database connection trait that can create transactions
pub trait Connection<'a, T>
where
    T: Transaction + 'a,
{
    fn transaction(&'a mut self) -> Result<T>;
}

/// All operations on the governance tables.
///
/// Reads are used by [`PolicyStore`]; the create operations exist for the
/// governance layer and for seeding test data.
pub trait Transaction {
    // Application operations
    fn create_application(
        &self,
        app: AiApplication,
        vector_db_id: Option<u64>,
    ) -> Result<AiApplication>;
    fn get_application(&self, application_key: &str) -> Result<Option<AiApplication>>;
    fn set_application_enabled(&self, application_id: u64, enabled: bool) -> Result<()>;
    fn put_application_config(&self, cfg: &AiApplicationConfig) -> Result<()>;
    fn get_application_config(&self, application_id: u64) -> Result<Option<AiApplicationConfig>>;

    // Policy operations
    fn create_policy(&self, policy: AiApplicationPolicy) -> Result<AiApplicationPolicy>;
    fn list_policies(&self, application_id: u64) -> Result<Vec<AiApplicationPolicy>>;
    fn delete_policy(&self, id: u64) -> Result<()>;

    // User group operations
    fn add_user_group(&self, user_id: &str, group: &str) -> Result<()>;
    fn list_user_groups(&self, user_id: &str) -> Result<Vec<String>>;

    // Vector db operations
    fn create_vector_db(&self, db: VectorDb) -> Result<VectorDb>;
    fn get_application_vector_db(&self, application_id: u64) -> Result<Option<VectorDb>>;
    fn create_vector_db_policy(&self, policy: VectorDbPolicy) -> Result<VectorDbPolicy>;
    fn list_vector_db_policies(&self, vector_db_id: u64) -> Result<Vec<VectorDbPolicy>>;

    fn commit(self) -> Result<()>;
    fn rollback(self) -> Result<()>;
}

/// The governance database, optionally fronted by a cache.
pub struct Database {
    ctx: Mutex<DatabaseContext>,
}

pub enum UnionConnection {
    Sqlite(Sqlite),
}

enum UnionTransaction<'a> {
    Sqlite(SqliteTransaction<'a>),
}

struct DatabaseContext {
    conn: RefCell<UnionConnection>,
    cache: Option<UnionCache>,
    no_cache: DisableCache,
}

impl Database {
    pub fn new(conn: UnionConnection, cache: Option<UnionCache>) -> Self {
        Self {
            ctx: Mutex::new(DatabaseContext {
                conn: RefCell::new(conn),
                cache,
                no_cache: DisableCache,
            }),
        }
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        use cache::memory::MemoryCache;
        use std::time::Duration;

        let sqlite = Sqlite::memory().unwrap();
        let cache = MemoryCache::new(16, Duration::from_secs(60));
        Self::new(UnionConnection::Sqlite(sqlite), Some(UnionCache::Memory(cache)))
    }

    /// Runs `f` inside a transaction. The transaction is committed when `f`
    /// succeeds and rolled back otherwise.
    ///
    /// `f` receives the cache when one is configured, or a no-op cache.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Transaction, &dyn Cache) -> Result<T>,
    {
        let ctx = match self.ctx.lock() {
            Ok(ctx) => ctx,
            Err(e) => bail!("failed to lock database: {e:#}"),
        };
        let mut conn = ctx.conn.borrow_mut();
        let tx = conn.transaction()?;

        let result = if let Some(ref cache) = ctx.cache {
            f(&tx, cache)
        } else {
            f(&tx, &ctx.no_cache)
        };

        if result.is_ok() {
            tx.commit()
        } else {
            tx.rollback()
        }?;

        result
    }

    /// Drops every cached entry. Call after any governance change.
    pub fn invalidate(&self) -> Result<()> {
        let ctx = match self.ctx.lock() {
            Ok(ctx) => ctx,
            Err(e) => bail!("failed to lock database: {e:#}"),
        };
        if let Some(ref cache) = ctx.cache {
            debug!("Invalidate database cache");
            cache.clear()?;
        }
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for Database {
    async fn get_application(&self, application_key: &str) -> Result<Option<AiApplication>> {
        self.with_transaction(|tx, cache| {
            if let Some(app) = cache.get_application(application_key)? {
                return Ok(Some(app));
            }

            let app = tx.get_application(application_key)?;
            if let Some(ref app) = app {
                cache.save_application(application_key, app.clone())?;
            }
            Ok(app)
        })
    }

    async fn get_application_config(
        &self,
        application_id: u64,
    ) -> Result<Option<AiApplicationConfig>> {
        self.with_transaction(|tx, cache| {
            if let Some(cfg) = cache.get_application_config(application_id)? {
                return Ok(Some(cfg));
            }

            let cfg = tx.get_application_config(application_id)?;
            if let Some(ref cfg) = cfg {
                cache.save_application_config(application_id, cfg.clone())?;
            }
            Ok(cfg)
        })
    }

    async fn get_policies(
        &self,
        application_id: u64,
        _request_type: RequestType,
        traits: &[String],
    ) -> Result<Vec<AiApplicationPolicy>> {
        let policies = self.with_transaction(|tx, cache| {
            if let Some(policies) = cache.list_policies(application_id)? {
                return Ok(policies);
            }

            let policies = tx.list_policies(application_id)?;
            cache.save_policies(application_id, policies.clone())?;
            Ok(policies)
        })?;

        Ok(policies
            .into_iter()
            .filter(|p| p.has_any_tag(traits))
            .collect())
    }

    async fn get_user_groups(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_transaction(|tx, cache| {
            if let Some(groups) = cache.list_user_groups(user_id)? {
                return Ok(groups);
            }

            let groups = tx.list_user_groups(user_id)?;
            cache.save_user_groups(user_id, groups.clone())?;
            Ok(groups)
        })
    }

    async fn get_vector_db(&self, application_id: u64) -> Result<Option<VectorDb>> {
        self.with_transaction(|tx, cache| {
            if let Some(db) = cache.get_vector_db(application_id)? {
                return Ok(Some(db));
            }

            let db = tx.get_application_vector_db(application_id)?;
            if let Some(ref db) = db {
                cache.save_vector_db(application_id, db.clone())?;
            }
            Ok(db)
        })
    }

    async fn get_vector_db_policies(
        &self,
        vector_db_id: u64,
        user_id: &str,
        groups: &[String],
    ) -> Result<Vec<VectorDbPolicy>> {
        let policies = self.with_transaction(|tx, cache| {
            if let Some(policies) = cache.list_vector_db_policies(vector_db_id)? {
                return Ok(policies);
            }

            let policies = tx.list_vector_db_policies(vector_db_id)?;
            cache.save_vector_db_policies(vector_db_id, policies.clone())?;
            Ok(policies)
        })?;

        Ok(policies
            .into_iter()
            .filter(|p| p.mentions(user_id, groups))
            .collect())
    }
}

impl<'a> Connection<'a, UnionTransaction<'a>> for UnionConnection {
    fn transaction(&'a mut self) -> Result<UnionTransaction<'a>> {
        match self {
            UnionConnection::Sqlite(sqlite) => sqlite.transaction().map(UnionTransaction::Sqlite),
        }
    }
}

impl Transaction for UnionTransaction<'_> {
    fn create_application(
        &self,
        app: AiApplication,
        vector_db_id: Option<u64>,
    ) -> Result<AiApplication> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_application(app, vector_db_id),
        }
    }

    fn get_application(&self, application_key: &str) -> Result<Option<AiApplication>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_application(application_key),
        }
    }

    fn set_application_enabled(&self, application_id: u64, enabled: bool) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.set_application_enabled(application_id, enabled),
        }
    }

    fn put_application_config(&self, cfg: &AiApplicationConfig) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.put_application_config(cfg),
        }
    }

    fn get_application_config(&self, application_id: u64) -> Result<Option<AiApplicationConfig>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_application_config(application_id),
        }
    }

    fn create_policy(&self, policy: AiApplicationPolicy) -> Result<AiApplicationPolicy> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_policy(policy),
        }
    }

    fn list_policies(&self, application_id: u64) -> Result<Vec<AiApplicationPolicy>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_policies(application_id),
        }
    }

    fn delete_policy(&self, id: u64) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.delete_policy(id),
        }
    }

    fn add_user_group(&self, user_id: &str, group: &str) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.add_user_group(user_id, group),
        }
    }

    fn list_user_groups(&self, user_id: &str) -> Result<Vec<String>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_user_groups(user_id),
        }
    }

    fn create_vector_db(&self, db: VectorDb) -> Result<VectorDb> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_vector_db(db),
        }
    }

    fn get_application_vector_db(&self, application_id: u64) -> Result<Option<VectorDb>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.get_application_vector_db(application_id),
        }
    }

    fn create_vector_db_policy(&self, policy: VectorDbPolicy) -> Result<VectorDbPolicy> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.create_vector_db_policy(policy),
        }
    }

    fn list_vector_db_policies(&self, vector_db_id: u64) -> Result<Vec<VectorDbPolicy>> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.list_vector_db_policies(vector_db_id),
        }
    }

    fn commit(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.commit(),
        }
    }

    fn rollback(self) -> Result<()> {
        match self {
            UnionTransaction::Sqlite(tx) => tx.rollback(),
        }
    }
}

#[cfg(test)]
mod store_tests {
    use crate::types::policy::{Permission, VectorDbType};

    use super::*;

    fn seed(db: &Database) -> (AiApplication, VectorDb) {
        db.with_transaction(|tx, _cache| {
            let vector_db = tx.create_vector_db(VectorDb {
                id: 0,
                name: String::from("docs"),
                db_type: VectorDbType::OpenSearch,
                user_enforcement: false,
                group_enforcement: true,
                enabled: true,
            })?;
            let app = tx.create_application(
                AiApplication {
                    id: 0,
                    name: String::from("assistant"),
                    application_key: String::from("assistant-key"),
                    enabled: true,
                },
                Some(vector_db.id),
            )?;
            for tags in [vec!["EMAIL"], vec!["SSN", "PHONE"]] {
                tx.create_policy(AiApplicationPolicy {
                    id: 0,
                    application_id: app.id,
                    tags: tags.into_iter().map(String::from).collect(),
                    users: vec![],
                    groups: vec![],
                    roles: vec![],
                    prompt: Permission::Redact,
                    reply: Permission::Allow,
                    enriched_prompt: Permission::Allow,
                })?;
            }
            tx.create_vector_db_policy(VectorDbPolicy {
                vector_db_id: vector_db.id,
                allowed_groups: vec![String::from("eng")],
                metadata_key: String::from("team"),
                metadata_value: String::from("core"),
                ..Default::default()
            })?;
            tx.create_vector_db_policy(VectorDbPolicy {
                vector_db_id: vector_db.id,
                denied_users: vec![String::from("mallory")],
                metadata_key: String::from("team"),
                metadata_value: String::from("secret"),
                ..Default::default()
            })?;
            tx.add_user_group("alice", "eng")?;
            Ok((app, vector_db))
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_policies_filtered_by_traits() {
        let db = Database::new_test();
        let (app, _) = seed(&db);

        let traits = vec![String::from("PHONE")];
        let policies = db
            .get_policies(app.id, RequestType::Prompt, &traits)
            .await
            .unwrap();
        assert_eq!(policies.len(), 1);
        assert!(policies[0].has_tag("SSN"));

        let policies = db
            .get_policies(app.id, RequestType::Reply, &[])
            .await
            .unwrap();
        assert!(policies.is_empty());
    }

    #[tokio::test]
    async fn test_vector_db_policies_filtered_by_principal() {
        let db = Database::new_test();
        let (app, vector_db) = seed(&db);

        assert_eq!(db.get_vector_db(app.id).await.unwrap(), Some(vector_db.clone()));

        let groups = db.get_user_groups("alice").await.unwrap();
        assert_eq!(groups, vec!["eng"]);
        let policies = db
            .get_vector_db_policies(vector_db.id, "alice", &groups)
            .await
            .unwrap();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].metadata_value, "core");

        let policies = db
            .get_vector_db_policies(vector_db.id, "mallory", &[])
            .await
            .unwrap();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].metadata_value, "secret");

        let policies = db
            .get_vector_db_policies(vector_db.id, "nobody", &[])
            .await
            .unwrap();
        assert!(policies.is_empty());
    }

    #[tokio::test]
    async fn test_cache_and_invalidate() {
        let db = Database::new_test();
        let (app, _) = seed(&db);

        let got = db.get_application("assistant-key").await.unwrap().unwrap();
        assert!(got.enabled);

        db.with_transaction(|tx, _cache| tx.set_application_enabled(app.id, false))
            .unwrap();

        // Served from cache until invalidated
        let got = db.get_application("assistant-key").await.unwrap().unwrap();
        assert!(got.enabled);

        db.invalidate().unwrap();
        let got = db.get_application("assistant-key").await.unwrap().unwrap();
        assert!(!got.enabled);

        assert!(db.get_application("missing").await.unwrap().is_none());
        assert!(db.get_application_config(app.id).await.unwrap().is_none());
    }
}
