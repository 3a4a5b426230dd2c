use std::cell::RefCell;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use anyhow::Result;
use lru::LruCache;

use crate::types::policy::{
    AiApplication, AiApplicationConfig, AiApplicationPolicy, VectorDb, VectorDbPolicy,
};

use super::Cache;

/// A bounded map evicting the least recently used entry when full, and any
/// entry not read for `idle`. Each entry carries the instant of its last read.
pub struct LruMap<K: Hash + Eq, V> {
    idle: Duration,
    entries: RefCell<LruCache<K, (V, Instant)>>,
}

impl<K, V> LruMap<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    pub fn new(capacity: usize, idle: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            idle,
            entries: RefCell::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.borrow_mut();
        let (value, last_access) = entries.get_mut(key)?;
        if last_access.elapsed() >= self.idle {
            entries.pop(key);
            return None;
        }

        *last_access = Instant::now();
        Some(value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.borrow_mut().put(key, (value, Instant::now()));
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// In process cache, one LRU map per lookup kind. Each map holds at most
/// `capacity` entries.
pub struct MemoryCache {
    applications: LruMap<String, AiApplication>,
    configs: LruMap<u64, AiApplicationConfig>,
    policies: LruMap<u64, Vec<AiApplicationPolicy>>,
    user_groups: LruMap<String, Vec<String>>,
    vector_dbs: LruMap<u64, VectorDb>,
    vector_db_policies: LruMap<u64, Vec<VectorDbPolicy>>,
}

impl MemoryCache {
    pub fn new(capacity: usize, idle: Duration) -> Self {
        Self {
            applications: LruMap::new(capacity, idle),
            configs: LruMap::new(capacity, idle),
            policies: LruMap::new(capacity, idle),
            user_groups: LruMap::new(capacity, idle),
            vector_dbs: LruMap::new(capacity, idle),
            vector_db_policies: LruMap::new(capacity, idle),
        }
    }
}

impl Cache for MemoryCache {
    fn get_application(&self, application_key: &str) -> Result<Option<AiApplication>> {
        Ok(self.applications.get(&application_key.to_string()))
    }

    fn save_application(&self, application_key: &str, app: AiApplication) -> Result<()> {
        self.applications.insert(application_key.to_string(), app);
        Ok(())
    }

    fn get_application_config(&self, application_id: u64) -> Result<Option<AiApplicationConfig>> {
        Ok(self.configs.get(&application_id))
    }

    fn save_application_config(
        &self,
        application_id: u64,
        cfg: AiApplicationConfig,
    ) -> Result<()> {
        self.configs.insert(application_id, cfg);
        Ok(())
    }

    fn list_policies(&self, application_id: u64) -> Result<Option<Vec<AiApplicationPolicy>>> {
        Ok(self.policies.get(&application_id))
    }

    fn save_policies(
        &self,
        application_id: u64,
        policies: Vec<AiApplicationPolicy>,
    ) -> Result<()> {
        self.policies.insert(application_id, policies);
        Ok(())
    }

    fn list_user_groups(&self, user_id: &str) -> Result<Option<Vec<String>>> {
        Ok(self.user_groups.get(&user_id.to_string()))
    }

    fn save_user_groups(&self, user_id: &str, groups: Vec<String>) -> Result<()> {
        self.user_groups.insert(user_id.to_string(), groups);
        Ok(())
    }

    fn get_vector_db(&self, application_id: u64) -> Result<Option<VectorDb>> {
        Ok(self.vector_dbs.get(&application_id))
    }

    fn save_vector_db(&self, application_id: u64, db: VectorDb) -> Result<()> {
        self.vector_dbs.insert(application_id, db);
        Ok(())
    }

    fn list_vector_db_policies(&self, vector_db_id: u64) -> Result<Option<Vec<VectorDbPolicy>>> {
        Ok(self.vector_db_policies.get(&vector_db_id))
    }

    fn save_vector_db_policies(
        &self,
        vector_db_id: u64,
        policies: Vec<VectorDbPolicy>,
    ) -> Result<()> {
        self.vector_db_policies.insert(vector_db_id, policies);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.applications.clear();
        self.configs.clear();
        self.policies.clear();
        self.user_groups.clear();
        self.vector_dbs.clear();
        self.vector_db_policies.clear();
        Ok(())
    }
}
