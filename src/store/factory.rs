use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use super::cache::memory::MemoryCache;
use super::cache::UnionCache;
use super::config::{CacheConfig, CacheType, DbConfig, DbType};
use super::sqlite::Sqlite;
use super::{Database, UnionConnection};

/// Opens the governance store described by a completed [`DbConfig`].
pub struct DbFactory;

impl DbFactory {
    pub fn new() -> Self {
        Self
    }

    /// Builds the shared [`Database`] handed to `AuthzService`.
    ///
    /// # Arguments
    /// * `cfg` - The `[db]` section, already completed against a `PathSet`
    ///
    /// # Returns
    /// * The database with its tables created, fronted by the configured cache
    pub fn build_db(&self, cfg: &DbConfig) -> Result<Arc<Database>> {
        let conn = match cfg.name {
            DbType::Sqlite if cfg.sqlite.memory => {
                warn!("Governance data is kept in memory and lost on exit");
                UnionConnection::Sqlite(Sqlite::memory()?)
            }
            DbType::Sqlite => {
                info!("Open governance store at {}", cfg.sqlite.path);
                let sqlite = Sqlite::open(Path::new(&cfg.sqlite.path), cfg.sqlite.busy_timeout())
                    .with_context(|| format!("open sqlite '{}'", cfg.sqlite.path))?;
                UnionConnection::Sqlite(sqlite)
            }
        };

        let cache = self.build_cache(&cfg.cache);
        Ok(Arc::new(Database::new(conn, cache)))
    }

    fn build_cache(&self, cfg: &CacheConfig) -> Option<UnionCache> {
        if !cfg.enable {
            info!("Governance cache is disabled, every decision reads the database");
            return None;
        }

        match cfg.name {
            CacheType::Memory => {
                info!(
                    "Governance cache in memory, {} entries per lookup, idle after {}s",
                    cfg.capacity, cfg.idle_secs
                );
                let cache = MemoryCache::new(cfg.capacity, cfg.idle());
                Some(UnionCache::Memory(cache))
            }
        }
    }
}

impl Default for DbFactory {
    fn default() -> Self {
        Self::new()
    }
}
