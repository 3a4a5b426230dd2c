use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{ensure_dir_exists, expandenv, CommonConfig, PathSet};

/// The `[db]` section: where governance data lives and how much of it is kept
/// in memory between decisions.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DbConfig {
    #[serde(default)]
    pub name: DbType,

    #[serde(default)]
    pub sqlite: SqliteConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default)]
pub enum DbType {
    #[serde(rename = "sqlite")]
    #[default]
    Sqlite,
}

impl CommonConfig for DbConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        match self.name {
            DbType::Sqlite => self.sqlite.complete(ps).context("sqlite")?,
        }
        self.cache.complete(ps).context("cache")?;
        Ok(())
    }
}

/// The `[db.sqlite]` section.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SqliteConfig {
    /// Keep governance data in memory only. It is gone on exit, so this is
    /// meant for tests and dry runs of `import`.
    #[serde(default)]
    pub memory: bool,

    /// Database file, defaults to `<data_path>/governance.db`. Environment
    /// variables are expanded.
    #[serde(default)]
    pub path: String,

    /// How long a decision waits for a governance writer to release the file.
    #[serde(default = "SqliteConfig::default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            memory: false,
            path: String::new(),
            busy_timeout_ms: Self::default_busy_timeout_ms(),
        }
    }
}

impl CommonConfig for SqliteConfig {
    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        if self.memory {
            return Ok(());
        }

        self.path = expandenv("path", &self.path)?;
        if self.path.is_empty() {
            let path = ps.data_path.join("governance.db");
            self.path = format!("{}", path.display());
        }
        if let Some(dir) = std::path::Path::new(&self.path).parent() {
            if !dir.as_os_str().is_empty() {
                ensure_dir_exists(dir).context("ensure database directory")?;
            }
        }

        Ok(())
    }
}

impl SqliteConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    fn default_busy_timeout_ms() -> u64 {
        5000
    }
}

/// The `[db.cache]` section. Cached lookups are keyed by application,
/// user and vector db, never by request.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "CacheConfig::default_enable")]
    pub enable: bool,

    #[serde(default)]
    pub name: CacheType,

    /// Maximum entries per lookup kind.
    #[serde(default = "CacheConfig::default_capacity")]
    pub capacity: usize,

    /// Entries not read for this many seconds are dropped.
    #[serde(default = "CacheConfig::default_idle_secs")]
    pub idle_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default)]
pub enum CacheType {
    /// Process local cache. Running several instances against one database
    /// means each must be invalidated on governance changes.
    #[serde(rename = "memory")]
    #[default]
    Memory,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable: Self::default_enable(),
            name: CacheType::default(),
            capacity: Self::default_capacity(),
            idle_secs: Self::default_idle_secs(),
        }
    }
}

impl CommonConfig for CacheConfig {
    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        if !self.enable {
            return Ok(());
        }
        if self.capacity == 0 {
            bail!("capacity must be greater than 0");
        }
        if self.idle_secs == 0 {
            bail!("idle_secs must be greater than 0");
        }
        Ok(())
    }
}

impl CacheConfig {
    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    fn default_enable() -> bool {
        true
    }

    fn default_capacity() -> usize {
        1024
    }

    fn default_idle_secs() -> u64 {
        600
    }
}
