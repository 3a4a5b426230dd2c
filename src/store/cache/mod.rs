pub mod memory;


use anyhow::Result;
use memory::MemoryCache;

use crate::types::policy::{
    AiApplication, AiApplicationConfig, AiApplicationPolicy, VectorDb, VectorDbPolicy,
};

/// Request independent governance data kept in front of the database.
pub trait Cache {
    fn get_application(&self, application_key: &str) -> Result<Option<AiApplication>>;
    fn save_application(&self, application_key: &str, app: AiApplication) -> Result<()>;

    fn get_application_config(&self, application_id: u64) -> Result<Option<AiApplicationConfig>>;
    fn save_application_config(&self, application_id: u64, cfg: AiApplicationConfig)
        -> Result<()>;

    fn list_policies(&self, application_id: u64) -> Result<Option<Vec<AiApplicationPolicy>>>;
    fn save_policies(&self, application_id: u64, policies: Vec<AiApplicationPolicy>)
        -> Result<()>;

    fn list_user_groups(&self, user_id: &str) -> Result<Option<Vec<String>>>;
    fn save_user_groups(&self, user_id: &str, groups: Vec<String>) -> Result<()>;

    fn get_vector_db(&self, application_id: u64) -> Result<Option<VectorDb>>;
    fn save_vector_db(&self, application_id: u64, db: VectorDb) -> Result<()>;

    fn list_vector_db_policies(&self, vector_db_id: u64) -> Result<Option<Vec<VectorDbPolicy>>>;
    fn save_vector_db_policies(&self, vector_db_id: u64, policies: Vec<VectorDbPolicy>)
        -> Result<()>;

    fn clear(&self) -> Result<()>;
}

pub enum UnionCache {
    Memory(MemoryCache),
}

impl Cache for UnionCache {
    fn get_application(&self, application_key: &str) -> Result<Option<AiApplication>> {
        match self {
            Self::Memory(cache) => cache.get_application(application_key),
        }
    }

    fn save_application(&self, application_key: &str, app: AiApplication) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.save_application(application_key, app),
        }
    }

    fn get_application_config(&self, application_id: u64) -> Result<Option<AiApplicationConfig>> {
        match self {
            Self::Memory(cache) => cache.get_application_config(application_id),
        }
    }

    fn save_application_config(
        &self,
        application_id: u64,
        cfg: AiApplicationConfig,
    ) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.save_application_config(application_id, cfg),
        }
    }

    fn list_policies(&self, application_id: u64) -> Result<Option<Vec<AiApplicationPolicy>>> {
        match self {
            Self::Memory(cache) => cache.list_policies(application_id),
        }
    }

    fn save_policies(
        &self,
        application_id: u64,
        policies: Vec<AiApplicationPolicy>,
    ) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.save_policies(application_id, policies),
        }
    }

    fn list_user_groups(&self, user_id: &str) -> Result<Option<Vec<String>>> {
        match self {
            Self::Memory(cache) => cache.list_user_groups(user_id),
        }
    }

    fn save_user_groups(&self, user_id: &str, groups: Vec<String>) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.save_user_groups(user_id, groups),
        }
    }

    fn get_vector_db(&self, application_id: u64) -> Result<Option<VectorDb>> {
        match self {
            Self::Memory(cache) => cache.get_vector_db(application_id),
        }
    }

    fn save_vector_db(&self, application_id: u64, db: VectorDb) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.save_vector_db(application_id, db),
        }
    }

    fn list_vector_db_policies(&self, vector_db_id: u64) -> Result<Option<Vec<VectorDbPolicy>>> {
        match self {
            Self::Memory(cache) => cache.list_vector_db_policies(vector_db_id),
        }
    }

    fn save_vector_db_policies(
        &self,
        vector_db_id: u64,
        policies: Vec<VectorDbPolicy>,
    ) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.save_vector_db_policies(vector_db_id, policies),
        }
    }

    fn clear(&self) -> Result<()> {
        match self {
            Self::Memory(cache) => cache.clear(),
        }
    }
}

/// A cache that never holds anything, used when caching is disabled.
#[derive(Debug, Clone, Copy)]
pub struct DisableCache;

impl Cache for DisableCache {
    fn get_application(&self, _application_key: &str) -> Result<Option<AiApplication>> {
        Ok(None)
    }

    fn save_application(&self, _application_key: &str, _app: AiApplication) -> Result<()> {
        Ok(())
    }

    fn get_application_config(&self, _application_id: u64) -> Result<Option<AiApplicationConfig>> {
        Ok(None)
    }

    fn save_application_config(
        &self,
        _application_id: u64,
        _cfg: AiApplicationConfig,
    ) -> Result<()> {
        Ok(())
    }

    fn list_policies(&self, _application_id: u64) -> Result<Option<Vec<AiApplicationPolicy>>> {
        Ok(None)
    }

    fn save_policies(
        &self,
        _application_id: u64,
        _policies: Vec<AiApplicationPolicy>,
    ) -> Result<()> {
        Ok(())
    }

    fn list_user_groups(&self, _user_id: &str) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    fn save_user_groups(&self, _user_id: &str, _groups: Vec<String>) -> Result<()> {
        Ok(())
    }

    fn get_vector_db(&self, _application_id: u64) -> Result<Option<VectorDb>> {
        Ok(None)
    }

    fn save_vector_db(&self, _application_id: u64, _db: VectorDb) -> Result<()> {
        Ok(())
    }

    fn list_vector_db_policies(&self, _vector_db_id: u64) -> Result<Option<Vec<VectorDbPolicy>>> {
        Ok(None)
    }

    fn save_vector_db_policies(
        &self,
        _vector_db_id: u64,
        _policies: Vec<VectorDbPolicy>,
    ) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }
}
