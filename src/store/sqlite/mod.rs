mod application;
mod policy;
mod user;
mod vector_db;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::Connection as RawConnection;
use rusqlite::Row;
use rusqlite::Transaction as RawTransaction;

use crate::types::policy::{
    AiApplication, AiApplicationConfig, AiApplicationPolicy, VectorDb, VectorDbPolicy,
};

use super::{Connection, Transaction};

/// SQLite backed governance store. Supports both file based and in-memory
/// databases.
pub struct Sqlite {
    conn: RawConnection,
}

pub struct SqliteTransaction<'a> {
    tx: RawTransaction<'a>,
}

impl Sqlite {
    /// Opens a SQLite database file, creating it and the tables when missing.
    /// Readers wait up to `busy_timeout` for a concurrent writer.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = RawConnection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::init_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database, mostly useful for testing.
    pub fn memory() -> Result<Self> {
        let conn = RawConnection::open_in_memory()?;
        Self::init_tables(&conn)?;
        Ok(Self { conn })
    }

    fn init_tables(conn: &RawConnection) -> Result<()> {
        application::create_application_tables(conn)?;
        policy::create_policy_tables(conn)?;
        user::create_user_tables(conn)?;
        vector_db::create_vector_db_tables(conn)?;
        Ok(())
    }
}

impl<'a> Connection<'a, SqliteTransaction<'a>> for Sqlite {
    fn transaction(&'a mut self) -> Result<SqliteTransaction<'a>> {
        let tx = self.conn.transaction()?;
        Ok(SqliteTransaction { tx })
    }
}

impl Transaction for SqliteTransaction<'_> {
    fn create_application(
        &self,
        app: AiApplication,
        vector_db_id: Option<u64>,
    ) -> Result<AiApplication> {
        application::create_application(&self.tx, app, vector_db_id)
    }

    fn get_application(&self, application_key: &str) -> Result<Option<AiApplication>> {
        application::get_application(&self.tx, application_key)
    }

    fn set_application_enabled(&self, application_id: u64, enabled: bool) -> Result<()> {
        application::set_application_enabled(&self.tx, application_id, enabled)
    }

    fn put_application_config(&self, cfg: &AiApplicationConfig) -> Result<()> {
        application::put_application_config(&self.tx, cfg)
    }

    fn get_application_config(&self, application_id: u64) -> Result<Option<AiApplicationConfig>> {
        application::get_application_config(&self.tx, application_id)
    }

    fn create_policy(&self, policy: AiApplicationPolicy) -> Result<AiApplicationPolicy> {
        policy::create_policy(&self.tx, policy)
    }

    fn list_policies(&self, application_id: u64) -> Result<Vec<AiApplicationPolicy>> {
        policy::list_policies(&self.tx, application_id)
    }

    fn delete_policy(&self, id: u64) -> Result<()> {
        policy::delete_policy(&self.tx, id)
    }

    fn add_user_group(&self, user_id: &str, group: &str) -> Result<()> {
        user::add_user_group(&self.tx, user_id, group)
    }

    fn list_user_groups(&self, user_id: &str) -> Result<Vec<String>> {
        user::list_user_groups(&self.tx, user_id)
    }

    fn create_vector_db(&self, db: VectorDb) -> Result<VectorDb> {
        vector_db::create_vector_db(&self.tx, db)
    }

    fn get_application_vector_db(&self, application_id: u64) -> Result<Option<VectorDb>> {
        vector_db::get_application_vector_db(&self.tx, application_id)
    }

    fn create_vector_db_policy(&self, policy: VectorDbPolicy) -> Result<VectorDbPolicy> {
        vector_db::create_vector_db_policy(&self.tx, policy)
    }

    fn list_vector_db_policies(&self, vector_db_id: u64) -> Result<Vec<VectorDbPolicy>> {
        vector_db::list_vector_db_policies(&self.tx, vector_db_id)
    }

    fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

/// List columns are stored as JSON arrays in TEXT columns.
fn encode_list(list: &[String]) -> Result<String> {
    Ok(serde_json::to_string(list)?)
}

fn decode_list(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parses a TEXT column with `FromStr`, reporting failures as a column
/// conversion error.
fn decode_parsed<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}
