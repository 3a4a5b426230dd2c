use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::types::policy::{VectorDb, VectorDbPolicy};

use super::{decode_list, decode_parsed, encode_list};

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS vector_db (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    db_type TEXT NOT NULL,
    user_enforcement INTEGER NOT NULL,
    group_enforcement INTEGER NOT NULL,
    enabled INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS vector_db_policy (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version INTEGER NOT NULL,
    vector_db_id INTEGER NOT NULL,
    allowed_users TEXT NOT NULL,
    allowed_groups TEXT NOT NULL,
    allowed_roles TEXT NOT NULL,
    denied_users TEXT NOT NULL,
    denied_groups TEXT NOT NULL,
    denied_roles TEXT NOT NULL,
    metadata_key TEXT NOT NULL,
    metadata_value TEXT NOT NULL,
    operator TEXT
);

CREATE INDEX IF NOT EXISTS idx_vector_db_policy_db ON vector_db_policy(vector_db_id);
"#;

pub fn create_vector_db_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

pub fn create_vector_db(tx: &Transaction, mut db: VectorDb) -> Result<VectorDb> {
    let sql = r#"
    INSERT INTO vector_db (name, db_type, user_enforcement, group_enforcement, enabled)
    VALUES (?, ?, ?, ?, ?)
    "#;
    debug!("Database create_vector_db: {db:?}");
    tx.execute(
        sql,
        params![
            db.name,
            db.db_type.as_str(),
            db.user_enforcement,
            db.group_enforcement,
            db.enabled,
        ],
    )?;
    db.id = tx.last_insert_rowid() as u64;
    Ok(db)
}

pub fn get_application_vector_db(tx: &Transaction, application_id: u64) -> Result<Option<VectorDb>> {
    let sql = r#"
    SELECT v.id, v.name, v.db_type, v.user_enforcement, v.group_enforcement, v.enabled
    FROM vector_db v JOIN ai_application a ON a.vector_db_id = v.id
    WHERE a.id = ?
    "#;
    debug!("Database get_application_vector_db: {application_id}");
    let mut stmt = tx.prepare(sql)?;
    let db = stmt
        .query_row(params![application_id], |row| {
            Ok(VectorDb {
                id: row.get(0)?,
                name: row.get(1)?,
                db_type: decode_parsed(row, 2)?,
                user_enforcement: row.get(3)?,
                group_enforcement: row.get(4)?,
                enabled: row.get(5)?,
            })
        })
        .optional()?;
    Ok(db)
}

pub fn create_vector_db_policy(tx: &Transaction, mut policy: VectorDbPolicy) -> Result<VectorDbPolicy> {
    let sql = r#"
    INSERT INTO vector_db_policy
        (version, vector_db_id, allowed_users, allowed_groups, allowed_roles,
         denied_users, denied_groups, denied_roles, metadata_key, metadata_value, operator)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    "#;
    debug!("Database create_vector_db_policy: {policy:?}");
    tx.execute(
        sql,
        params![
            policy.version,
            policy.vector_db_id,
            encode_list(&policy.allowed_users)?,
            encode_list(&policy.allowed_groups)?,
            encode_list(&policy.allowed_roles)?,
            encode_list(&policy.denied_users)?,
            encode_list(&policy.denied_groups)?,
            encode_list(&policy.denied_roles)?,
            policy.metadata_key,
            policy.metadata_value,
            policy.operator,
        ],
    )?;
    policy.id = tx.last_insert_rowid() as u64;
    Ok(policy)
}

pub fn list_vector_db_policies(tx: &Transaction, vector_db_id: u64) -> Result<Vec<VectorDbPolicy>> {
    let sql = r#"
    SELECT id, version, vector_db_id, allowed_users, allowed_groups, allowed_roles,
           denied_users, denied_groups, denied_roles, metadata_key, metadata_value, operator
    FROM vector_db_policy WHERE vector_db_id = ? ORDER BY id ASC
    "#;
    debug!("Database list_vector_db_policies: {vector_db_id}");
    let mut stmt = tx.prepare(sql)?;
    let policies = stmt
        .query_map(params![vector_db_id], |row| {
            Ok(VectorDbPolicy {
                id: row.get(0)?,
                version: row.get(1)?,
                vector_db_id: row.get(2)?,
                allowed_users: decode_list(row, 3)?,
                allowed_groups: decode_list(row, 4)?,
                allowed_roles: decode_list(row, 5)?,
                denied_users: decode_list(row, 6)?,
                denied_groups: decode_list(row, 7)?,
                denied_roles: decode_list(row, 8)?,
                metadata_key: row.get(9)?,
                metadata_value: row.get(10)?,
                operator: row.get(11)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(policies)
}
