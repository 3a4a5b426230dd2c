use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::types::policy::{AiApplication, AiApplicationConfig};

use super::{decode_list, encode_list};

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS ai_application (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    application_key TEXT NOT NULL UNIQUE,
    enabled INTEGER NOT NULL,
    vector_db_id INTEGER
);

CREATE TABLE IF NOT EXISTS ai_application_config (
    application_id INTEGER PRIMARY KEY NOT NULL,
    allowed_users TEXT NOT NULL,
    allowed_groups TEXT NOT NULL,
    denied_users TEXT NOT NULL,
    denied_groups TEXT NOT NULL
);
"#;

pub fn create_application_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

pub fn create_application(
    tx: &Transaction,
    mut app: AiApplication,
    vector_db_id: Option<u64>,
) -> Result<AiApplication> {
    let sql = "INSERT INTO ai_application (name, application_key, enabled, vector_db_id) VALUES (?, ?, ?, ?)";
    debug!("Database create_application: {sql}, {app:?}");
    tx.execute(
        sql,
        params![app.name, app.application_key, app.enabled, vector_db_id],
    )?;
    app.id = tx.last_insert_rowid() as u64;
    Ok(app)
}

pub fn get_application(tx: &Transaction, application_key: &str) -> Result<Option<AiApplication>> {
    let sql = "SELECT id, name, application_key, enabled FROM ai_application WHERE application_key = ?";
    debug!("Database get_application: {sql}, {application_key}");
    let mut stmt = tx.prepare(sql)?;
    let app = stmt
        .query_row(params![application_key], |row| {
            Ok(AiApplication {
                id: row.get(0)?,
                name: row.get(1)?,
                application_key: row.get(2)?,
                enabled: row.get(3)?,
            })
        })
        .optional()?;
    Ok(app)
}

pub fn set_application_enabled(tx: &Transaction, application_id: u64, enabled: bool) -> Result<()> {
    let sql = "UPDATE ai_application SET enabled = ? WHERE id = ?";
    debug!("Database set_application_enabled: {sql}, {application_id}, {enabled}");
    tx.execute(sql, params![enabled, application_id])?;
    Ok(())
}

pub fn put_application_config(tx: &Transaction, cfg: &AiApplicationConfig) -> Result<()> {
    let sql = r#"
    INSERT OR REPLACE INTO ai_application_config
        (application_id, allowed_users, allowed_groups, denied_users, denied_groups)
    VALUES (?, ?, ?, ?, ?)
    "#;
    debug!("Database put_application_config: {cfg:?}");
    tx.execute(
        sql,
        params![
            cfg.application_id,
            encode_list(&cfg.allowed_users)?,
            encode_list(&cfg.allowed_groups)?,
            encode_list(&cfg.denied_users)?,
            encode_list(&cfg.denied_groups)?,
        ],
    )?;
    Ok(())
}

pub fn get_application_config(
    tx: &Transaction,
    application_id: u64,
) -> Result<Option<AiApplicationConfig>> {
    let sql = r#"
    SELECT application_id, allowed_users, allowed_groups, denied_users, denied_groups
    FROM ai_application_config WHERE application_id = ?
    "#;
    debug!("Database get_application_config: {application_id}");
    let mut stmt = tx.prepare(sql)?;
    let cfg = stmt
        .query_row(params![application_id], |row| {
            Ok(AiApplicationConfig {
                application_id: row.get(0)?,
                allowed_users: decode_list(row, 1)?,
                allowed_groups: decode_list(row, 2)?,
                denied_users: decode_list(row, 3)?,
                denied_groups: decode_list(row, 4)?,
            })
        })
        .optional()?;
    Ok(cfg)
}
