use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, Transaction};

use crate::types::policy::AiApplicationPolicy;

use super::{decode_list, decode_parsed, encode_list};

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS ai_application_policy (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    application_id INTEGER NOT NULL,
    tags TEXT NOT NULL,
    principal_users TEXT NOT NULL,
    principal_groups TEXT NOT NULL,
    principal_roles TEXT NOT NULL,
    prompt TEXT NOT NULL,
    reply TEXT NOT NULL,
    enriched_prompt TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_policy_application ON ai_application_policy(application_id);
"#;

pub fn create_policy_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

pub fn create_policy(
    tx: &Transaction,
    mut policy: AiApplicationPolicy,
) -> Result<AiApplicationPolicy> {
    let sql = r#"
    INSERT INTO ai_application_policy
        (application_id, tags, principal_users, principal_groups, principal_roles,
         prompt, reply, enriched_prompt)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    "#;
    debug!("Database create_policy: {policy:?}");
    tx.execute(
        sql,
        params![
            policy.application_id,
            encode_list(&policy.tags)?,
            encode_list(&policy.users)?,
            encode_list(&policy.groups)?,
            encode_list(&policy.roles)?,
            policy.prompt.as_str(),
            policy.reply.as_str(),
            policy.enriched_prompt.as_str(),
        ],
    )?;
    policy.id = tx.last_insert_rowid() as u64;
    Ok(policy)
}

pub fn list_policies(tx: &Transaction, application_id: u64) -> Result<Vec<AiApplicationPolicy>> {
    let sql = r#"
    SELECT id, application_id, tags, principal_users, principal_groups, principal_roles,
           prompt, reply, enriched_prompt
    FROM ai_application_policy WHERE application_id = ? ORDER BY id ASC
    "#;
    debug!("Database list_policies: {application_id}");
    let mut stmt = tx.prepare(sql)?;
    let policies = stmt
        .query_map(params![application_id], |row| {
            Ok(AiApplicationPolicy {
                id: row.get(0)?,
                application_id: row.get(1)?,
                tags: decode_list(row, 2)?,
                users: decode_list(row, 3)?,
                groups: decode_list(row, 4)?,
                roles: decode_list(row, 5)?,
                prompt: decode_parsed(row, 6)?,
                reply: decode_parsed(row, 7)?,
                enriched_prompt: decode_parsed(row, 8)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(policies)
}

pub fn delete_policy(tx: &Transaction, id: u64) -> Result<()> {
    let sql = "DELETE FROM ai_application_policy WHERE id = ?";
    debug!("Database delete_policy: {sql}, {id}");
    tx.execute(sql, params![id])?;
    Ok(())
}
