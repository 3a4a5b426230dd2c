use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, Transaction};

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS user_group (
    user_id TEXT NOT NULL,
    group_name TEXT NOT NULL,
    PRIMARY KEY (user_id, group_name)
);
"#;

pub fn create_user_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

pub fn add_user_group(tx: &Transaction, user_id: &str, group: &str) -> Result<()> {
    let sql = "INSERT OR IGNORE INTO user_group (user_id, group_name) VALUES (?, ?)";
    debug!("Database add_user_group: {sql}, {user_id}, {group}");
    tx.execute(sql, params![user_id, group])?;
    Ok(())
}

pub fn list_user_groups(tx: &Transaction, user_id: &str) -> Result<Vec<String>> {
    let sql = "SELECT group_name FROM user_group WHERE user_id = ? ORDER BY group_name ASC";
    debug!("Database list_user_groups: {sql}, {user_id}");
    let mut stmt = tx.prepare(sql)?;
    let groups = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(groups)
}
