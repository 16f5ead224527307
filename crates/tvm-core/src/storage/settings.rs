//! `settings` table access

use rusqlite::{params, Connection, OptionalExtension};

use super::error::StorageResult;
use crate::models::Setting;

pub fn get(conn: &Connection, name: &str) -> StorageResult<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM settings WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set(conn: &Connection, setting: &Setting) -> StorageResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (name, value) VALUES (?1, ?2)",
        params![setting.name, setting.value],
    )?;
    Ok(())
}

pub fn remove(conn: &Connection, name: &str) -> StorageResult<bool> {
    Ok(conn.execute("DELETE FROM settings WHERE name = ?1", params![name])? > 0)
}
