//! `syncs` table: the change ledger
//!
//! One row per `(type, id)`. Recording an action for a key that already has
//! an entry replaces it, so the latest write wins.

use std::fmt;
use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::error::{StorageError, StorageResult};
use crate::models::EntityType;

/// What happened to an entity since the last successful push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Modified,
    Deleted,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Modified => "modified",
            SyncAction::Deleted => "deleted",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "modified" => Ok(SyncAction::Modified),
            "deleted" => Ok(SyncAction::Deleted),
            other => Err(format!("Unknown sync action '{}'", other)),
        }
    }
}

/// A pending change
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerEntry {
    pub entity_type: EntityType,
    pub id: String,
    pub action: SyncAction,
}

impl LedgerEntry {
    pub fn new(entity_type: EntityType, id: impl Into<String>, action: SyncAction) -> Self {
        Self {
            entity_type,
            id: id.into(),
            action,
        }
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn hydrate((entity_type, id, action): (String, String, String)) -> StorageResult<LedgerEntry> {
    let entity_type = entity_type
        .parse::<EntityType>()
        .map_err(|e| StorageError::InvalidRecord {
            table: "syncs",
            id: id.clone(),
            details: e.to_string(),
        })?;
    let action = action
        .parse::<SyncAction>()
        .map_err(|details| StorageError::InvalidRecord {
            table: "syncs",
            id: id.clone(),
            details,
        })?;
    Ok(LedgerEntry {
        entity_type,
        id,
        action,
    })
}

/// Upsert the entry for `(entity_type, id)`
pub fn record(
    conn: &Connection,
    entity_type: EntityType,
    id: &str,
    action: SyncAction,
) -> StorageResult<()> {
    conn.prepare_cached("INSERT OR REPLACE INTO syncs (type, id, action) VALUES (?1, ?2, ?3)")?
        .execute(params![entity_type.as_str(), id, action.as_str()])?;
    Ok(())
}

pub fn find(conn: &Connection, entity_type: EntityType, id: &str) -> StorageResult<Option<LedgerEntry>> {
    let row = conn
        .query_row(
            "SELECT type, id, action FROM syncs WHERE type = ?1 AND id = ?2",
            params![entity_type.as_str(), id],
            from_row,
        )
        .optional()?;
    row.map(hydrate).transpose()
}

/// Every pending change, ordered by key
pub fn list(conn: &Connection) -> StorageResult<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare("SELECT type, id, action FROM syncs ORDER BY type, id")?;
    let rows = stmt.query_map([], from_row)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(hydrate(row?)?);
    }
    Ok(entries)
}

pub fn count(conn: &Connection) -> StorageResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM syncs", [], |row| row.get(0))?)
}

/// Drop the entry for `(entity_type, id)`; returns whether one existed
pub fn remove(conn: &Connection, entity_type: EntityType, id: &str) -> StorageResult<bool> {
    let removed = conn
        .prepare_cached("DELETE FROM syncs WHERE type = ?1 AND id = ?2")?
        .execute(params![entity_type.as_str(), id])?;
    Ok(removed > 0)
}

pub fn remove_all(conn: &Connection) -> StorageResult<usize> {
    Ok(conn.execute("DELETE FROM syncs", [])?)
}
