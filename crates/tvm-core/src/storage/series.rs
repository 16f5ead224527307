//! `series` table access

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::error::StorageResult;
use crate::models::Series;

const COLUMNS: &str = "id, name, program_id, now_showing";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Series> {
    Ok(Series {
        id: row.get(0)?,
        name: row.get(1)?,
        program_id: row.get(2)?,
        now_showing: row.get(3)?,
    })
}

/// Insert or replace a series by id
pub fn upsert(conn: &Connection, series: &Series) -> StorageResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO series (id, name, program_id, now_showing) VALUES (?1, ?2, ?3, ?4)",
        params![series.id, series.name, series.program_id, series.now_showing],
    )?;
    Ok(())
}

pub fn find(conn: &Connection, id: &str) -> StorageResult<Option<Series>> {
    let series = conn
        .prepare_cached(&format!("SELECT {} FROM series WHERE id = ?1", COLUMNS))?
        .query_row(params![id], from_row)
        .optional()?;
    Ok(series)
}

/// Series owned by a program (program_id index)
pub fn list_by_program(conn: &Connection, program_id: &str) -> StorageResult<Vec<Series>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM series WHERE program_id = ?1",
        COLUMNS
    ))?;
    let series = stmt
        .query_map(params![program_id], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(series)
}

/// Ids of the series owned by a program
pub fn ids_by_program(conn: &Connection, program_id: &str) -> StorageResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM series WHERE program_id = ?1")?;
    let ids = stmt
        .query_map(params![program_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// Series with a weekday set (now_showing index)
pub fn list_now_showing(conn: &Connection) -> StorageResult<Vec<Series>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM series WHERE now_showing IS NOT NULL",
        COLUMNS
    ))?;
    let series = stmt
        .query_map([], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(series)
}

pub fn count(conn: &Connection) -> StorageResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM series", [], |row| row.get(0))?)
}

/// Delete one series row; returns whether it existed
pub fn delete(conn: &Connection, id: &str) -> StorageResult<bool> {
    Ok(conn.execute("DELETE FROM series WHERE id = ?1", params![id])? > 0)
}

pub fn delete_all(conn: &Connection) -> StorageResult<usize> {
    Ok(conn.execute("DELETE FROM series", [])?)
}
