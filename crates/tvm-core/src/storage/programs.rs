//! `programs` table access

use rusqlite::{params, Connection, OptionalExtension};

use super::error::StorageResult;
use crate::models::Program;

/// Insert or replace a program by id
pub fn upsert(conn: &Connection, program: &Program) -> StorageResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO programs (id, name) VALUES (?1, ?2)",
        params![program.id, program.name],
    )?;
    Ok(())
}

pub fn find(conn: &Connection, id: &str) -> StorageResult<Option<Program>> {
    let program = conn
        .query_row(
            "SELECT id, name FROM programs WHERE id = ?1",
            params![id],
            |row| {
                Ok(Program {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(program)
}

/// All programs, scanned through the name index
pub fn list(conn: &Connection) -> StorageResult<Vec<Program>> {
    let mut stmt = conn.prepare("SELECT id, name FROM programs ORDER BY name")?;
    let programs = stmt
        .query_map([], |row| {
            Ok(Program {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(programs)
}

/// Program name, if the program exists
pub fn name(conn: &Connection, id: &str) -> StorageResult<Option<String>> {
    let name = conn
        .prepare_cached("SELECT name FROM programs WHERE id = ?1")?
        .query_row(params![id], |row| row.get(0))
        .optional()?;
    Ok(name)
}

pub fn count(conn: &Connection) -> StorageResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM programs", [], |row| row.get(0))?)
}

/// Delete one program row; returns whether it existed
pub fn delete(conn: &Connection, id: &str) -> StorageResult<bool> {
    Ok(conn.execute("DELETE FROM programs WHERE id = ?1", params![id])? > 0)
}

pub fn delete_all(conn: &Connection) -> StorageResult<usize> {
    Ok(conn.execute("DELETE FROM programs", [])?)
}
