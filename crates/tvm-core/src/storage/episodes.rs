//! `episodes` table access
//!
//! Status dates are stored as ISO `YYYY-MM-DD` text so that range bounds on
//! the `(status, series_id, status_date)` index compare chronologically.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::error::{StorageError, StorageResult};
use crate::models::{Episode, EpisodeCounts, EpisodeStatus};

const COLUMNS: &str = "id, name, series_id, status, status_date, unverified, unscheduled, sequence";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Raw row before status and date are decoded
struct EpisodeRow {
    id: String,
    name: String,
    series_id: String,
    status: String,
    status_date: Option<String>,
    unverified: bool,
    unscheduled: bool,
    sequence: i64,
}

impl EpisodeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            series_id: row.get(2)?,
            status: row.get(3)?,
            status_date: row.get(4)?,
            unverified: row.get(5)?,
            unscheduled: row.get(6)?,
            sequence: row.get(7)?,
        })
    }

    fn hydrate(self) -> StorageResult<Episode> {
        let status = self
            .status
            .parse::<EpisodeStatus>()
            .map_err(|e| invalid(&self.id, e.to_string()))?;

        let status_date = match self.status_date.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, DATE_FORMAT)
                    .map_err(|e| invalid(&self.id, format!("status_date '{}': {}", raw, e)))?,
            ),
        };

        Ok(Episode {
            id: self.id,
            name: self.name,
            series_id: self.series_id,
            status,
            status_date,
            unverified: self.unverified,
            unscheduled: self.unscheduled,
            sequence: self.sequence,
        })
    }
}

fn invalid(id: &str, details: String) -> StorageError {
    StorageError::InvalidRecord {
        table: "episodes",
        id: id.to_string(),
        details,
    }
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn collect(rows: impl Iterator<Item = rusqlite::Result<EpisodeRow>>) -> StorageResult<Vec<Episode>> {
    let mut episodes = Vec::new();
    for row in rows {
        episodes.push(row?.hydrate()?);
    }
    Ok(episodes)
}

/// Insert or replace an episode by id
pub fn upsert(conn: &Connection, episode: &Episode) -> StorageResult<()> {
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO episodes ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            COLUMNS
        ),
        params![
            episode.id,
            episode.name,
            episode.series_id,
            episode.status.as_str(),
            format_date(episode.status_date),
            episode.unverified,
            episode.unscheduled,
            episode.sequence,
        ],
    )?;
    Ok(())
}

pub fn find(conn: &Connection, id: &str) -> StorageResult<Option<Episode>> {
    let row = conn
        .prepare_cached(&format!("SELECT {} FROM episodes WHERE id = ?1", COLUMNS))?
        .query_row(params![id], EpisodeRow::from_row)
        .optional()?;
    row.map(EpisodeRow::hydrate).transpose()
}

/// Episodes owned by a series (series_id index)
pub fn list_by_series(conn: &Connection, series_id: &str) -> StorageResult<Vec<Episode>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM episodes WHERE series_id = ?1",
        COLUMNS
    ))?;
    let rows = stmt.query_map(params![series_id], EpisodeRow::from_row)?;
    collect(rows)
}

/// Episodes flagged unscheduled (unscheduled index)
pub fn list_unscheduled(conn: &Connection) -> StorageResult<Vec<Episode>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM episodes WHERE unscheduled = 1",
        COLUMNS
    ))?;
    let rows = stmt.query_map([], EpisodeRow::from_row)?;
    collect(rows)
}

/// Ids of the episodes owned by a series
pub fn ids_by_series(conn: &Connection, series_id: &str) -> StorageResult<Vec<String>> {
    let mut stmt = conn.prepare_cached("SELECT id FROM episodes WHERE series_id = ?1")?;
    let ids = stmt
        .query_map(params![series_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// Distinct owning series of episodes with `status` ((status, series_id) index)
pub fn series_ids_with_status(
    conn: &Connection,
    status: EpisodeStatus,
) -> StorageResult<Vec<String>> {
    let mut stmt = conn.prepare_cached("SELECT DISTINCT series_id FROM episodes WHERE status = ?1")?;
    let ids = stmt
        .query_map(params![status.as_str()], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// Episodes of one series with one status
pub fn count_with_status(
    conn: &Connection,
    series_id: &str,
    status: EpisodeStatus,
) -> StorageResult<i64> {
    Ok(conn
        .prepare_cached("SELECT COUNT(*) FROM episodes WHERE status = ?1 AND series_id = ?2")?
        .query_row(params![status.as_str(), series_id], |row| row.get(0))?)
}

/// Episodes of one series
pub fn count_by_series(conn: &Connection, series_id: &str) -> StorageResult<i64> {
    Ok(conn
        .prepare_cached("SELECT COUNT(*) FROM episodes WHERE series_id = ?1")?
        .query_row(params![series_id], |row| row.get(0))?)
}

/// Expected episodes of one series dated within `[from, until)`
pub fn count_expected_between(
    conn: &Connection,
    series_id: &str,
    from: NaiveDate,
    until: NaiveDate,
) -> StorageResult<i64> {
    Ok(conn
        .prepare_cached(
            "SELECT COUNT(*) FROM episodes
             WHERE status = ?1 AND series_id = ?2 AND status_date >= ?3 AND status_date < ?4",
        )?
        .query_row(
            params![
                EpisodeStatus::Expected.as_str(),
                series_id,
                from.format(DATE_FORMAT).to_string(),
                until.format(DATE_FORMAT).to_string(),
            ],
            |row| row.get(0),
        )?)
}

/// All derived counts for one series; the warning range is `[from, until)`
pub fn counts_for_series(
    conn: &Connection,
    series_id: &str,
    warning: (NaiveDate, NaiveDate),
) -> StorageResult<EpisodeCounts> {
    Ok(EpisodeCounts {
        episode_count: count_by_series(conn, series_id)?,
        watched_count: count_with_status(conn, series_id, EpisodeStatus::Watched)?,
        recorded_count: count_with_status(conn, series_id, EpisodeStatus::Recorded)?,
        expected_count: count_with_status(conn, series_id, EpisodeStatus::Expected)?,
        missed_count: count_with_status(conn, series_id, EpisodeStatus::Missed)?,
        status_warning: count_expected_between(conn, series_id, warning.0, warning.1)? > 0,
    })
}

pub fn count(conn: &Connection) -> StorageResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM episodes", [], |row| row.get(0))?)
}

/// Episodes with a status across all series
pub fn count_by_status(conn: &Connection, status: EpisodeStatus) -> StorageResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM episodes WHERE status = ?1",
        params![status.as_str()],
        |row| row.get(0),
    )?)
}

/// Delete one episode row; returns whether it existed
pub fn delete(conn: &Connection, id: &str) -> StorageResult<bool> {
    Ok(conn.execute("DELETE FROM episodes WHERE id = ?1", params![id])? > 0)
}

pub fn delete_all(conn: &Connection) -> StorageResult<usize> {
    Ok(conn.execute("DELETE FROM episodes", [])?)
}
