//! Versioned schema and migrations
//!
//! Each logical store (table) has its own upgrade steps. A step is a named
//! command that upgrades one store from `version` to `version + 1`. Opening
//! the database at a target version folds every step in
//! `[current_version, target_version)` over the stores in [`StoreName::ALL`]
//! order, inside a single transaction. A failing step rolls back the whole
//! upgrade and leaves the recorded version untouched.
//!
//! History:
//!
//! - v1: legacy rowid-keyed tables, booleans stored as "true"/"false"
//!   strings, status dates stored as "DD-Mon".
//! - v2: tables re-keyed by copy onto backfilled string ids, genuine
//!   booleans, absolute status dates, secondary indexes.
//! - v3: the `syncs` change ledger, seeded with a `modified` entry for every
//!   existing row so the first push uploads the whole dataset.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use super::error::{StorageError, StorageResult};
use crate::dates;

/// Current schema version
pub const SCHEMA_VERSION: u32 = 3;

/// Logical stores, in the order their steps run within a version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreName {
    Programs,
    Series,
    Episodes,
    Settings,
    Syncs,
}

impl StoreName {
    pub const ALL: [StoreName; 5] = [
        StoreName::Programs,
        StoreName::Series,
        StoreName::Episodes,
        StoreName::Settings,
        StoreName::Syncs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreName::Programs => "programs",
            StoreName::Series => "series",
            StoreName::Episodes => "episodes",
            StoreName::Settings => "settings",
            StoreName::Syncs => "syncs",
        }
    }
}

/// One upgrade step for one store
#[derive(Clone, Copy)]
pub struct Migration {
    /// The version this step upgrades from
    pub version: u32,
    pub store: StoreName,
    pub name: &'static str,
    pub apply: fn(&Connection) -> rusqlite::Result<()>,
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("store", &self.store)
            .field("name", &self.name)
            .finish()
    }
}

/// Every upgrade step, in any order (they are selected by version and store)
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 0,
        store: StoreName::Programs,
        name: "create_programs",
        apply: create_programs,
    },
    Migration {
        version: 0,
        store: StoreName::Series,
        name: "create_series",
        apply: create_series,
    },
    Migration {
        version: 0,
        store: StoreName::Episodes,
        name: "create_episodes",
        apply: create_episodes,
    },
    Migration {
        version: 0,
        store: StoreName::Settings,
        name: "create_settings",
        apply: create_settings,
    },
    Migration {
        version: 1,
        store: StoreName::Programs,
        name: "rekey_programs",
        apply: rekey_programs,
    },
    Migration {
        version: 1,
        store: StoreName::Series,
        name: "rekey_series",
        apply: rekey_series,
    },
    Migration {
        version: 1,
        store: StoreName::Episodes,
        name: "rekey_episodes",
        apply: rekey_episodes,
    },
    Migration {
        version: 2,
        store: StoreName::Syncs,
        name: "create_syncs",
        apply: create_syncs,
    },
];

/// What `connect` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    pub applied: Vec<&'static str>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty() && self.from_version == self.to_version
    }
}

/// Bring the database up to `target` using the built-in steps
pub fn connect(conn: &mut Connection, target: u32) -> StorageResult<MigrationReport> {
    connect_with(conn, target, MIGRATIONS)
}

/// Bring the database up to `target` using the given steps
pub fn connect_with(
    conn: &mut Connection,
    target: u32,
    migrations: &[Migration],
) -> StorageResult<MigrationReport> {
    let tx = conn.transaction()?;
    ensure_schema_info(&tx)?;

    let from_version = get_schema_version(&tx)?.unwrap_or(0);
    if from_version > target {
        return Err(StorageError::SchemaTooNew {
            found: from_version,
            supported: target,
        });
    }

    let mut applied = Vec::new();
    if from_version < target {
        for version in from_version..target {
            for store in StoreName::ALL {
                for step in migrations
                    .iter()
                    .filter(|m| m.version == version && m.store == store)
                {
                    debug!(version, store = store.as_str(), step = step.name, "Applying migration step");
                    (step.apply)(&tx).map_err(|source| StorageError::Migration {
                        version,
                        store: store.as_str(),
                        name: step.name,
                        source,
                    })?;
                    applied.push(step.name);
                }
            }
        }
        set_schema_version(&tx, target)?;
        info!(from_version, target, steps = applied.len(), "Database schema upgraded");
    }

    tx.commit()?;

    Ok(MigrationReport {
        from_version,
        to_version: target,
        applied,
    })
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> StorageResult<Option<u32>> {
    if !table_exists(conn, "schema_info")? {
        return Ok(None);
    }

    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_info WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    Ok(version.and_then(|v| v.parse().ok()))
}

/// Check if schema needs initialization or migration
pub fn needs_upgrade(conn: &Connection) -> bool {
    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}

fn ensure_schema_info(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
}

fn set_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?1)",
        [version.to_string()],
    )?;
    Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?
        .exists([name])
}

// ==================== v0 -> v1: legacy tables ====================

fn create_programs(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("CREATE TABLE programs (name TEXT NOT NULL);")
}

fn create_series(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE series (
            name TEXT NOT NULL,
            program_id INTEGER NOT NULL,
            now_showing INTEGER
        );",
    )
}

fn create_episodes(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE episodes (
            name TEXT NOT NULL,
            series_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT '',
            status_date TEXT NOT NULL DEFAULT '',
            unverified TEXT NOT NULL DEFAULT 'false',
            sequence INTEGER NOT NULL DEFAULT 0
        );",
    )
}

fn create_settings(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE settings (
            name TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
}

// ==================== v1 -> v2: re-key onto string ids ====================

fn rekey_programs(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE programs_rekeyed (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );
        INSERT INTO programs_rekeyed (id, name)
            SELECT CAST(rowid AS TEXT), name FROM programs;
        DROP TABLE programs;
        ALTER TABLE programs_rekeyed RENAME TO programs;

        CREATE INDEX idx_programs_name ON programs(name);
        "#,
    )
}

fn rekey_series(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE series_rekeyed (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            program_id TEXT NOT NULL,
            now_showing INTEGER
        );
        INSERT INTO series_rekeyed (id, name, program_id, now_showing)
            SELECT CAST(rowid AS TEXT), name, CAST(program_id AS TEXT), now_showing FROM series;
        DROP TABLE series;
        ALTER TABLE series_rekeyed RENAME TO series;

        CREATE INDEX idx_series_program_id ON series(program_id);
        CREATE INDEX idx_series_now_showing ON series(now_showing);
        "#,
    )
}

fn rekey_episodes(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE episodes_rekeyed (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            series_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT '',
            status_date TEXT,
            unverified INTEGER NOT NULL DEFAULT 0,
            unscheduled INTEGER NOT NULL DEFAULT 0,
            sequence INTEGER NOT NULL DEFAULT 0
        );
        INSERT INTO episodes_rekeyed
            (id, name, series_id, status, status_date, unverified, unscheduled, sequence)
            SELECT CAST(rowid AS TEXT), name, CAST(series_id AS TEXT), status,
                   NULLIF(status_date, ''),
                   CASE WHEN unverified = 'true' THEN 1 ELSE 0 END,
                   0, sequence
            FROM episodes;
        DROP TABLE episodes;
        ALTER TABLE episodes_rekeyed RENAME TO episodes;

        CREATE INDEX idx_episodes_series_id ON episodes(series_id);
        CREATE INDEX idx_episodes_status_series ON episodes(status, series_id);
        CREATE INDEX idx_episodes_status_series_date ON episodes(status, series_id, status_date);
        CREATE INDEX idx_episodes_unscheduled ON episodes(unscheduled);
        "#,
    )?;

    // Legacy dates carry no year; pin them to the window around today.
    let today = dates::today();
    let legacy: Vec<(String, String)> = conn
        .prepare("SELECT id, status_date FROM episodes WHERE status_date IS NOT NULL")?
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<_>>()?;

    for (id, partial) in legacy {
        let absolute = match dates::to_absolute(&partial, today) {
            Ok(date) => Some(date.format("%Y-%m-%d").to_string()),
            Err(e) => {
                warn!(
                    episode = %id,
                    value = %partial,
                    error = %e,
                    "Dropping unparseable legacy status date"
                );
                None
            }
        };
        conn.execute(
            "UPDATE episodes SET status_date = ?1 WHERE id = ?2",
            params![absolute, id],
        )?;
    }

    Ok(())
}

// ==================== v2 -> v3: change ledger ====================

fn create_syncs(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE syncs (
            type TEXT NOT NULL,
            id TEXT NOT NULL,
            action TEXT NOT NULL,
            PRIMARY KEY (type, id)
        );

        INSERT INTO syncs (type, id, action) SELECT 'Program', id, 'modified' FROM programs;
        INSERT INTO syncs (type, id, action) SELECT 'Series', id, 'modified' FROM series;
        INSERT INTO syncs (type, id, action) SELECT 'Episode', id, 'modified' FROM episodes;
        "#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn names(conn: &Connection, kind: &str) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")
            .unwrap()
            .query_map([kind], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_fresh_database_reaches_current_version() {
        let mut conn = open();
        assert!(needs_upgrade(&conn));

        let report = connect(&mut conn, SCHEMA_VERSION).unwrap();
        assert_eq!(report.from_version, 0);
        assert_eq!(report.to_version, SCHEMA_VERSION);
        assert_eq!(report.applied.len(), MIGRATIONS.len());

        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
        assert!(!needs_upgrade(&conn));

        let tables = names(&conn, "table");
        for table in ["programs", "series", "episodes", "settings", "syncs"] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_indexes_exist() {
        let mut conn = open();
        connect(&mut conn, SCHEMA_VERSION).unwrap();

        let indexes = names(&conn, "index");
        for index in [
            "idx_programs_name",
            "idx_series_program_id",
            "idx_series_now_showing",
            "idx_episodes_series_id",
            "idx_episodes_status_series",
            "idx_episodes_status_series_date",
            "idx_episodes_unscheduled",
        ] {
            assert!(indexes.contains(&index.to_string()), "missing {}", index);
        }
    }

    #[test]
    fn test_steps_run_in_store_order() {
        let mut conn = open();
        let report = connect(&mut conn, 2).unwrap();
        assert_eq!(
            report.applied,
            vec![
                "create_programs",
                "create_series",
                "create_episodes",
                "create_settings",
                "rekey_programs",
                "rekey_series",
                "rekey_episodes",
            ]
        );
    }

    #[test]
    fn test_connect_at_target_is_noop() {
        let mut conn = open();
        connect(&mut conn, SCHEMA_VERSION).unwrap();

        let report = connect(&mut conn, SCHEMA_VERSION).unwrap();
        assert!(report.is_noop());
    }

    #[test]
    fn test_newer_database_is_rejected() {
        let mut conn = open();
        connect(&mut conn, SCHEMA_VERSION).unwrap();

        let err = connect(&mut conn, 1).unwrap_err();
        assert!(matches!(err, StorageError::SchemaTooNew { found: 3, supported: 1 }));
    }

    #[test]
    fn test_legacy_rows_are_rekeyed_and_seeded_into_ledger() {
        let mut conn = open();
        connect(&mut conn, 1).unwrap();

        conn.execute_batch(
            r#"
            INSERT INTO programs (name) VALUES ('Program A');
            INSERT INTO series (name, program_id, now_showing) VALUES ('Series A', 1, 2);
            INSERT INTO episodes (name, series_id, status, status_date, unverified, sequence)
                VALUES ('Episode 1', 1, 'Recorded', '05-Mar', 'true', 1);
            INSERT INTO episodes (name, series_id, status, status_date, unverified, sequence)
                VALUES ('Episode 2', 1, 'Watched', '', 'false', 2);
            "#,
        )
        .unwrap();

        let report = connect(&mut conn, SCHEMA_VERSION).unwrap();
        assert_eq!(report.from_version, 1);

        let (id, program_id): (String, String) = conn
            .query_row("SELECT id, program_id FROM series", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(id, "1");
        assert_eq!(program_id, "1");

        let (unverified, status_date): (bool, Option<String>) = conn
            .query_row(
                "SELECT unverified, status_date FROM episodes WHERE name = 'Episode 1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!(unverified);
        assert!(status_date.unwrap().ends_with("-03-05"));

        let empty_date: Option<String> = conn
            .query_row(
                "SELECT status_date FROM episodes WHERE name = 'Episode 2'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(empty_date.is_none());

        let seeded: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM syncs WHERE action = 'modified'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(seeded, 4);
    }

    #[test]
    fn test_unparseable_legacy_date_is_cleared_and_others_kept() {
        let mut conn = open();
        connect(&mut conn, 1).unwrap();

        conn.execute_batch(
            r#"
            INSERT INTO programs (name) VALUES ('Program A');
            INSERT INTO series (name, program_id) VALUES ('Series A', 1);
            INSERT INTO episodes (name, series_id, status, status_date, unverified, sequence)
                VALUES ('Garbled', 1, 'Expected', '31-Foo', 'false', 1);
            INSERT INTO episodes (name, series_id, status, status_date, unverified, sequence)
                VALUES ('Dated', 1, 'Expected', '14-Jul', 'false', 2);
            "#,
        )
        .unwrap();

        connect(&mut conn, SCHEMA_VERSION).unwrap();

        let date_of = |name: &str| -> Option<String> {
            conn.query_row(
                "SELECT status_date FROM episodes WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap()
        };
        assert!(date_of("Garbled").is_none());
        assert!(date_of("Dated").unwrap().ends_with("-07-14"));

        let episodes: i64 = conn
            .query_row("SELECT COUNT(*) FROM episodes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(episodes, 2);
    }

    fn failing_step(_: &Connection) -> rusqlite::Result<()> {
        Err(rusqlite::Error::InvalidQuery)
    }

    #[test]
    fn test_failing_step_rolls_back_everything() {
        let mut conn = open();
        let mut steps = MIGRATIONS.to_vec();
        steps.push(Migration {
            version: 0,
            store: StoreName::Settings,
            name: "explode",
            apply: failing_step,
        });

        let err = connect_with(&mut conn, SCHEMA_VERSION, &steps).unwrap_err();
        match err {
            StorageError::Migration { version, name, .. } => {
                assert_eq!(version, 0);
                assert_eq!(name, "explode");
            }
            other => panic!("Expected migration error, got {:?}", other),
        }

        // Nothing from the failed upgrade is visible
        assert_eq!(get_schema_version(&conn).unwrap(), None);
        assert!(!names(&conn, "table").contains(&"programs".to_string()));
    }
}
