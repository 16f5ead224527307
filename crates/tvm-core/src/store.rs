//! Unified storage interface
//!
//! The `Store` owns the database connection and is the only way business
//! data is mutated. Every save or remove of a Program, Series or Episode
//! writes the matching change-ledger entry inside the same transaction, so
//! the ledger and the entity tables never disagree.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = Store::open()?;
//!
//! let program = Program::new("Doctor Who");
//! store.save_program(&program)?;
//!
//! let schedule = store.list_series_by_now_showing(dates::today())?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, Transaction};
use tracing::{debug, info};

use crate::config::Config;
use crate::dates;
use crate::models::{
    Entity, EntityType, Episode, EpisodeListing, EpisodeStatus, Program, ProgramListing, Series,
    SeriesListing, Setting,
};
use crate::storage::listings::{self, WarningRange};
use crate::storage::{
    self, episodes, ledger, programs, series, settings, LedgerEntry, StorageError, StorageResult,
    SyncAction, SCHEMA_VERSION,
};

/// Setting holding the RFC 3339 time of the last clean push or pull
pub const LAST_SYNC_TIME: &str = "LastSyncTime";

/// Local store of programs, series, episodes, settings and pending changes
pub struct Store {
    conn: Connection,
    config: Config,
}

impl Store {
    /// Open the store at the configured location
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config)
    }

    /// Open the store with a specific configuration
    ///
    /// Creates the data directory and upgrades the schema when needed.
    pub fn open_with_config(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| StorageError::from_io(e, config.data_dir.clone()))?;

        let path = config.database_path();
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;

        Self::with_connection(conn, config)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory(config: Config) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, config)
    }

    fn with_connection(mut conn: Connection, config: Config) -> Result<Self> {
        let report = storage::connect(&mut conn, SCHEMA_VERSION)
            .context("Failed to upgrade database schema")?;
        if !report.is_noop() {
            info!(
                from = report.from_version,
                to = report.to_version,
                "Opened store after schema upgrade"
            );
        }
        Ok(Self { conn, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start a transaction for multi-step operations (used by sync)
    pub(crate) fn transaction(&mut self) -> Result<Transaction<'_>> {
        self.conn
            .transaction()
            .context("Failed to start transaction")
    }

    /// Run `f` in one transaction, committing only if it succeeds
    fn write<T>(&mut self, f: impl FnOnce(&Transaction<'_>) -> StorageResult<T>) -> Result<T> {
        let tx = self.transaction()?;
        let value = f(&tx)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(value)
    }

    fn warning_range(&self, today: NaiveDate) -> WarningRange {
        dates::warning_window(today, self.config.status_warning_days)
    }

    // ==================== Program Operations ====================

    /// Insert or update a program and mark it modified
    pub fn save_program(&mut self, program: &Program) -> Result<()> {
        self.write(|tx| {
            programs::upsert(tx, program)?;
            ledger::record(tx, EntityType::Program, &program.id, SyncAction::Modified)
        })
        .with_context(|| format!("Failed to save program {}", program.id))
    }

    pub fn find_program(&self, id: &str) -> Result<Option<Program>> {
        programs::find(&self.conn, id).context("Failed to get program")
    }

    /// Delete a program with all its series and episodes
    ///
    /// Every deleted row gets a `deleted` ledger entry. Returns whether the
    /// program existed.
    pub fn remove_program(&mut self, id: &str) -> Result<bool> {
        self.write(|tx| {
            for series_id in series::ids_by_program(tx, id)? {
                remove_series_cascade(tx, &series_id)?;
            }
            let removed = programs::delete(tx, id)?;
            if removed {
                ledger::record(tx, EntityType::Program, id, SyncAction::Deleted)?;
            }
            Ok(removed)
        })
        .with_context(|| format!("Failed to remove program {}", id))
    }

    pub fn count_programs(&self) -> Result<i64> {
        programs::count(&self.conn).context("Failed to count programs")
    }

    /// Every program with rolled-up counts, sorted by name
    pub fn list_programs(&self, today: NaiveDate) -> Result<Vec<ProgramListing>> {
        listings::all_programs(&self.conn, self.warning_range(today))
            .context("Failed to list programs")
    }

    // ==================== Series Operations ====================

    /// Insert or update a series and mark it modified
    ///
    /// Saving with a different `program_id` moves the series.
    pub fn save_series(&mut self, series: &Series) -> Result<()> {
        self.write(|tx| {
            series::upsert(tx, series)?;
            ledger::record(tx, EntityType::Series, &series.id, SyncAction::Modified)
        })
        .with_context(|| format!("Failed to save series {}", series.id))
    }

    pub fn find_series(&self, id: &str) -> Result<Option<Series>> {
        series::find(&self.conn, id).context("Failed to get series")
    }

    /// Delete a series with all its episodes
    pub fn remove_series(&mut self, id: &str) -> Result<bool> {
        self.write(|tx| remove_series_cascade(tx, id))
            .with_context(|| format!("Failed to remove series {}", id))
    }

    pub fn count_series(&self) -> Result<i64> {
        series::count(&self.conn).context("Failed to count series")
    }

    /// Series of a program with counts, sorted by name
    pub fn list_series_by_program(
        &self,
        program_id: &str,
        today: NaiveDate,
    ) -> Result<Vec<SeriesListing>> {
        listings::series_by_program(&self.conn, program_id, self.warning_range(today))
            .context("Failed to list series by program")
    }

    /// The schedule: showing series plus any with recorded or expected episodes
    pub fn list_series_by_now_showing(&self, today: NaiveDate) -> Result<Vec<SeriesListing>> {
        listings::series_by_now_showing(&self.conn, self.warning_range(today))
            .context("Failed to list series by now showing")
    }

    /// Series with at least one episode of `status`
    pub fn list_series_by_status(
        &self,
        status: EpisodeStatus,
        today: NaiveDate,
    ) -> Result<Vec<SeriesListing>> {
        listings::series_by_status(&self.conn, status, self.warning_range(today))
            .with_context(|| format!("Failed to list series by status '{}'", status))
    }

    /// Series that are partly watched
    pub fn list_series_by_incomplete(&self, today: NaiveDate) -> Result<Vec<SeriesListing>> {
        listings::series_by_incomplete(&self.conn, self.warning_range(today))
            .context("Failed to list incomplete series")
    }

    // ==================== Episode Operations ====================

    /// Insert or update an episode and mark it modified
    pub fn save_episode(&mut self, episode: &Episode) -> Result<()> {
        self.write(|tx| {
            episodes::upsert(tx, episode)?;
            ledger::record(tx, EntityType::Episode, &episode.id, SyncAction::Modified)
        })
        .with_context(|| format!("Failed to save episode {}", episode.id))
    }

    pub fn find_episode(&self, id: &str) -> Result<Option<Episode>> {
        episodes::find(&self.conn, id).context("Failed to get episode")
    }

    pub fn remove_episode(&mut self, id: &str) -> Result<bool> {
        self.write(|tx| remove_episode_row(tx, id))
            .with_context(|| format!("Failed to remove episode {}", id))
    }

    pub fn count_episodes(&self) -> Result<i64> {
        episodes::count(&self.conn).context("Failed to count episodes")
    }

    pub fn count_episodes_by_status(&self, status: EpisodeStatus) -> Result<i64> {
        episodes::count_by_status(&self.conn, status).context("Failed to count episodes")
    }

    /// Episodes of a series in manual order
    pub fn list_episodes_by_series(
        &self,
        series_id: &str,
        today: NaiveDate,
    ) -> Result<Vec<EpisodeListing>> {
        listings::episodes_by_series(&self.conn, series_id, today)
            .context("Failed to list episodes by series")
    }

    /// Unscheduled episodes, undated first, then by resolved date
    pub fn list_unscheduled(&self, today: NaiveDate) -> Result<Vec<EpisodeListing>> {
        listings::unscheduled(&self.conn, today).context("Failed to list unscheduled episodes")
    }

    // ==================== Entity Dispatch ====================

    /// Save any entity
    pub fn save(&mut self, entity: &Entity) -> Result<()> {
        match entity {
            Entity::Program(program) => self.save_program(program),
            Entity::Series(series) => self.save_series(series),
            Entity::Episode(episode) => self.save_episode(episode),
        }
    }

    /// Remove any entity (cascading for programs and series)
    pub fn remove(&mut self, entity_type: EntityType, id: &str) -> Result<bool> {
        match entity_type {
            EntityType::Program => self.remove_program(id),
            EntityType::Series => self.remove_series(id),
            EntityType::Episode => self.remove_episode(id),
        }
    }

    /// Look up any entity by type and id
    pub fn find(&self, entity_type: EntityType, id: &str) -> Result<Option<Entity>> {
        find_entity(&self.conn, entity_type, id)
            .with_context(|| format!("Failed to get {} {}", entity_type, id))
    }

    /// Wipe every program, series and episode without touching the ledger
    ///
    /// Only meant to precede an authoritative full import.
    pub fn remove_all(&mut self) -> Result<()> {
        self.write(|tx| remove_all_entities(tx))
            .context("Failed to remove all entities")
    }

    // ==================== Change Ledger ====================

    /// Pending changes, ordered by type and id
    pub fn pending_changes(&self) -> Result<Vec<LedgerEntry>> {
        ledger::list(&self.conn).context("Failed to list pending changes")
    }

    pub fn pending_change(&self, entity_type: EntityType, id: &str) -> Result<Option<LedgerEntry>> {
        ledger::find(&self.conn, entity_type, id).context("Failed to get pending change")
    }

    pub fn count_pending_changes(&self) -> Result<i64> {
        ledger::count(&self.conn).context("Failed to count pending changes")
    }

    /// Drop one pending change once the server has accepted it
    pub fn remove_pending_change(&mut self, entity_type: EntityType, id: &str) -> Result<bool> {
        ledger::remove(&self.conn, entity_type, id).context("Failed to remove pending change")
    }

    pub fn clear_pending_changes(&mut self) -> Result<usize> {
        ledger::remove_all(&self.conn).context("Failed to clear pending changes")
    }

    // ==================== Settings ====================

    pub fn get_setting(&self, name: &str) -> Result<Option<String>> {
        settings::get(&self.conn, name).with_context(|| format!("Failed to get setting {}", name))
    }

    pub fn save_setting(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let setting = Setting {
            name: name.to_string(),
            value: value.into(),
        };
        settings::set(&self.conn, &setting)
            .with_context(|| format!("Failed to save setting {}", name))
    }

    pub fn remove_setting(&mut self, name: &str) -> Result<bool> {
        settings::remove(&self.conn, name)
            .with_context(|| format!("Failed to remove setting {}", name))
    }

    /// Time of the last push or pull that finished without errors
    pub fn last_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.get_setting(LAST_SYNC_TIME)? else {
            return Ok(None);
        };
        let parsed = DateTime::parse_from_rfc3339(&raw)
            .with_context(|| format!("Invalid {} setting '{}'", LAST_SYNC_TIME, raw))?;
        Ok(Some(parsed.with_timezone(&Utc)))
    }

    pub fn set_last_sync_time(&mut self, when: DateTime<Utc>) -> Result<()> {
        self.save_setting(LAST_SYNC_TIME, when.to_rfc3339())
    }
}

// ==================== Transaction Helpers ====================

fn remove_episode_row(conn: &Connection, id: &str) -> StorageResult<bool> {
    let removed = episodes::delete(conn, id)?;
    if removed {
        ledger::record(conn, EntityType::Episode, id, SyncAction::Deleted)?;
    }
    Ok(removed)
}

fn remove_series_cascade(conn: &Connection, id: &str) -> StorageResult<bool> {
    let episode_ids = episodes::ids_by_series(conn, id)?;
    debug!(series = id, episodes = episode_ids.len(), "Cascading series delete");
    for episode_id in episode_ids {
        remove_episode_row(conn, &episode_id)?;
    }

    let removed = series::delete(conn, id)?;
    if removed {
        ledger::record(conn, EntityType::Series, id, SyncAction::Deleted)?;
    }
    Ok(removed)
}

/// Delete every business row; the ledger is left alone
pub(crate) fn remove_all_entities(conn: &Connection) -> StorageResult<()> {
    episodes::delete_all(conn)?;
    series::delete_all(conn)?;
    programs::delete_all(conn)?;
    Ok(())
}

pub(crate) fn find_entity(
    conn: &Connection,
    entity_type: EntityType,
    id: &str,
) -> StorageResult<Option<Entity>> {
    Ok(match entity_type {
        EntityType::Program => programs::find(conn, id)?.map(Entity::from),
        EntityType::Series => series::find(conn, id)?.map(Entity::from),
        EntityType::Episode => episodes::find(conn, id)?.map(Entity::from),
    })
}

/// Write a remote entity without recording a ledger entry
pub(crate) fn upsert_entity(conn: &Connection, entity: &Entity) -> StorageResult<()> {
    match entity {
        Entity::Program(program) => programs::upsert(conn, program),
        Entity::Series(series) => series::upsert(conn, series),
        Entity::Episode(episode) => episodes::upsert(conn, episode),
    }
}

/// Delete a single row for a remote delete without recording a ledger entry
///
/// Remote deletes arrive once per entity, descendants included, so no
/// cascade happens here.
pub(crate) fn delete_entity(conn: &Connection, entity_type: EntityType, id: &str) -> StorageResult<bool> {
    match entity_type {
        EntityType::Program => programs::delete(conn, id),
        EntityType::Series => series::delete(conn, id),
        EntityType::Episode => episodes::delete(conn, id),
    }
}
