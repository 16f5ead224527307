//! tvm core library
//!
//! This crate provides the core functionality for tvm, a local store of TV
//! programs, series and episodes that syncs with a server through a change
//! ledger.
//!
//! # Architecture
//!
//! - **SQLite**: one table per logical store, upgraded by versioned migrations
//! - **Change ledger**: every local mutation records a pending change in the
//!   same transaction
//! - **Sync engine**: pushes the ledger and pulls verified snapshots over HTTP
//!
//! # Quick Start
//!
//! ```text
//! let mut store = Store::open()?;
//!
//! let program = Program::new("Doctor Who");
//! store.save_program(&program)?;
//!
//! let schedule = store.list_series_by_now_showing(dates::today())?;
//! ```
//!
//! # Modules
//!
//! - `store`: Unified storage interface (main entry point)
//! - `models`: Programs, series, episodes and their listings
//! - `dates`: Year-less "DD-Mon" dates and the sliding window
//! - `storage`: Schema migrations and per-table access
//! - `identity`: Registered device identity
//! - `sync`: Push/pull sync engine and HTTP transport
//! - `config`: Application configuration

pub mod config;
pub mod dates;
pub mod identity;
pub mod models;
pub mod storage;
pub mod store;
pub mod sync;

pub use config::Config;
pub use identity::Device;
pub use models::{
    Entity, EntityType, Episode, EpisodeCounts, EpisodeListing, EpisodeStatus, Program,
    ProgramListing, Series, SeriesListing, Setting,
};
pub use storage::{LedgerEntry, StorageError, SyncAction};
pub use store::Store;
pub use sync::{HttpTransport, ImportMode, SyncEngine, SyncError, SyncOutcome, SyncStatus};
