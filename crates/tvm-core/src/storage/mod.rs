//! Storage layer
//!
//! A single SQLite database holds one table per logical store:
//!
//! - `programs`, `series`, `episodes` - business data, keyed by string id
//! - `settings` - process-wide key/value pairs
//! - `syncs` - the change ledger driving push
//!
//! Each store module is a set of free functions over a `Connection`, so the
//! same code runs inside or outside a transaction. Atomic composition of
//! entity and ledger writes is the job of [`crate::store::Store`].

pub mod episodes;
pub mod error;
pub mod ledger;
pub mod listings;
pub mod programs;
pub mod schema;
pub mod series;
pub mod settings;

pub use error::{StorageError, StorageResult};
pub use ledger::{LedgerEntry, SyncAction};
pub use schema::{connect, connect_with, Migration, MigrationReport, StoreName, SCHEMA_VERSION};
