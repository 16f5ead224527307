//! Push/pull synchronization with a sync server
//!
//! ## Protocol
//!
//! - **Push** sends every change-ledger entry to the server. An entry is
//!   removed only once the server echoes back the same content hash.
//! - **Pull** fetches a snapshot, verifies its hash, checks the schema
//!   version and applies it in one transaction.
//!
//! ## Usage
//!
//! ```ignore
//! let engine = SyncEngine::new(store, HttpTransport::new(url)?);
//! engine.register_device("Living Room").await?;
//! match engine.push().await {
//!     SyncOutcome::Completed { applied } => println!("{} changes sent", applied),
//!     SyncOutcome::AlreadyRunning => {}
//!     SyncOutcome::Failed(errors) => { /* report */ }
//! }
//! ```

mod engine;
mod message;
mod transport;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use engine::{SharedStore, SyncEngine, SyncOperation};
pub use message::{
    content_hash, normalize_etag, ExportRequest, ImportItem, ImportMode, ImportResponse,
    ImportSnapshot, CONTENT_HASH_HEADER, DEVICE_ID_HEADER,
};
pub use transport::{HttpTransport, SyncTransport, TransportError};

use crate::identity::Device;

/// Why a push or pull (or one item of a push) did not go through
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("This device is not registered; run `tvm device register <name>` first")]
    NotRegistered,

    #[error("Checksum mismatch for {entity}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        entity: String,
        expected: String,
        actual: String,
    },

    #[error("Snapshot schema version {remote} does not match local version {local}")]
    VersionMismatch { local: u32, remote: u32 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{entity} has a pending change but no longer exists")]
    MissingEntity { entity: String },

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SyncError {
    pub(crate) fn storage(error: impl std::fmt::Display) -> Self {
        SyncError::Storage(format!("{:#}", error))
    }

    /// Whether the next push or pull may succeed without user action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ChecksumMismatch { .. } | SyncError::Transport(_)
        )
    }
}

impl From<TransportError> for SyncError {
    fn from(error: TransportError) -> Self {
        SyncError::Transport(error.to_string())
    }
}

/// Summary of a push or pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Every item went through
    Completed { applied: usize },
    /// Another push or pull was in progress; nothing was done
    AlreadyRunning,
    /// One or more items failed; failed push items stay in the ledger
    Failed(Vec<SyncError>),
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Completed { .. })
    }
}

/// What the CLI shows for `tvm status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub device: Option<Device>,
    pub last_sync: Option<DateTime<Utc>>,
    pub pending_changes: i64,
    pub running: Option<SyncOperation>,
}
