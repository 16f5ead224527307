//! Sync wire payloads
//!
//! Entities travel as JSON (see [`crate::models::Entity`]). Every body is
//! accompanied by a content hash so each side can verify it received exactly
//! what the other sent. The hash is an integrity check only.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::{Entity, EntityType};
use crate::storage::SyncAction;

/// Request header carrying the content hash of the body
pub const CONTENT_HASH_HEADER: &str = "Content-MD5";

/// Request header carrying the registered device id
pub const DEVICE_ID_HEADER: &str = "X-DEVICE-ID";

/// Lowercase hex SHA-256 of `bytes`
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Strip the weak marker and surrounding quotes from an ETag value
pub fn normalize_etag(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("W/").unwrap_or(trimmed);
    trimmed.trim_matches('"').to_string()
}

/// One ledger entry ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub entity_type: EntityType,
    pub id: String,
    pub action: SyncAction,
    /// JSON document for modified entities; empty for deletes
    pub body: Vec<u8>,
    pub hash: String,
}

impl ExportRequest {
    /// Upload the current state of an entity
    pub fn modified(entity: &Entity) -> serde_json::Result<Self> {
        let body = serde_json::to_vec(entity)?;
        Ok(Self {
            entity_type: entity.entity_type(),
            id: entity.id().to_string(),
            action: SyncAction::Modified,
            hash: content_hash(&body),
            body,
        })
    }

    /// Tell the server an entity is gone
    pub fn deleted(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self {
            entity_type,
            id: id.into(),
            action: SyncAction::Deleted,
            body: Vec::new(),
            hash: content_hash(&[]),
        }
    }
}

/// Which snapshot to pull
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Only changes still pending for this device
    Changes,
    /// The whole dataset, replacing local data
    All,
}

impl ImportMode {
    /// Path segments of the import endpoint
    pub fn segments(&self) -> &'static [&'static str] {
        match self {
            ImportMode::Changes => &["import"],
            ImportMode::All => &["import", "all"],
        }
    }
}

/// Raw import response, verified before it is parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResponse {
    pub body: Vec<u8>,
    pub etag: Option<String>,
}

/// A server snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSnapshot {
    pub schema_version: u32,
    #[serde(default)]
    pub data: Vec<ImportItem>,
}

/// One entity in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportItem {
    pub doc: Entity,
    #[serde(default)]
    pub is_deleted: bool,
    /// Devices that have not yet received this change
    #[serde(default)]
    pub pending: Vec<String>,
}

impl ImportItem {
    /// Whether this change still has to be applied on `device_id`
    pub fn is_pending_for(&self, device_id: &str) -> bool {
        self.pending.iter().any(|pending| pending == device_id)
    }
}
