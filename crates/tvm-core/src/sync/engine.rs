//! Sync engine
//!
//! Push and pull share one in-progress flag: a call made while either is
//! running returns [`SyncOutcome::AlreadyRunning`] straight away instead of
//! queueing. Both hold the store lock for their whole run so local edits
//! cannot interleave with ledger bookkeeping.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::message::{content_hash, normalize_etag, ExportRequest, ImportMode, ImportSnapshot};
use super::transport::SyncTransport;
use super::{SyncError, SyncOutcome, SyncStatus};
use crate::identity::Device;
use crate::storage::{ledger, SyncAction, SCHEMA_VERSION};
use crate::store::{delete_entity, remove_all_entities, upsert_entity, Store};

/// Store handle shared between the engine and its callers
pub type SharedStore = Arc<Mutex<Store>>;

const IDLE: u8 = 0;

/// The operation currently holding the in-progress flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    Push = 1,
    Pull = 2,
}

impl SyncOperation {
    fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            1 => Some(SyncOperation::Push),
            2 => Some(SyncOperation::Pull),
            _ => None,
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOperation::Push => f.write_str("push"),
            SyncOperation::Pull => f.write_str("pull"),
        }
    }
}

/// Resets the in-progress flag when dropped
struct RunGuard<'a> {
    flag: &'a AtomicU8,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(IDLE, Ordering::Release);
    }
}

/// Orchestrates push, pull and device registration
pub struct SyncEngine<T: SyncTransport> {
    store: SharedStore,
    transport: T,
    running: AtomicU8,
}

impl<T: SyncTransport> SyncEngine<T> {
    pub fn new(store: SharedStore, transport: T) -> Self {
        Self {
            store,
            transport,
            running: AtomicU8::new(IDLE),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// The operation in progress, if any
    pub fn running(&self) -> Option<SyncOperation> {
        SyncOperation::from_flag(self.running.load(Ordering::Acquire))
    }

    fn begin(&self, operation: SyncOperation) -> Option<RunGuard<'_>> {
        match self.running.compare_exchange(
            IDLE,
            operation as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Some(RunGuard {
                flag: &self.running,
            }),
            Err(current) => {
                debug!(
                    requested = %operation,
                    running = ?SyncOperation::from_flag(current),
                    "Sync already in progress"
                );
                None
            }
        }
    }

    // ==================== Push ====================

    /// Send every pending change to the server
    ///
    /// Items are sent concurrently. An item whose returned hash does not
    /// match, or whose request fails, keeps its ledger entry for the next
    /// push; the rest of the batch still goes through.
    pub async fn push(&self) -> SyncOutcome {
        let Some(_guard) = self.begin(SyncOperation::Push) else {
            return SyncOutcome::AlreadyRunning;
        };

        info!("Starting push");
        match self.run_push().await {
            Ok(outcome) => outcome,
            Err(error) => SyncOutcome::Failed(vec![error]),
        }
    }

    async fn run_push(&self) -> Result<SyncOutcome, SyncError> {
        let mut store = self.store.lock().await;
        let device = registered_device(&store)?;

        let (requests, mut errors) = build_export_requests(&store)?;
        debug!(count = requests.len(), "Exporting pending changes");

        let results = join_all(
            requests
                .iter()
                .map(|request| self.transport.export(&device.id, request)),
        )
        .await;

        let mut accepted = 0;
        for (request, result) in requests.iter().zip(results) {
            let entity = format!("{} {}", request.entity_type, request.id);
            match result {
                Ok(Some(etag)) if normalize_etag(&etag) == request.hash => {
                    store
                        .remove_pending_change(request.entity_type, &request.id)
                        .map_err(SyncError::storage)?;
                    accepted += 1;
                }
                Ok(etag) => {
                    let actual = etag.as_deref().map(normalize_etag).unwrap_or_default();
                    warn!(%entity, expected = %request.hash, %actual, "Export checksum mismatch");
                    errors.push(SyncError::ChecksumMismatch {
                        entity,
                        expected: request.hash.clone(),
                        actual,
                    });
                }
                Err(error) => {
                    warn!(%entity, %error, "Export failed");
                    errors.push(error.into());
                }
            }
        }

        Ok(finish(&mut store, SyncOperation::Push, accepted, errors))
    }

    // ==================== Pull ====================

    /// Fetch and apply a snapshot from the server
    ///
    /// Nothing is applied unless the body hash matches the server's ETag and
    /// the snapshot's schema version matches ours.
    pub async fn pull(&self, mode: ImportMode) -> SyncOutcome {
        let Some(_guard) = self.begin(SyncOperation::Pull) else {
            return SyncOutcome::AlreadyRunning;
        };

        info!(?mode, "Starting pull");
        match self.run_pull(mode).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(%error, "Pull aborted");
                SyncOutcome::Failed(vec![error])
            }
        }
    }

    async fn run_pull(&self, mode: ImportMode) -> Result<SyncOutcome, SyncError> {
        let mut store = self.store.lock().await;
        let device = registered_device(&store)?;

        let response = self.transport.import(&device.id, mode).await?;

        let expected = response
            .etag
            .as_deref()
            .map(normalize_etag)
            .unwrap_or_default();
        let actual = content_hash(&response.body);
        if expected != actual {
            return Err(SyncError::ChecksumMismatch {
                entity: "import snapshot".to_string(),
                expected,
                actual,
            });
        }

        let snapshot: ImportSnapshot = serde_json::from_slice(&response.body)
            .map_err(|e| SyncError::InvalidSnapshot(e.to_string()))?;
        if snapshot.schema_version != SCHEMA_VERSION {
            return Err(SyncError::VersionMismatch {
                local: SCHEMA_VERSION,
                remote: snapshot.schema_version,
            });
        }

        let applied = apply_snapshot(&mut store, &snapshot, mode, &device.id)?;

        let mut errors = Vec::new();
        if mode == ImportMode::Changes {
            for id in &applied {
                if let Err(error) = self.transport.clear_pending(&device.id, id).await {
                    warn!(%id, %error, "Failed to clear pending marker");
                    errors.push(error.into());
                }
            }
        }

        Ok(finish(&mut store, SyncOperation::Pull, applied.len(), errors))
    }

    // ==================== Device ====================

    /// Register this device under `name`, or rename it if already registered
    pub async fn register_device(&self, name: &str) -> Result<Device, SyncError> {
        let mut store = self.store.lock().await;
        let current = store.device().map_err(SyncError::storage)?;

        let id = self
            .transport
            .register_device(name, current.as_ref().map(|d| d.id.as_str()))
            .await?;

        let device = Device::new(id, name);
        store.set_device(&device).map_err(SyncError::storage)?;
        info!(id = %device.id, name = %device.name, "Device registered");
        Ok(device)
    }

    /// Ask the server to forget this device, then clear the local identity
    pub async fn unregister_device(&self) -> Result<Option<Device>, SyncError> {
        let mut store = self.store.lock().await;
        let Some(device) = store.device().map_err(SyncError::storage)? else {
            return Ok(None);
        };

        self.transport.unregister_device(&device.id).await?;
        store.clear_device().map_err(SyncError::storage)?;
        info!(id = %device.id, "Device unregistered");
        Ok(Some(device))
    }

    /// Device, last sync time and number of pending changes
    pub async fn status(&self) -> Result<SyncStatus, SyncError> {
        let store = self.store.lock().await;
        Ok(SyncStatus {
            device: store.device().map_err(SyncError::storage)?,
            last_sync: store.last_sync_time().map_err(SyncError::storage)?,
            pending_changes: store.count_pending_changes().map_err(SyncError::storage)?,
            running: self.running(),
        })
    }
}

fn registered_device(store: &Store) -> Result<Device, SyncError> {
    store
        .device()
        .map_err(SyncError::storage)?
        .ok_or(SyncError::NotRegistered)
}

/// One request per ledger entry; entries that cannot be exported become errors
fn build_export_requests(store: &Store) -> Result<(Vec<ExportRequest>, Vec<SyncError>), SyncError> {
    let mut requests = Vec::new();
    let mut errors = Vec::new();

    for entry in store.pending_changes().map_err(SyncError::storage)? {
        match entry.action {
            SyncAction::Deleted => requests.push(ExportRequest::deleted(entry.entity_type, entry.id)),
            SyncAction::Modified => {
                let found = store
                    .find(entry.entity_type, &entry.id)
                    .map_err(SyncError::storage)?;
                match found {
                    Some(entity) => match ExportRequest::modified(&entity) {
                        Ok(request) => requests.push(request),
                        Err(e) => errors.push(SyncError::storage(e)),
                    },
                    None => {
                        warn!(entity = %entry.entity_type, id = %entry.id, "Pending change for missing entity");
                        errors.push(SyncError::MissingEntity {
                            entity: format!("{} {}", entry.entity_type, entry.id),
                        });
                    }
                }
            }
        }
    }

    Ok((requests, errors))
}

/// Apply a verified snapshot in one transaction; returns the applied ids
fn apply_snapshot(
    store: &mut Store,
    snapshot: &ImportSnapshot,
    mode: ImportMode,
    device_id: &str,
) -> Result<Vec<String>, SyncError> {
    let tx = store.transaction().map_err(SyncError::storage)?;

    if mode == ImportMode::All {
        remove_all_entities(&tx).map_err(SyncError::storage)?;
        ledger::remove_all(&tx).map_err(SyncError::storage)?;
    }

    let mut applied = Vec::new();
    for item in &snapshot.data {
        let entity_type = item.doc.entity_type();
        let id = item.doc.id();

        if mode == ImportMode::Changes && !item.is_pending_for(device_id) {
            debug!(entity = %entity_type, %id, "Skipping change made on this device");
            continue;
        }

        if item.is_deleted {
            delete_entity(&tx, entity_type, id).map_err(SyncError::storage)?;
        } else {
            upsert_entity(&tx, &item.doc).map_err(SyncError::storage)?;
        }
        ledger::remove(&tx, entity_type, id).map_err(SyncError::storage)?;
        applied.push(id.to_string());
    }

    tx.commit().map_err(SyncError::storage)?;
    debug!(count = applied.len(), "Snapshot applied");
    Ok(applied)
}

/// Record the sync time when nothing failed
fn finish(
    store: &mut Store,
    operation: SyncOperation,
    applied: usize,
    errors: Vec<SyncError>,
) -> SyncOutcome {
    if !errors.is_empty() {
        warn!(%operation, applied, failed = errors.len(), "Sync finished with errors");
        return SyncOutcome::Failed(errors);
    }

    if let Err(error) = store.set_last_sync_time(Utc::now()) {
        return SyncOutcome::Failed(vec![SyncError::storage(error)]);
    }

    info!(%operation, applied, "Sync finished");
    SyncOutcome::Completed { applied }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::config::Config;
    use crate::models::{Entity, EntityType, Episode, EpisodeStatus, Program, Series};
    use crate::sync::message::ImportResponse;
    use crate::sync::transport::TransportError;

    /// In-memory stand-in for the sync server
    #[derive(Default)]
    struct FakeServer {
        exports: StdMutex<Vec<ExportRequest>>,
        corrupt_etag: StdMutex<bool>,
        failing_ids: StdMutex<HashSet<String>>,
        import: StdMutex<Option<ImportResponse>>,
        cleared: StdMutex<Vec<String>>,
        registrations: StdMutex<Vec<(String, Option<String>)>>,
        unregistered: StdMutex<Vec<String>>,
        entered: Option<Arc<Notify>>,
        release: Option<Arc<Notify>>,
    }

    impl FakeServer {
        fn serve_snapshot(&self, json: &str) {
            let body = json.as_bytes().to_vec();
            let etag = format!("\"{}\"", content_hash(&body));
            self.serve_raw(body, Some(etag));
        }

        fn serve_raw(&self, body: Vec<u8>, etag: Option<String>) {
            *self.import.lock().unwrap() = Some(ImportResponse { body, etag });
        }

        fn export_count(&self) -> usize {
            self.exports.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SyncTransport for FakeServer {
        async fn export(
            &self,
            _device_id: &str,
            request: &ExportRequest,
        ) -> Result<Option<String>, TransportError> {
            if let (Some(entered), Some(release)) = (&self.entered, &self.release) {
                entered.notify_one();
                release.notified().await;
            }

            self.exports.lock().unwrap().push(request.clone());
            if self.failing_ids.lock().unwrap().contains(&request.id) {
                return Err(TransportError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            if *self.corrupt_etag.lock().unwrap() {
                return Ok(Some("\"not-the-hash\"".to_string()));
            }
            Ok(Some(format!("\"{}\"", content_hash(&request.body))))
        }

        async fn import(
            &self,
            _device_id: &str,
            _mode: ImportMode,
        ) -> Result<ImportResponse, TransportError> {
            self.import
                .lock()
                .unwrap()
                .clone()
                .ok_or(TransportError::MissingHeader("ETag"))
        }

        async fn clear_pending(&self, _device_id: &str, id: &str) -> Result<(), TransportError> {
            self.cleared.lock().unwrap().push(id.to_string());
            Ok(())
        }

        async fn register_device(
            &self,
            name: &str,
            current_id: Option<&str>,
        ) -> Result<String, TransportError> {
            self.registrations
                .lock()
                .unwrap()
                .push((name.to_string(), current_id.map(str::to_string)));
            Ok("dev-1".to_string())
        }

        async fn unregister_device(&self, device_id: &str) -> Result<(), TransportError> {
            self.unregistered.lock().unwrap().push(device_id.to_string());
            Ok(())
        }
    }

    fn new_store() -> Store {
        Store::open_in_memory(Config::default()).unwrap()
    }

    fn registered_store() -> Store {
        let mut store = new_store();
        store.set_device(&Device::new("dev-1", "Test")).unwrap();
        store
    }

    fn engine(store: Store, server: FakeServer) -> SyncEngine<FakeServer> {
        SyncEngine::new(Arc::new(Mutex::new(store)), server)
    }

    fn seed(store: &mut Store) {
        store
            .save_program(&Program {
                id: "p1".to_string(),
                name: "Chuck".to_string(),
            })
            .unwrap();
        store
            .save_series(&Series {
                id: "s1".to_string(),
                name: "Season 1".to_string(),
                program_id: "p1".to_string(),
                now_showing: Some(1),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_push_requires_registered_device() {
        let mut store = new_store();
        seed(&mut store);
        let engine = engine(store, FakeServer::default());

        let outcome = engine.push().await;
        assert_eq!(outcome, SyncOutcome::Failed(vec![SyncError::NotRegistered]));
        assert_eq!(engine.transport.export_count(), 0);
    }

    #[tokio::test]
    async fn test_push_clears_accepted_entries() {
        let mut store = registered_store();
        seed(&mut store);
        store.save_program(&Program {
            id: "gone".to_string(),
            name: "Gone".to_string(),
        })
        .unwrap();
        store.remove_program("gone").unwrap();

        let engine = engine(store, FakeServer::default());
        let outcome = engine.push().await;
        assert_eq!(outcome, SyncOutcome::Completed { applied: 3 });

        let store = engine.store().lock().await;
        assert_eq!(store.count_pending_changes().unwrap(), 0);
        assert!(store.last_sync_time().unwrap().is_some());

        let exports = engine.transport.exports.lock().unwrap();
        let deleted = exports
            .iter()
            .find(|r| r.id == "gone")
            .unwrap();
        assert_eq!(deleted.action, SyncAction::Deleted);
        assert!(deleted.body.is_empty());
    }

    #[tokio::test]
    async fn test_push_mismatch_keeps_entry_for_retry() {
        let mut store = registered_store();
        seed(&mut store);

        let server = FakeServer::default();
        *server.corrupt_etag.lock().unwrap() = true;
        let engine = engine(store, server);

        match engine.push().await {
            SyncOutcome::Failed(errors) => {
                assert_eq!(errors.len(), 2);
                assert!(errors
                    .iter()
                    .all(|e| matches!(e, SyncError::ChecksumMismatch { .. })));
            }
            other => panic!("Expected failure, got {:?}", other),
        }
        {
            let store = engine.store().lock().await;
            assert_eq!(store.count_pending_changes().unwrap(), 2);
            assert!(store.last_sync_time().unwrap().is_none());
        }

        *engine.transport.corrupt_etag.lock().unwrap() = false;
        assert_eq!(engine.push().await, SyncOutcome::Completed { applied: 2 });
        assert_eq!(engine.transport.export_count(), 4);
        assert_eq!(
            engine.store().lock().await.count_pending_changes().unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_push_partial_failure_continues_batch() {
        let mut store = registered_store();
        seed(&mut store);

        let server = FakeServer::default();
        server.failing_ids.lock().unwrap().insert("s1".to_string());
        let engine = engine(store, server);

        match engine.push().await {
            SyncOutcome::Failed(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(matches!(errors[0], SyncError::Transport(_)));
            }
            other => panic!("Expected failure, got {:?}", other),
        }

        let store = engine.store().lock().await;
        let pending = store.pending_changes().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].entity_type, EntityType::Series);
    }

    #[tokio::test]
    async fn test_second_sync_while_running_is_rejected() {
        let mut store = registered_store();
        seed(&mut store);

        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let server = FakeServer {
            entered: Some(entered.clone()),
            release: Some(release.clone()),
            ..FakeServer::default()
        };
        let engine = engine(store, server);

        let (first, second) = tokio::join!(engine.push(), async {
            entered.notified().await;
            let running = engine.running();
            let pull = engine.pull(ImportMode::Changes).await;
            let push = engine.push().await;
            release.notify_waiters();
            release.notify_one();
            (running, pull, push)
        });

        assert!(first.is_success());
        assert_eq!(second.0, Some(SyncOperation::Push));
        assert_eq!(second.1, SyncOutcome::AlreadyRunning);
        assert_eq!(second.2, SyncOutcome::AlreadyRunning);
        assert_eq!(engine.running(), None);
    }

    #[tokio::test]
    async fn test_pull_checksum_mismatch_applies_nothing() {
        let mut store = registered_store();
        seed(&mut store);

        let server = FakeServer::default();
        server.serve_raw(
            br#"{"schemaVersion":3,"data":[{"doc":{"type":"Program","id":"p2","programName":"New"},"pending":["dev-1"]}]}"#.to_vec(),
            Some("\"bogus\"".to_string()),
        );
        let engine = engine(store, server);

        match engine.pull(ImportMode::Changes).await {
            SyncOutcome::Failed(errors) => {
                assert!(matches!(errors[0], SyncError::ChecksumMismatch { .. }))
            }
            other => panic!("Expected failure, got {:?}", other),
        }

        let store = engine.store().lock().await;
        assert_eq!(store.count_programs().unwrap(), 1);
        assert!(store.find_program("p2").unwrap().is_none());
        assert_eq!(store.count_pending_changes().unwrap(), 2);
        assert!(engine.transport.cleared.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pull_version_mismatch_applies_nothing() {
        let server = FakeServer::default();
        server.serve_snapshot(
            r#"{"schemaVersion":2,"data":[{"doc":{"type":"Program","id":"p2"},"pending":["dev-1"]}]}"#,
        );
        let engine = engine(registered_store(), server);

        assert_eq!(
            engine.pull(ImportMode::Changes).await,
            SyncOutcome::Failed(vec![SyncError::VersionMismatch {
                local: 3,
                remote: 2
            }])
        );
        assert_eq!(engine.store().lock().await.count_programs().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pull_changes_applies_pending_items_only() {
        let mut store = registered_store();
        seed(&mut store);
        let mut episode = Episode::new("s1", "Pilot");
        episode.id = "e1".to_string();
        store.save_episode(&episode).unwrap();

        let server = FakeServer::default();
        server.serve_snapshot(
            r#"{"schemaVersion":3,"data":[
                {"doc":{"type":"Program","id":"p1","programName":"Chuck (2007)"},"pending":["dev-1","dev-2"]},
                {"doc":{"type":"Series","id":"s9","seriesName":"Mine","programId":"p1"},"pending":["dev-2"]},
                {"doc":{"type":"Episode","id":"e1"},"isDeleted":true,"pending":["dev-1"]},
                {"doc":{"type":"Episode","id":"e2","episodeName":"Two","seriesId":"s1","status":"Recorded","statusDate":"05-Mar"},"pending":["dev-1"]}
            ]}"#,
        );
        let engine = engine(store, server);

        assert_eq!(
            engine.pull(ImportMode::Changes).await,
            SyncOutcome::Completed { applied: 3 }
        );

        let store = engine.store().lock().await;
        assert_eq!(store.find_program("p1").unwrap().unwrap().name, "Chuck (2007)");
        assert!(store.find_series("s9").unwrap().is_none());
        assert!(store.find_episode("e1").unwrap().is_none());

        let e2 = store.find_episode("e2").unwrap().unwrap();
        assert_eq!(e2.status, EpisodeStatus::Recorded);
        assert_eq!(crate::dates::to_partial(e2.status_date.unwrap()), "05-Mar");

        // Applied items lose their ledger entries; untouched ones keep them
        assert!(store.pending_change(EntityType::Program, "p1").unwrap().is_none());
        assert!(store.pending_change(EntityType::Episode, "e1").unwrap().is_none());
        assert!(store.pending_change(EntityType::Series, "s1").unwrap().is_some());
        assert!(store.last_sync_time().unwrap().is_some());

        assert_eq!(
            *engine.transport.cleared.lock().unwrap(),
            vec!["p1".to_string(), "e1".to_string(), "e2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_pull_all_replaces_local_data_and_ledger() {
        let mut store = registered_store();
        seed(&mut store);

        let server = FakeServer::default();
        server.serve_snapshot(
            r#"{"schemaVersion":3,"data":[
                {"doc":{"type":"Program","id":"p7","programName":"Remote"}}
            ]}"#,
        );
        let engine = engine(store, server);

        assert_eq!(
            engine.pull(ImportMode::All).await,
            SyncOutcome::Completed { applied: 1 }
        );

        let store = engine.store().lock().await;
        assert!(store.find_program("p1").unwrap().is_none());
        assert!(store.find_series("s1").unwrap().is_none());
        assert_eq!(
            store.find(EntityType::Program, "p7").unwrap(),
            Some(Entity::Program(Program {
                id: "p7".to_string(),
                name: "Remote".to_string()
            }))
        );
        assert_eq!(store.count_pending_changes().unwrap(), 0);
        assert!(engine.transport.cleared.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_and_rename_device() {
        let engine = engine(new_store(), FakeServer::default());

        let device = engine.register_device("Laptop").await.unwrap();
        assert_eq!(device, Device::new("dev-1", "Laptop"));

        engine.register_device("Desk").await.unwrap();
        assert_eq!(
            *engine.transport.registrations.lock().unwrap(),
            vec![
                ("Laptop".to_string(), None),
                ("Desk".to_string(), Some("dev-1".to_string())),
            ]
        );

        let status = engine.status().await.unwrap();
        assert_eq!(status.device, Some(Device::new("dev-1", "Desk")));
        assert_eq!(status.pending_changes, 0);
        assert_eq!(status.running, None);
    }

    #[tokio::test]
    async fn test_unregister_device() {
        let engine = engine(registered_store(), FakeServer::default());

        let removed = engine.unregister_device().await.unwrap();
        assert_eq!(removed.map(|d| d.id), Some("dev-1".to_string()));
        assert_eq!(
            *engine.transport.unregistered.lock().unwrap(),
            vec!["dev-1".to_string()]
        );
        assert!(engine.store().lock().await.device().unwrap().is_none());

        assert_eq!(engine.unregister_device().await.unwrap(), None);
        assert_eq!(
            engine.push().await,
            SyncOutcome::Failed(vec![SyncError::NotRegistered])
        );
    }
}
