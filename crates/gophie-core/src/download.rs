// SPDX-License-Identifier: AGPL-3.0
// Gophie Core - Download records
//
// A record wraps one transport download with a small state machine:
// Idle -> Active -> Completed | Failed, and back to Active on retry.
// Callbacks from an operation that was cancelled or superseded by a retry
// are recognized by their generation and ignored.

use crate::address::Address;
use crate::events::{ListenerRegistry, SubscriptionId};
use crate::menu::MenuEntry;
use crate::transport::{Loaded, OperationHandle, Transport, TransportListener};
use crate::types::{ClientError, ErrorKind, GopherError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;
use uuid::Uuid;

/// Lifecycle state of a download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DownloadStatus {
    Idle,
    Active,
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DownloadStatus::Completed | DownloadStatus::Failed)
    }
}

/// Notification emitted by a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadEvent {
    StatusChanged(DownloadStatus),
    Progress { bytes: u64, bytes_per_second: u64 },
}

/// Point-in-time view of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSnapshot {
    pub id: Uuid,
    pub display_text: String,
    pub address: String,
    pub target: PathBuf,
    pub status: DownloadStatus,
    pub bytes: u64,
    pub bytes_per_second: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub last_error: Option<ErrorKind>,
}

struct RecordState {
    status: DownloadStatus,
    bytes: u64,
    bytes_per_second: u64,
    /// Set by the first progress callback of an attempt
    first_progress: Option<Instant>,
    started_at: Option<DateTime<Utc>>,
    last_error: Option<GopherError>,
    generation: u64,
    operation: Option<OperationHandle>,
}

/// One file transfer and its progress
pub struct DownloadRecord {
    id: Uuid,
    entry: MenuEntry,
    target: PathBuf,
    created_at: DateTime<Utc>,
    transport: Arc<dyn Transport>,
    state: Mutex<RecordState>,
    events: ListenerRegistry<DownloadEvent>,
}

impl DownloadRecord {
    /// Create an idle record; nothing is transferred until `start()`
    pub fn new(entry: MenuEntry, target: PathBuf, transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            entry,
            target,
            created_at: Utc::now(),
            transport,
            state: Mutex::new(RecordState {
                status: DownloadStatus::Idle,
                bytes: 0,
                bytes_per_second: 0,
                first_progress: None,
                started_at: None,
                last_error: None,
                generation: 0,
                operation: None,
            }),
            events: ListenerRegistry::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn entry(&self) -> &MenuEntry {
        &self.entry
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> DownloadStatus {
        self.state.lock().unwrap().status
    }

    pub fn is_active(&self) -> bool {
        self.status() == DownloadStatus::Active
    }

    /// Bytes received by the current or last attempt
    pub fn bytes_loaded(&self) -> u64 {
        self.state.lock().unwrap().bytes
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.state.lock().unwrap().bytes_per_second
    }

    /// Wall-clock time of the first progress report of the current attempt
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap().started_at
    }

    /// Whether the last attempt ended through `cancel()`
    pub fn was_cancelled(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.status == DownloadStatus::Failed
            && state.last_error == Some(GopherError::UserCancelled)
    }

    pub fn last_error(&self) -> Option<GopherError> {
        self.state.lock().unwrap().last_error.clone()
    }

    pub fn snapshot(&self) -> DownloadSnapshot {
        let state = self.state.lock().unwrap();
        DownloadSnapshot {
            id: self.id,
            display_text: self.entry.display_text.clone(),
            address: self.entry.canonical_address(),
            target: self.target.clone(),
            status: state.status,
            bytes: state.bytes,
            bytes_per_second: state.bytes_per_second,
            started_at: state.started_at,
            last_error: state.last_error.as_ref().map(GopherError::kind),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&DownloadEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Start or retry the transfer. Does nothing while already active.
    pub fn start(self: &Arc<Self>) {
        let generation = {
            let mut state = self.state.lock().unwrap();
            if state.status == DownloadStatus::Active {
                return;
            }
            state.generation += 1;
            state.status = DownloadStatus::Active;
            state.bytes = 0;
            state.bytes_per_second = 0;
            state.first_progress = None;
            state.started_at = None;
            state.last_error = None;
            state.generation
        };

        tracing::info!(
            "Starting download {} of {} to {:?}",
            self.id,
            self.entry.canonical_address(),
            self.target
        );
        self.events
            .emit(&DownloadEvent::StatusChanged(DownloadStatus::Active));

        let listener = Arc::new(RecordListener {
            record: Arc::downgrade(self),
            generation,
        });
        let operation =
            self.transport
                .download_async(self.entry.address(), self.target.clone(), listener);

        let mut state = self.state.lock().unwrap();
        if state.generation == generation && state.status == DownloadStatus::Active {
            state.operation = Some(operation);
        } else {
            // Cancelled or finished before the handle came back
            operation.cancel();
        }
    }

    /// Stop an active transfer and mark it failed with `UserCancelled`.
    ///
    /// The partial file is left on disk. Returns false when the record was
    /// not active.
    pub fn cancel(&self) -> bool {
        self.stop().is_some()
    }

    /// Cancel, then wait until the transfer task has let go of the file
    pub async fn cancel_and_wait(&self) -> bool {
        match self.stop() {
            Some(Some(operation)) => {
                operation.finished().await;
                true
            }
            Some(None) => true,
            None => false,
        }
    }

    /// Outer None: the record was not active
    fn stop(&self) -> Option<Option<OperationHandle>> {
        let operation = {
            let mut state = self.state.lock().unwrap();
            if state.status != DownloadStatus::Active {
                return None;
            }
            state.generation += 1;
            state.status = DownloadStatus::Failed;
            state.last_error = Some(GopherError::UserCancelled);
            state.operation.take()
        };

        tracing::info!("Download {} cancelled", self.id);
        if let Some(operation) = operation.as_ref() {
            operation.cancel();
        }
        self.events
            .emit(&DownloadEvent::StatusChanged(DownloadStatus::Failed));

        Some(operation)
    }

    /// Remove the target file if it exists
    pub fn delete_file(&self) -> Result<(), ClientError> {
        match std::fs::remove_file(&self.target) {
            Ok(()) => {
                tracing::debug!("Deleted download file {:?}", self.target);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::FileIo(format!(
                "Failed to delete {:?}: {}",
                self.target, e
            ))),
        }
    }

    fn on_progress(&self, generation: u64, bytes: u64) {
        self.on_progress_at(generation, bytes, Instant::now());
    }

    fn on_progress_at(&self, generation: u64, bytes: u64, now: Instant) {
        let bytes_per_second = {
            let mut state = self.state.lock().unwrap();
            if state.generation != generation || state.status != DownloadStatus::Active {
                return;
            }

            match state.first_progress {
                None => {
                    state.first_progress = Some(now);
                    state.started_at = Some(Utc::now());
                }
                Some(first) => {
                    let elapsed = now.saturating_duration_since(first).as_secs();
                    if elapsed >= 1 {
                        state.bytes_per_second = bytes / elapsed;
                    }
                }
            }
            state.bytes = bytes;
            state.bytes_per_second
        };

        self.events.emit(&DownloadEvent::Progress {
            bytes,
            bytes_per_second,
        });
    }

    fn on_finished(&self, generation: u64, outcome: Result<u64, GopherError>) {
        let status = {
            let mut state = self.state.lock().unwrap();
            if state.generation != generation || state.status != DownloadStatus::Active {
                return;
            }

            state.operation = None;
            match outcome {
                Ok(bytes) => {
                    state.bytes = bytes;
                    state.status = DownloadStatus::Completed;
                }
                Err(err) => {
                    tracing::warn!("Download {} failed: {}", self.id, err);
                    state.last_error = Some(err);
                    state.status = DownloadStatus::Failed;
                }
            }
            state.status
        };

        self.events.emit(&DownloadEvent::StatusChanged(status));
    }
}

impl std::fmt::Debug for DownloadRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadRecord")
            .field("id", &self.id)
            .field("address", &self.entry.canonical_address())
            .field("target", &self.target)
            .field("status", &self.status())
            .finish()
    }
}

/// Transport listener bound to one attempt of a record
struct RecordListener {
    record: Weak<DownloadRecord>,
    generation: u64,
}

impl TransportListener for RecordListener {
    fn on_progress(&self, _address: &Address, bytes: u64) {
        if let Some(record) = self.record.upgrade() {
            record.on_progress(self.generation, bytes);
        }
    }

    fn on_loaded(&self, result: Loaded) {
        if let Some(record) = self.record.upgrade() {
            let bytes = match result {
                Loaded::File { bytes, .. } => bytes,
                Loaded::Page(page) => page.byte_len() as u64,
            };
            record.on_finished(self.generation, Ok(bytes));
        }
    }

    fn on_failed(&self, error: GopherError, _address: &Address) {
        if let Some(record) = self.record.upgrade() {
            record.on_finished(self.generation, Err(error));
        }
    }
}
