//! In-memory change log store.
//!
//! Each document gets its own log and its own version watch channel, so a
//! write to one document never wakes pulls parked on another.

use async_trait::async_trait;
use quire_core::{ChangeEntry, DocumentName};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{watch, RwLock};

use super::snapshot::{self, DocumentLogSnapshot};
use super::{ChangeLogStore, StoreError};

/// Statistics for monitoring store traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub documents: usize,
    pub entries: u64,
    pub writes_accepted: u64,
    pub writes_rejected: u64,
}

struct AtomicStoreStats {
    writes_accepted: AtomicU64,
    writes_rejected: AtomicU64,
}

impl AtomicStoreStats {
    fn new() -> Self {
        Self {
            writes_accepted: AtomicU64::new(0),
            writes_rejected: AtomicU64::new(0),
        }
    }
}

/// One document's log plus its version-advance channel.
struct DocumentLog {
    entries: Vec<ChangeEntry>,
    version_tx: watch::Sender<u64>,
}

impl DocumentLog {
    fn new(entries: Vec<ChangeEntry>) -> Self {
        let (version_tx, _) = watch::channel(entries.len() as u64);
        Self { entries, version_tx }
    }

    fn version(&self) -> u64 {
        self.entries.len() as u64
    }
}

/// Change log store held in process memory.
pub struct MemoryStore {
    logs: RwLock<HashMap<DocumentName, DocumentLog>>,
    stats: AtomicStoreStats,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
            stats: AtomicStoreStats::new(),
        }
    }

    /// Build a store pre-populated from document logs.
    pub fn with_logs(logs: Vec<DocumentLogSnapshot>) -> Self {
        let logs = logs
            .into_iter()
            .map(|log| (log.document, DocumentLog::new(log.entries)))
            .collect();
        Self {
            logs: RwLock::new(logs),
            stats: AtomicStoreStats::new(),
        }
    }

    /// Current version of a document (0 if never written).
    pub async fn version(&self, document: &DocumentName) -> u64 {
        self.logs
            .read()
            .await
            .get(document)
            .map_or(0, DocumentLog::version)
    }

    pub async fn stats(&self) -> StoreStats {
        let logs = self.logs.read().await;
        StoreStats {
            documents: logs.len(),
            entries: logs.values().map(DocumentLog::version).sum(),
            writes_accepted: self.stats.writes_accepted.load(Ordering::Relaxed),
            writes_rejected: self.stats.writes_rejected.load(Ordering::Relaxed),
        }
    }

    /// Encode every document log into one compressed snapshot.
    pub async fn export_snapshot(&self) -> Result<Vec<u8>, StoreError> {
        let logs = self.logs.read().await;
        let mut records: Vec<DocumentLogSnapshot> = logs
            .iter()
            .map(|(document, log)| DocumentLogSnapshot {
                document: document.clone(),
                entries: log.entries.clone(),
            })
            .collect();
        drop(logs);
        records.sort_by(|a, b| a.document.cmp(&b.document));
        snapshot::encode_snapshot(&records)
    }

    /// Restore a store from [`export_snapshot`](Self::export_snapshot) output.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self, StoreError> {
        Ok(Self::with_logs(snapshot::decode_snapshot(bytes)?))
    }

    /// Write a snapshot to `path`.
    ///
    /// Plain file write: no fsync, no atomic rename.
    pub async fn save_to(&self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
        let bytes = self.export_snapshot().await?;
        tokio::fs::write(path.as_ref(), &bytes).await?;
        log::info!(
            "Saved change log snapshot ({} bytes) to {}",
            bytes.len(),
            path.as_ref().display()
        );
        Ok(bytes.len())
    }

    /// Load a store from a snapshot file written by [`save_to`](Self::save_to).
    pub async fn load_from(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let store = Self::from_snapshot(&bytes)?;
        log::info!(
            "Loaded change log snapshot from {} ({} documents)",
            path.as_ref().display(),
            store.logs.read().await.len()
        );
        Ok(store)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeLogStore for MemoryStore {
    async fn read(&self, document: &DocumentName) -> Result<Vec<ChangeEntry>, StoreError> {
        Ok(self
            .logs
            .read()
            .await
            .get(document)
            .map(|log| log.entries.clone())
            .unwrap_or_default())
    }

    async fn replace(
        &self,
        document: &DocumentName,
        expected_version: u64,
        entries: Vec<ChangeEntry>,
    ) -> Result<bool, StoreError> {
        let mut logs = self.logs.write().await;
        let log = logs
            .entry(document.clone())
            .or_insert_with(|| DocumentLog::new(Vec::new()));

        let current = log.version();
        if current != expected_version {
            self.stats.writes_rejected.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "Rejected write to {document}: based on version {expected_version}, log is at {current}"
            );
            return Ok(false);
        }

        let proposed = entries.len() as u64;
        if proposed < current {
            return Err(StoreError::Truncation {
                document: document.clone(),
                current,
                proposed,
            });
        }

        log.entries = entries;
        // send_replace updates the value even when nobody is subscribed.
        log.version_tx.send_replace(proposed);
        self.stats.writes_accepted.fetch_add(1, Ordering::Relaxed);
        log::debug!("Accepted write to {document}: version {current} -> {proposed}");
        Ok(true)
    }

    async fn subscribe(&self, document: &DocumentName) -> Result<watch::Receiver<u64>, StoreError> {
        // Fast path: read lock
        {
            let logs = self.logs.read().await;
            if let Some(log) = logs.get(document) {
                return Ok(log.version_tx.subscribe());
            }
        }

        // Slow path: create the log so later writes reach this subscriber
        let mut logs = self.logs.write().await;
        let log = logs
            .entry(document.clone())
            .or_insert_with(|| DocumentLog::new(Vec::new()));
        Ok(log.version_tx.subscribe())
    }

    async fn documents(&self) -> Result<Vec<DocumentName>, StoreError> {
        let mut documents: Vec<DocumentName> = self.logs.read().await.keys().cloned().collect();
        documents.sort();
        Ok(documents)
    }
}
