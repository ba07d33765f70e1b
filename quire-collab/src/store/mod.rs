//! Change log store boundary.
//!
//! The store keeps, per document, an ordered sequence of change entries.
//! Its length is the document's version. Writers read the whole sequence,
//! append, and write it back; the write names the version it was based on
//! so a concurrent writer's append is detected instead of overwritten.
//!
//! ```text
//!  read(doc) ──► [e0 e1 … e(V-1)]
//!                       │ append local entries
//!                       ▼
//!  replace(doc, V, [e0 … e(V-1) l0 l1]) ──► accepted ──► version watch = V+2
//!                                      └──► rejected (log moved past V)
//! ```

pub mod memory;
pub mod snapshot;

use async_trait::async_trait;
use quire_core::{ChangeEntry, DocumentName};
use thiserror::Error;
use tokio::sync::watch;

pub use memory::{MemoryStore, StoreStats};
pub use snapshot::{decode_snapshot, encode_snapshot, DocumentLogSnapshot};

/// Storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Change log store unavailable: {0}")]
    Unavailable(String),

    #[error("Refusing to shrink {document} from {current} to {proposed} entries")]
    Truncation {
        document: DocumentName,
        current: u64,
        proposed: u64,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// An externally synchronized, versioned change log keyed by document.
#[async_trait]
pub trait ChangeLogStore: Send + Sync + 'static {
    /// The document's whole entry sequence (empty if never written).
    async fn read(&self, document: &DocumentName) -> Result<Vec<ChangeEntry>, StoreError>;

    /// Replace the document's sequence with `entries`.
    ///
    /// Returns `Ok(false)` without writing when the stored sequence no longer
    /// has `expected_version` entries.
    async fn replace(
        &self,
        document: &DocumentName,
        expected_version: u64,
        entries: Vec<ChangeEntry>,
    ) -> Result<bool, StoreError>;

    /// Version-advance notifications for one document.
    ///
    /// The receiver always holds the latest accepted version.
    async fn subscribe(&self, document: &DocumentName) -> Result<watch::Receiver<u64>, StoreError>;

    /// Every document the store holds a log for.
    async fn documents(&self) -> Result<Vec<DocumentName>, StoreError>;
}
