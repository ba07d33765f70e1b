//! Error types for synchronization, presence and configuration.

use quire_core::{CoreError, DocumentName};
use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the synchronization engine.
///
/// Version conflicts are not errors; they come back as
/// [`PushOutcome::Conflict`](crate::sync::PushOutcome::Conflict) and only turn
/// into [`SyncError::RetriesExhausted`] once retrying gives up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Unknown document: {0}")]
    UnknownDocument(DocumentName),

    #[error("Document already open: {0}")]
    AlreadyOpen(DocumentName),

    #[error("Local version {local} of {document} is ahead of the store's {store}")]
    VersionAhead {
        document: DocumentName,
        local: u64,
        store: u64,
    },

    #[error("Push for {document} still conflicting after {attempts} attempts")]
    RetriesExhausted { document: DocumentName, attempts: u32 },

    #[error("Local mirror of {document} holds {mirror} entries but the editor is at version {editor}")]
    MirrorDiverged {
        document: DocumentName,
        mirror: u64,
        editor: u64,
    },

    #[error("Session for {0} was destroyed")]
    Destroyed(DocumentName),

    #[error("Pull loop for {document} stopped: {reason}")]
    PullFailed { document: DocumentName, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Editor error: {0}")]
    Editor(#[from] CoreError),
}

/// Errors raised by the presence channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresenceError {
    #[error("Presence channel closed")]
    Closed,

    #[error("Presence encode error: {0}")]
    Encode(String),

    #[error("Presence decode error: {0}")]
    Decode(String),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}
