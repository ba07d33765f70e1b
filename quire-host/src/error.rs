use quire_collab::{ConfigError, PresenceError, StoreError, SyncError};
use quire_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Presence error: {0}")]
    Presence(#[from] PresenceError),

    #[error("Editor error: {0}")]
    Core(#[from] CoreError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No document is active")]
    NoActiveDocument,
}
