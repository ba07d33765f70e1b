//! # quire-collab: update synchronization and presence for Quire
//!
//! Keeps each client's editor convergent with a shared, versioned change log
//! and derives remote cursor decorations from presence snapshots.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   push (optimistic)   ┌──────────────────┐
//! │ DocumentSession  │ ────────────────────► │ ChangeLogStore   │
//! │ (per document)   │ ◄──────────────────── │ (versioned log)  │
//! └────────┬─────────┘   pull [V, L)         └────────┬─────────┘
//!          │                                          │
//!          ▼                                   watch: version advanced
//! ┌──────────────────┐                                │
//! │ CollabEditor     │ ◄──── wakes every parked pull ─┘
//! └──────────────────┘
//!
//! ┌──────────────────┐   OthersSnapshot      ┌──────────────────┐
//! │ PresenceHub      │ ────────────────────► │ CursorOverlay    │
//! │ (per room)       │                       │ (DecorationSet)  │
//! └──────────────────┘                       └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`store`]: change log boundary, in-memory store, compressed snapshots
//! - [`sync`]: push/pull protocol, document sessions, local mirror
//! - [`presence`]: presence records, local publishing, participant summary
//! - [`channel`]: in-memory presence channel with per-room fan-out
//! - [`overlay`]: cursor decorations derived from a presence snapshot
//! - [`config`]: tunables shared by the above

pub mod channel;
pub mod config;
pub mod error;
pub mod overlay;
pub mod presence;
pub mod store;
pub mod sync;

// Re-exports for convenience
pub use channel::{PresenceGroup, PresenceHub, PresenceStats, PresenceSubscription};
pub use config::SyncConfig;
pub use error::{ConfigError, PresenceError, SyncError};
pub use overlay::{build_decorations, CursorDecoration, CursorOverlay, DecorationSet, DecorationStyle};
pub use presence::{
    participant_summary, CursorColor, LocalPresence, OthersSnapshot, Presence, PresenceMessage,
    PresenceRecord, PresenceTracker,
};
pub use store::{ChangeLogStore, MemoryStore, StoreError, StoreStats};
pub use sync::{
    DocumentSession, LocalMirror, PendingPull, PullOutcome, PushOutcome, SessionState, SyncEngine,
};
