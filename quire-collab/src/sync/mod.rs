//! Update synchronization between editors and the change log.
//!
//! - [`push`]: optimistic append guarded by the version token
//! - [`pull`]: gap fetch, parking on the version watch when caught up
//! - [`session`]: per-document pull loop, push serialization and teardown
//! - [`mirror`]: client-side copy of each document's log
//! - [`engine`]: sessions keyed by document

pub mod engine;
pub mod mirror;
pub mod pull;
pub mod push;
pub mod session;

pub use engine::SyncEngine;
pub use mirror::LocalMirror;
pub use pull::{pull_once, pull_updates, PendingPull, PullOutcome};
pub use push::{push_updates, PushOutcome};
pub use session::{DocumentSession, SessionState};
