//! One document's synchronization session.
//!
//! ```text
//!            open
//!             │
//!             ▼
//!   ┌──────► Idle ──────► AwaitingRemote ──(log grew)──► Applying ─┐
//!   │                        │                                     │
//!   └────────────────────────┼─────────────────────────────────────┘
//!                            │ error                  destroy
//!                            ▼                           │
//!                         Failed ─────────────────► Destroyed
//! ```
//!
//! The pull loop is a spawned task that owns nothing but an `Arc` of the
//! session's shared half. Pushes run on the caller's task. Both funnel
//! reconciled entries through one `apply` step, which holds the editor lock,
//! skips entries the editor already consumed, and grows the local mirror.

use quire_core::{ChangeEntry, CollabEditor, DocumentName};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::mirror::LocalMirror;
use super::pull::{pull_once, pull_updates, PullOutcome};
use super::push::{push_updates, PushOutcome};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::store::ChangeLogStore;

/// Observable session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Pull parked at `version`, waiting for the log to grow
    AwaitingRemote { version: u64 },
    /// Feeding `count` entries to the editor, starting at `version`
    Applying { version: u64, count: usize },
    /// The pull loop stopped on an unrecoverable error
    Failed(String),
    Destroyed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Failed(_) | SessionState::Destroyed)
    }
}

struct SessionShared<S, E> {
    document: DocumentName,
    store: Arc<S>,
    editor: Mutex<E>,
    mirror: Arc<Mutex<LocalMirror>>,
    state: watch::Sender<SessionState>,
    /// Editor version after the last application
    version: watch::Sender<u64>,
    push_in_flight: AtomicBool,
    cancel: CancellationToken,
    config: SyncConfig,
}

impl<S: ChangeLogStore, E: CollabEditor> SessionShared<S, E> {
    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    /// Feed log entries `[base, base + entries.len())` to the editor.
    ///
    /// Entries the editor consumed since `base` was sampled are skipped, so a
    /// pull and an accepted push delivering the same range apply it once.
    async fn apply(&self, base: u64, entries: Vec<ChangeEntry>) -> Result<usize, SyncError> {
        let mut editor = self.editor.lock().await;
        if self.cancel.is_cancelled() {
            return Ok(0);
        }

        let current = editor.version();
        let skip = usize::try_from(current.saturating_sub(base)).unwrap_or(usize::MAX);
        let fresh = entries.get(skip..).unwrap_or_default();
        if fresh.is_empty() {
            return Ok(0);
        }

        self.set_state(SessionState::Applying {
            version: current,
            count: fresh.len(),
        });
        let received = match editor.receive(fresh) {
            Ok(received) => received,
            Err(e) => {
                // Mirror whatever prefix the editor consumed before failing.
                let consumed = usize::try_from(editor.version().saturating_sub(current))
                    .unwrap_or(usize::MAX)
                    .min(fresh.len());
                if consumed > 0 {
                    self.mirror.lock().await.extend(&self.document, &fresh[..consumed])?;
                    self.version.send_replace(editor.version());
                }
                return Err(e.into());
            }
        };

        let mirrored = self.mirror.lock().await.extend(&self.document, fresh)?;
        let editor_version = editor.version();
        if mirrored != editor_version {
            return Err(SyncError::MirrorDiverged {
                document: self.document.clone(),
                mirror: mirrored,
                editor: editor_version,
            });
        }

        self.version.send_replace(editor_version);
        self.set_state(SessionState::Idle);
        log::debug!(
            "Applied {} entries to {} (confirmed {}, merged {}), now at version {editor_version}",
            fresh.len(),
            self.document,
            received.confirmed,
            received.applied
        );
        Ok(fresh.len())
    }
}

async fn run_pull_loop<S: ChangeLogStore, E: CollabEditor>(shared: Arc<SessionShared<S, E>>) {
    log::info!("Pull loop for {} started", shared.document);

    while !shared.cancel.is_cancelled() {
        let version = shared.editor.lock().await.version();
        shared.set_state(SessionState::AwaitingRemote { version });

        let result = match pull_updates(&*shared.store, &shared.document, version, &shared.cancel)
            .await
        {
            Ok(PullOutcome::Delivered(entries)) => shared.apply(version, entries).await.map(|_| ()),
            Ok(PullOutcome::Cancelled) => break,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            log::error!("Pull loop for {} failed: {e}", shared.document);
            shared.set_state(SessionState::Failed(e.to_string()));
            return;
        }
    }

    log::info!("Pull loop for {} stopped", shared.document);
}

/// Resets the push in-flight flag however the push ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A live synchronization session for one document.
///
/// Dropping the session cancels its pull loop; [`destroy`](Self::destroy)
/// additionally waits for the loop and hands the editor back.
pub struct DocumentSession<S, E> {
    shared: Arc<SessionShared<S, E>>,
    pull_task: JoinHandle<()>,
    cancel_guard: DropGuard,
}

impl<S: ChangeLogStore, E: CollabEditor> DocumentSession<S, E> {
    /// Register `document` in the mirror and start pulling from the editor's version.
    ///
    /// Fails with [`SyncError::MirrorDiverged`] if the mirror already holds a
    /// different number of entries than the editor has consumed.
    pub async fn open(
        document: DocumentName,
        store: Arc<S>,
        editor: E,
        mirror: Arc<Mutex<LocalMirror>>,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        let editor_version = editor.version();
        {
            let mut mirror = mirror.lock().await;
            mirror.register(&document);
            let mirrored = mirror.version(&document)?;
            if mirrored != editor_version {
                return Err(SyncError::MirrorDiverged {
                    document,
                    mirror: mirrored,
                    editor: editor_version,
                });
            }
        }

        let cancel = CancellationToken::new();
        let (state, _) = watch::channel(SessionState::Idle);
        let (version, _) = watch::channel(editor_version);
        let shared = Arc::new(SessionShared {
            document,
            store,
            editor: Mutex::new(editor),
            mirror,
            state,
            version,
            push_in_flight: AtomicBool::new(false),
            cancel: cancel.clone(),
            config,
        });

        log::info!(
            "Opened session for {} at version {editor_version}",
            shared.document
        );
        let pull_task = tokio::spawn(run_pull_loop(Arc::clone(&shared)));

        Ok(Self {
            shared,
            pull_task,
            cancel_guard: cancel.drop_guard(),
        })
    }

    pub fn document(&self) -> &DocumentName {
        &self.shared.document
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Wait until the state satisfies `predicate` and return it.
    pub async fn wait_for_state(
        &self,
        mut predicate: impl FnMut(&SessionState) -> bool,
    ) -> SessionState {
        let mut states = self.shared.state.subscribe();
        let state = match states.wait_for(|s| predicate(s)).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    /// Wait until the editor has consumed at least `target` log entries.
    pub async fn wait_for_version(&self, target: u64) -> Result<u64, SyncError> {
        let mut versions = self.shared.version.subscribe();
        let mut states = self.shared.state.subscribe();

        tokio::select! {
            reached = async { versions.wait_for(|v| *v >= target).await.map(|v| *v) } => {
                reached.map_err(|_| SyncError::Destroyed(self.shared.document.clone()))
            }
            state = async { states.wait_for(SessionState::is_terminal).await.map(|s| s.clone()) } => {
                Err(match state {
                    Ok(SessionState::Failed(reason)) => SyncError::PullFailed {
                        document: self.shared.document.clone(),
                        reason,
                    },
                    _ => SyncError::Destroyed(self.shared.document.clone()),
                })
            }
        }
    }

    /// Number of log entries the editor has consumed.
    pub async fn version(&self) -> u64 {
        self.shared.editor.lock().await.version()
    }

    /// Run `f` against the editor (local edits, cursor moves, reads).
    pub async fn edit<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        let mut editor = self.shared.editor.lock().await;
        f(&mut editor)
    }

    /// Push the editor's unconfirmed entries once.
    ///
    /// On acceptance the entries are confirmed in the editor and mirrored
    /// right away; the pull loop skips them when it sees the same range.
    ///
    /// Fails with [`SyncError::PullFailed`] once the pull loop has stopped on
    /// an error, since the editor no longer receives the log.
    pub async fn push(&self) -> Result<PushOutcome, SyncError> {
        self.ensure_live()?;
        if self.shared.push_in_flight.swap(true, Ordering::AcqRel) {
            log::debug!("Push for {} already in flight", self.shared.document);
            return Ok(PushOutcome::InFlight);
        }
        let _in_flight = InFlightGuard(&self.shared.push_in_flight);

        let (version, pending) = {
            let editor = self.shared.editor.lock().await;
            (editor.version(), editor.pending())
        };

        let outcome =
            push_updates(&*self.shared.store, &self.shared.document, version, &pending).await?;
        if outcome.is_accepted() {
            self.shared.apply(version, pending).await?;
        }
        Ok(outcome)
    }

    fn ensure_live(&self) -> Result<(), SyncError> {
        if self.shared.cancel.is_cancelled() {
            return Err(SyncError::Destroyed(self.shared.document.clone()));
        }
        match self.state() {
            SessionState::Failed(reason) => Err(SyncError::PullFailed {
                document: self.shared.document.clone(),
                reason,
            }),
            SessionState::Destroyed => Err(SyncError::Destroyed(self.shared.document.clone())),
            _ => Ok(()),
        }
    }

    /// Apply whatever the log holds past the editor's version, without waiting.
    pub async fn resync(&self) -> Result<usize, SyncError> {
        self.ensure_live()?;
        let version = self.version().await;
        match pull_once(&*self.shared.store, &self.shared.document, version).await? {
            Some(entries) => self.shared.apply(version, entries).await,
            None => Ok(0),
        }
    }

    /// Push, resynchronizing and retrying on conflict.
    ///
    /// Each retry recomputes the version and pending entries from the editor.
    pub async fn push_with_retry(&self) -> Result<PushOutcome, SyncError> {
        let attempts = self.shared.config.push_attempts();

        for attempt in 1..=attempts {
            match self.push().await? {
                PushOutcome::Conflict {
                    local_version,
                    store_version,
                } => {
                    log::warn!(
                        "Push attempt {attempt}/{attempts} for {} conflicted ({local_version} vs {store_version}), resyncing",
                        self.shared.document
                    );
                    self.resync().await?;
                }
                outcome => return Ok(outcome),
            }
        }

        Err(SyncError::RetriesExhausted {
            document: self.shared.document.clone(),
            attempts,
        })
    }

    /// Stop the pull loop, wait for it and return the editor.
    ///
    /// No entry is applied once this returns, even if the log keeps growing.
    pub async fn destroy(self) -> Result<E, SyncError> {
        let DocumentSession {
            shared,
            pull_task,
            cancel_guard,
        } = self;
        let document = shared.document.clone();

        // Dropping the guard cancels the token.
        drop(cancel_guard);
        if let Err(e) = pull_task.await {
            log::error!("Pull loop for {document} panicked: {e}");
        }
        shared.set_state(SessionState::Destroyed);

        let shared = Arc::try_unwrap(shared).map_err(|_| SyncError::Destroyed(document.clone()))?;
        log::info!("Destroyed session for {document}");
        Ok(shared.editor.into_inner())
    }
}
