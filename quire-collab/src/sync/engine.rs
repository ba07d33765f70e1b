//! Multi-document coordinator.
//!
//! Owns one [`DocumentSession`] per open document and the local mirror they
//! share. Every lookup is keyed by the document name the caller captured;
//! nothing consults an "active document".

use quire_core::{CollabEditor, DocumentName};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::mirror::LocalMirror;
use super::session::DocumentSession;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::store::ChangeLogStore;

pub struct SyncEngine<S, E> {
    store: Arc<S>,
    config: SyncConfig,
    mirror: Arc<Mutex<LocalMirror>>,
    sessions: HashMap<DocumentName, DocumentSession<S, E>>,
}

impl<S: ChangeLogStore, E: CollabEditor> SyncEngine<S, E> {
    pub fn new(store: Arc<S>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            mirror: Arc::new(Mutex::new(LocalMirror::new())),
            sessions: HashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Start synchronizing `document` with `editor`.
    pub async fn open(
        &mut self,
        document: DocumentName,
        editor: E,
    ) -> Result<&DocumentSession<S, E>, SyncError> {
        if self.sessions.contains_key(&document) {
            return Err(SyncError::AlreadyOpen(document));
        }

        let session = DocumentSession::open(
            document.clone(),
            Arc::clone(&self.store),
            editor,
            Arc::clone(&self.mirror),
            self.config.clone(),
        )
        .await?;
        Ok(self.sessions.entry(document).or_insert(session))
    }

    pub fn session(&self, document: &DocumentName) -> Result<&DocumentSession<S, E>, SyncError> {
        self.sessions
            .get(document)
            .ok_or_else(|| SyncError::UnknownDocument(document.clone()))
    }

    pub fn is_open(&self, document: &DocumentName) -> bool {
        self.sessions.contains_key(document)
    }

    /// Open documents, sorted by name.
    pub fn documents(&self) -> Vec<DocumentName> {
        let mut names: Vec<_> = self.sessions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn mirror(&self) -> &Arc<Mutex<LocalMirror>> {
        &self.mirror
    }

    /// Tear down one session and return its editor.
    ///
    /// The mirror keeps the document's entries, so reopening with the
    /// returned editor resumes at the same version.
    pub async fn close(&mut self, document: &DocumentName) -> Result<E, SyncError> {
        let session = self
            .sessions
            .remove(document)
            .ok_or_else(|| SyncError::UnknownDocument(document.clone()))?;
        session.destroy().await
    }

    /// Tear down every session; returns the editors keyed by document.
    pub async fn shutdown(&mut self) -> Vec<(DocumentName, Result<E, SyncError>)> {
        let mut closed = Vec::with_capacity(self.sessions.len());
        for document in self.documents() {
            let result = self.close(&document).await;
            closed.push((document, result));
        }
        log::info!("Sync engine shut down ({} sessions)", closed.len());
        closed
    }
}
