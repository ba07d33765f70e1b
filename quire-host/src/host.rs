//! Host editor state: the glue between host events, document sessions,
//! presence and the cursor overlay.
//!
//! `HostEditor` owns one sync engine (one session per open document), the
//! presence bridge and the overlay. Every event names the document it was
//! raised for, and that name is used for the whole operation even if the
//! user switches documents while a push is in flight.

use quire_collab::{
    ChangeLogStore, CursorOverlay, DecorationSet, DecorationStyle, PresenceSubscription,
    PushOutcome, SessionState, SyncConfig, SyncEngine, SyncError,
};
use quire_core::{ClientId, DocumentName, EditorState};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::HostError;
use crate::notice::{Notice, NoticeQueue};
use crate::presence::HostPresence;

/// One local text edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Insert { offset: usize, text: String },
    Delete { offset: usize, len: usize },
    /// Cursor moved without changing text
    None,
}

/// Events raised by the host editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    DocumentChanged {
        document: DocumentName,
        cursor_offset: usize,
        edit: Edit,
    },
    ActiveDocumentSwitched { document: DocumentName },
}

impl HostEvent {
    pub fn document(&self) -> &DocumentName {
        match self {
            HostEvent::DocumentChanged { document, .. } => document,
            HostEvent::ActiveDocumentSwitched { document } => document,
        }
    }
}

/// What the host draws for the active document.
#[derive(Debug, Clone, PartialEq)]
pub struct HostFrame {
    pub document: DocumentName,
    pub text: String,
    pub decorations: DecorationSet,
    /// Participant-count block
    pub participants: String,
}

impl HostFrame {
    /// Text with remote cursors drawn inline: `|` for widgets, `[x]` for marks.
    pub fn annotated(&self) -> String {
        let mut out = String::with_capacity(self.text.len() + self.decorations.len() * 2);
        let mut last = 0;
        for deco in self.decorations.iter() {
            let range = deco.range.clone();
            if range.start < last
                || !self.text.is_char_boundary(range.start)
                || !self.text.is_char_boundary(range.end)
            {
                continue;
            }
            out.push_str(&self.text[last..range.start]);
            match deco.style {
                DecorationStyle::Widget => out.push('|'),
                DecorationStyle::Mark => {
                    out.push('[');
                    out.push_str(&self.text[range.clone()]);
                    out.push(']');
                }
            }
            last = range.end;
        }
        out.push_str(&self.text[last..]);
        out
    }
}

pub struct HostEditor<S> {
    client_id: ClientId,
    engine: SyncEngine<S, EditorState>,
    presence: HostPresence,
    overlay: CursorOverlay,
    notices: NoticeQueue,
    active: Option<DocumentName>,
    /// Documents whose failed pull loop was already reported
    failed: HashSet<DocumentName>,
}

impl<S: ChangeLogStore> HostEditor<S> {
    pub fn new(store: Arc<S>, subscription: PresenceSubscription, config: SyncConfig) -> Self {
        let client_id = subscription.client_id().clone();
        let presence = HostPresence::new(subscription, config.presence_interval());
        let overlay = CursorOverlay::from_config(&config);
        Self {
            client_id,
            engine: SyncEngine::new(store, config),
            presence,
            overlay,
            notices: NoticeQueue::default(),
            active: None,
            failed: HashSet::new(),
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn active_document(&self) -> Option<&DocumentName> {
        self.active.as_ref()
    }

    pub fn engine(&self) -> &SyncEngine<S, EditorState> {
        &self.engine
    }

    /// Open `document` for editing; the first document opened becomes active.
    pub async fn open_document(&mut self, document: &DocumentName) -> Result<(), HostError> {
        if !self.engine.is_open(document) {
            self.engine
                .open(document.clone(), EditorState::new(self.client_id.clone()))
                .await?;
            log::info!("{} opened {document}", self.client_id);
        }
        if self.active.is_none() {
            self.active = Some(document.clone());
        }
        Ok(())
    }

    /// Handle an event, turning any escalated error into a notice.
    pub async fn dispatch(&mut self, event: HostEvent) {
        let document = event.document().clone();
        if let Err(e) = self.handle_event(event).await {
            log::error!("{} failed to handle event for {document}: {e}", self.client_id);
            let failed_loop = matches!(e, HostError::Sync(SyncError::PullFailed { .. }));
            // A failed pull loop is reported once per document.
            if !failed_loop || self.failed.insert(document.clone()) {
                self.notices.push(Notice::from_error(Some(&document), &e));
            }
        }
        self.check_sessions();
    }

    /// Turn sessions whose pull loop stopped on an error into notices.
    ///
    /// Returns the number of newly reported documents.
    pub fn check_sessions(&mut self) -> usize {
        let mut reported = 0;
        for document in self.engine.documents() {
            if self.failed.contains(&document) {
                continue;
            }
            let Ok(session) = self.engine.session(&document) else {
                continue;
            };
            if let SessionState::Failed(reason) = session.state() {
                let error = HostError::Sync(SyncError::PullFailed {
                    document: document.clone(),
                    reason,
                });
                log::error!("{}: {error}", self.client_id);
                self.notices.push(Notice::from_error(Some(&document), &error));
                self.failed.insert(document);
                reported += 1;
            }
        }
        reported
    }

    pub async fn handle_event(&mut self, event: HostEvent) -> Result<(), HostError> {
        match event {
            HostEvent::DocumentChanged {
                document,
                cursor_offset,
                edit,
            } => {
                let session = self.engine.session(&document)?;
                let cursor = session
                    .edit(|editor| -> Result<usize, HostError> {
                        match &edit {
                            Edit::Insert { offset, text } => editor.insert(*offset, text)?,
                            Edit::Delete { offset, len } => editor.delete(*offset, *len)?,
                            Edit::None => {}
                        }
                        editor.set_cursor(cursor_offset);
                        Ok(editor.cursor())
                    })
                    .await?;

                if edit != Edit::None {
                    match session.push_with_retry().await? {
                        PushOutcome::InFlight => {
                            log::debug!("{document}: push in flight, change goes out with the next one")
                        }
                        outcome => log::debug!("{document}: {outcome:?}"),
                    }
                }
                self.presence.cursor_moved(&document, cursor).await?;
            }
            HostEvent::ActiveDocumentSwitched { document } => {
                self.open_document(&document).await?;
                self.active = Some(document.clone());
                let cursor = self.engine.session(&document)?.edit(|e| e.cursor()).await;
                self.presence.cursor_moved(&document, cursor).await?;
                log::info!("{} switched to {document}", self.client_id);
            }
        }
        Ok(())
    }

    /// Pull queued presence events; returns `true` if others changed.
    pub fn poll_presence(&mut self) -> Result<bool, HostError> {
        self.check_sessions();
        Ok(self.presence.poll()?)
    }

    pub async fn wait_for_presence(&mut self) -> Result<(), HostError> {
        Ok(self.presence.wait_for_change().await?)
    }

    /// Publish the local presence regardless of throttling.
    pub async fn flush_presence(&mut self) -> Result<(), HostError> {
        Ok(self.presence.flush().await?)
    }

    pub async fn wait_for_version(
        &self,
        document: &DocumentName,
        version: u64,
    ) -> Result<u64, HostError> {
        Ok(self.engine.session(document)?.wait_for_version(version).await?)
    }

    pub async fn content(&self, document: &DocumentName) -> Result<String, HostError> {
        Ok(self.engine.session(document)?.edit(|e| e.content()).await)
    }

    /// Rebuild the frame for the active document.
    pub async fn render(&mut self) -> Result<HostFrame, HostError> {
        self.check_sessions();
        let document = self.active.clone().ok_or(HostError::NoActiveDocument)?;
        let text = self.content(&document).await?;

        let snapshot = self.presence.snapshot();
        let decorations = self.overlay.refresh(&snapshot, &document, text.len()).clone();
        self.presence.take_dirty();

        Ok(HostFrame {
            document,
            text,
            decorations,
            participants: self.presence.summary(),
        })
    }

    pub fn notices(&self) -> &NoticeQueue {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    /// Leave presence and close every session.
    pub async fn shutdown(mut self) -> Result<(), HostError> {
        for (document, result) in self.engine.shutdown().await {
            if let Err(e) = result {
                log::warn!("Closing {document} failed: {e}");
            }
        }
        self.presence.leave().await?;
        log::info!("{} shut down", self.client_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_collab::{CursorDecoration, MemoryStore, PresenceHub};
    use quire_core::{ClientId, DocumentName};

    fn doc(name: &str) -> DocumentName {
        DocumentName::new(name).unwrap()
    }

    async fn host(store: &Arc<MemoryStore>, hub: &PresenceHub, name: &str) -> HostEditor<MemoryStore> {
        let subscription = hub.join("room", ClientId::new(name)).await;
        HostEditor::new(Arc::clone(store), subscription, SyncConfig::for_testing())
    }

    fn frame(text: &str, decorations: Vec<(usize, DecorationStyle)>) -> HostFrame {
        let snapshot = quire_collab::OthersSnapshot::new(
            decorations
                .iter()
                .enumerate()
                .map(|(i, (offset, _))| quire_collab::PresenceRecord {
                    client_id: ClientId::new(format!("p{i}")),
                    presence: quire_collab::Presence::at(doc("a.md"), *offset),
                })
                .collect(),
        );
        let style = decorations.first().map(|d| d.1).unwrap_or_default();
        HostFrame {
            document: doc("a.md"),
            text: text.to_string(),
            decorations: quire_collab::build_decorations(&snapshot, None, text.len(), style),
            participants: String::new(),
        }
    }

    #[test]
    fn test_annotated_widgets() {
        let f = frame("hello", vec![(2, DecorationStyle::Widget), (5, DecorationStyle::Widget)]);
        assert_eq!(f.annotated(), "he|llo|");
    }

    #[test]
    fn test_annotated_marks() {
        let f = frame("hello", vec![(1, DecorationStyle::Mark)]);
        let deco: Vec<&CursorDecoration> = f.decorations.iter().collect();
        assert_eq!(deco[0].range, 0..1);
        assert_eq!(f.annotated(), "[h]ello");
    }

    #[tokio::test]
    async fn test_render_without_document() {
        let store = Arc::new(MemoryStore::new());
        let hub = PresenceHub::new(8);
        let mut alice = host(&store, &hub, "alice").await;
        assert!(matches!(alice.render().await, Err(HostError::NoActiveDocument)));
    }

    #[tokio::test]
    async fn test_edit_for_unopened_document_becomes_notice() {
        let store = Arc::new(MemoryStore::new());
        let hub = PresenceHub::new(8);
        let mut alice = host(&store, &hub, "alice").await;

        alice
            .dispatch(HostEvent::DocumentChanged {
                document: doc("closed.md"),
                cursor_offset: 0,
                edit: Edit::Insert { offset: 0, text: "x".into() },
            })
            .await;

        let notices = alice.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].document, Some(doc("closed.md")));
    }

    #[tokio::test]
    async fn test_failed_pull_loop_becomes_one_notice() {
        use quire_collab::sync::push_updates;
        use quire_core::ChangeEntry;

        let store = Arc::new(MemoryStore::new());
        let hub = PresenceHub::new(8);
        let mut alice = host(&store, &hub, "alice").await;
        alice.open_document(&doc("a.md")).await.unwrap();

        let bad = ChangeEntry::new(Vec::new(), ClientId::new("mallory"));
        push_updates(&*store, &doc("a.md"), 0, &[bad]).await.unwrap();
        let session = alice.engine().session(&doc("a.md")).unwrap();
        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            session.wait_for_state(SessionState::is_terminal),
        )
        .await
        .unwrap();

        alice.render().await.unwrap();
        let notices = alice.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, crate::NoticeLevel::Error);
        assert_eq!(notices[0].document, Some(doc("a.md")));

        // Further edits are refused without piling up notices.
        alice
            .dispatch(HostEvent::DocumentChanged {
                document: doc("a.md"),
                cursor_offset: 1,
                edit: Edit::Insert { offset: 0, text: "x".into() },
            })
            .await;
        alice.render().await.unwrap();
        assert!(alice.take_notices().is_empty());
        assert_eq!(store.version(&doc("a.md")).await, 1);
    }

    #[tokio::test]
    async fn test_edit_inside_character_becomes_notice() {
        let store = Arc::new(MemoryStore::new());
        let hub = PresenceHub::new(8);
        let mut alice = host(&store, &hub, "alice").await;
        alice.open_document(&doc("a.md")).await.unwrap();

        alice.dispatch(typed_at("a.md", 0, "é")).await;
        alice.dispatch(typed_at("a.md", 1, "x")).await;

        let notices = alice.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(alice.content(&doc("a.md")).await.unwrap(), "é");
        assert_eq!(store.version(&doc("a.md")).await, 1);
    }

    fn typed_at(document: &str, offset: usize, text: &str) -> HostEvent {
        HostEvent::DocumentChanged {
            document: doc(document),
            cursor_offset: offset + text.len(),
            edit: Edit::Insert { offset, text: text.into() },
        }
    }

    #[tokio::test]
    async fn test_local_edit_pushes_and_renders() {
        let store = Arc::new(MemoryStore::new());
        let hub = PresenceHub::new(8);
        let mut alice = host(&store, &hub, "alice").await;
        alice.open_document(&doc("a.md")).await.unwrap();

        alice
            .handle_event(HostEvent::DocumentChanged {
                document: doc("a.md"),
                cursor_offset: 5,
                edit: Edit::Insert { offset: 0, text: "hello".into() },
            })
            .await
            .unwrap();

        assert_eq!(store.version(&doc("a.md")).await, 1);
        let frame = alice.render().await.unwrap();
        assert_eq!(frame.text, "hello");
        assert_eq!(frame.participants, "You're the only one here.");
        assert!(frame.decorations.is_empty());
    }
}
