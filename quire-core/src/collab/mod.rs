//! Editor-side collaboration state.
//!
//! An editor tracks two things for the sync engine: the number of change
//! entries it has consumed from the shared log (its version) and the local
//! entries it produced that the log has not confirmed yet.
//!
//! ```text
//!  local edit ──► unconfirmed queue ──► pending()  ──► push
//!                                                        │
//!  receive(entries) ◄──────────── pull / accepted push ◄─┘
//!     │
//!     ├─ own entry at the head of the queue → confirmed
//!     └─ anything else                      → applied to the text
//! ```

mod text;

use std::collections::VecDeque;

use crate::{ChangeEntry, ClientId, CoreError};

pub use text::TextDocument;

/// Outcome of feeding a batch of log entries to an editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Received {
    /// Own entries that the log confirmed.
    pub confirmed: usize,
    /// Entries merged into the text.
    pub applied: usize,
}

/// The seam between the sync engine and a host editor.
///
/// The engine never inspects the text; it only reads versions, collects
/// pending entries and dispatches reconciled batches.
pub trait CollabEditor: Send + 'static {
    fn client_id(&self) -> &ClientId;

    /// Number of log entries this editor has consumed.
    fn version(&self) -> u64;

    /// Local entries not yet confirmed by the log, oldest first.
    fn pending(&self) -> Vec<ChangeEntry>;

    /// Consume log entries `[version, version + entries.len())`.
    ///
    /// On error, `version()` counts exactly the entries consumed before it.
    fn receive(&mut self, entries: &[ChangeEntry]) -> Result<Received, CoreError>;
}

/// Text editor state with collaboration bookkeeping.
pub struct EditorState {
    client_id: ClientId,
    text: TextDocument,
    version: u64,
    unconfirmed: VecDeque<ChangeEntry>,
    cursor: usize,
}

impl EditorState {
    pub fn new(client_id: ClientId) -> Self {
        let text = TextDocument::new(&client_id);
        Self {
            client_id,
            text,
            version: 0,
            unconfirmed: VecDeque::new(),
            cursor: 0,
        }
    }

    /// Insert text at `offset`, queue the change and move the cursor after it.
    pub fn insert(&mut self, offset: usize, chunk: &str) -> Result<(), CoreError> {
        if chunk.is_empty() {
            return Ok(());
        }
        let changes = self.text.insert(offset, chunk)?;
        self.unconfirmed
            .push_back(ChangeEntry::new(changes, self.client_id.clone()));
        self.cursor = offset + chunk.len();
        Ok(())
    }

    /// Delete `len` units at `offset`, queue the change and park the cursor there.
    pub fn delete(&mut self, offset: usize, len: usize) -> Result<(), CoreError> {
        if len == 0 {
            return Ok(());
        }
        let changes = self.text.delete(offset, len)?;
        self.unconfirmed
            .push_back(ChangeEntry::new(changes, self.client_id.clone()));
        self.cursor = offset;
        Ok(())
    }

    /// Move the cursor, clamped to the document.
    pub fn set_cursor(&mut self, offset: usize) {
        self.cursor = offset.min(self.text.len());
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn content(&self) -> String {
        self.text.content()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn unconfirmed_count(&self) -> usize {
        self.unconfirmed.len()
    }
}

impl CollabEditor for EditorState {
    fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn pending(&self) -> Vec<ChangeEntry> {
        self.unconfirmed.iter().cloned().collect()
    }

    fn receive(&mut self, entries: &[ChangeEntry]) -> Result<Received, CoreError> {
        // Plan the whole batch first so a malformed entry leaves no trace.
        let mut confirmed = 0;
        let mut steps = Vec::with_capacity(entries.len());
        for entry in entries {
            if self.unconfirmed.get(confirmed) == Some(entry) {
                confirmed += 1;
                steps.push(None);
            } else {
                // Own entries from an earlier session land here too; merging
                // an update twice is a no-op for the primitive.
                steps.push(Some(TextDocument::decode(&entry.changes)?));
            }
        }

        let mut received = Received::default();
        for step in steps {
            match step {
                None => {
                    self.unconfirmed.pop_front();
                    received.confirmed += 1;
                }
                Some(update) => {
                    self.text.apply_decoded(update)?;
                    received.applied += 1;
                }
            }
            self.version += 1;
        }

        if received.applied > 0 {
            self.cursor = self.cursor.min(self.text.len());
        }

        log::trace!(
            "{} received {} entries (confirmed {}, applied {}), now at version {}",
            self.client_id,
            entries.len(),
            received.confirmed,
            received.applied,
            self.version
        );
        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor(name: &str) -> EditorState {
        EditorState::new(ClientId::new(name))
    }

    #[test]
    fn test_local_edits_are_pending() {
        let mut ed = editor("alice");
        ed.insert(0, "hello").unwrap();
        ed.insert(5, " world").unwrap();

        assert_eq!(ed.version(), 0);
        assert_eq!(ed.pending().len(), 2);
        assert_eq!(ed.cursor(), 11);
        assert!(ed.pending().iter().all(|e| e.is_from(&ClientId::new("alice"))));
    }

    #[test]
    fn test_empty_edits_are_ignored() {
        let mut ed = editor("alice");
        ed.insert(0, "").unwrap();
        ed.delete(0, 0).unwrap();
        assert!(ed.pending().is_empty());
    }

    #[test]
    fn test_receive_confirms_own_entries() {
        let mut ed = editor("alice");
        ed.insert(0, "abc").unwrap();
        let pending = ed.pending();

        let received = ed.receive(&pending).unwrap();
        assert_eq!(received, Received { confirmed: 1, applied: 0 });
        assert_eq!(ed.version(), 1);
        assert_eq!(ed.unconfirmed_count(), 0);
        assert_eq!(ed.content(), "abc");
    }

    #[test]
    fn test_receive_applies_remote_entries() {
        let mut alice = editor("alice");
        let mut bob = editor("bob");

        bob.insert(0, "from bob").unwrap();
        let remote = bob.pending();

        let received = alice.receive(&remote).unwrap();
        assert_eq!(received, Received { confirmed: 0, applied: 1 });
        assert_eq!(alice.version(), 1);
        assert_eq!(alice.content(), "from bob");
    }

    #[test]
    fn test_receive_interleaved_keeps_unconfirmed_tail() {
        let mut alice = editor("alice");
        let mut bob = editor("bob");

        alice.insert(0, "a1").unwrap();
        alice.insert(2, "a2").unwrap();
        bob.insert(0, "b1").unwrap();

        let a = alice.pending();
        let b = bob.pending();

        // The log accepted bob's entry, then alice's first one.
        let batch = vec![b[0].clone(), a[0].clone()];
        let received = alice.receive(&batch).unwrap();

        assert_eq!(received, Received { confirmed: 1, applied: 1 });
        assert_eq!(alice.version(), 2);
        assert_eq!(alice.pending(), vec![a[1].clone()]);
    }

    #[test]
    fn test_cursor_clamped_after_remote_delete() {
        let mut alice = editor("alice");
        let mut bob = editor("bob");

        alice.insert(0, "hello world").unwrap();
        let seed = alice.pending();
        alice.receive(&seed).unwrap();
        bob.receive(&seed).unwrap();

        bob.delete(0, 11).unwrap();
        alice.set_cursor(11);
        alice.receive(&bob.pending()).unwrap();

        assert!(alice.is_empty());
        assert_eq!(alice.cursor(), 0);
    }

    #[test]
    fn test_receive_rejects_malformed_change() {
        let mut ed = editor("alice");
        let bad = ChangeEntry::new(Vec::new(), ClientId::new("mallory"));
        assert!(ed.receive(&[bad]).is_err());
        assert_eq!(ed.version(), 0);
    }

    #[test]
    fn test_malformed_entry_rejects_whole_batch() {
        let mut alice = editor("alice");
        let mut bob = editor("bob");
        alice.insert(0, "mine").unwrap();
        bob.insert(0, "theirs").unwrap();

        let mut batch = alice.pending();
        batch.extend(bob.pending());
        batch.push(ChangeEntry::new(vec![0xff; 3], ClientId::new("mallory")));

        assert!(matches!(alice.receive(&batch), Err(CoreError::Decode(_))));
        assert_eq!(alice.version(), 0);
        assert_eq!(alice.unconfirmed_count(), 1);
        assert_eq!(alice.content(), "mine");
    }
}
