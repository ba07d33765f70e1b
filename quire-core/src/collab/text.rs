use yrs::updates::decoder::Decode;
use yrs::{Doc, GetString, Text, TextRef, Transact, Update};

use crate::{ClientId, CoreError};

/// Name of the shared text root inside every document.
const TEXT_ROOT: &str = "content";

/// Text buffer backed by a `yrs` document.
///
/// This is the change-composition primitive: local edits produce v1 updates,
/// and remote updates merge in any order without a rebase step.
pub struct TextDocument {
    doc: Doc,
    text: TextRef,
}

impl TextDocument {
    pub fn new(client_id: &ClientId) -> Self {
        let doc = Doc::with_client_id(client_id.crdt_client_id());
        let text = doc.get_or_insert_text(TEXT_ROOT);
        Self { doc, text }
    }

    /// Insert `chunk` at `offset` and return the encoded update.
    pub fn insert(&mut self, offset: usize, chunk: &str) -> Result<Vec<u8>, CoreError> {
        self.check_range(offset, offset)?;
        let mut txn = self.doc.transact_mut();
        self.text.insert(&mut txn, offset as u32, chunk);
        Ok(txn.encode_update_v1())
    }

    /// Remove `len` units starting at `offset` and return the encoded update.
    pub fn delete(&mut self, offset: usize, len: usize) -> Result<Vec<u8>, CoreError> {
        self.check_range(offset, offset + len)?;
        let mut txn = self.doc.transact_mut();
        self.text.remove_range(&mut txn, offset as u32, len as u32);
        Ok(txn.encode_update_v1())
    }

    /// Merge an update produced by any client.
    pub fn apply_update(&mut self, update: &[u8]) -> Result<(), CoreError> {
        let update = Self::decode(update)?;
        self.apply_decoded(update)
    }

    /// Decode an update without touching the document.
    pub fn decode(update: &[u8]) -> Result<Update, CoreError> {
        Ok(Update::decode_v1(update)?)
    }

    pub fn apply_decoded(&mut self, update: Update) -> Result<(), CoreError> {
        let mut txn = self.doc.transact_mut();
        txn.apply_update(update)
            .map_err(|e| CoreError::Apply(e.to_string()))
    }

    pub fn content(&self) -> String {
        let txn = self.doc.transact();
        self.text.get_string(&txn)
    }

    pub fn len(&self) -> usize {
        let txn = self.doc.transact();
        self.text.len(&txn) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offsets are bytes and must fall on character boundaries of the content.
    fn check_range(&self, offset: usize, end: usize) -> Result<(), CoreError> {
        let content = self.content();
        let len = content.len();
        if offset > end || end > len {
            return Err(CoreError::OutOfBounds { offset, end, len });
        }
        for at in [offset, end] {
            if !content.is_char_boundary(at) {
                return Err(CoreError::InvalidOffset { offset: at });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_generates_update() {
        let mut doc = TextDocument::new(&ClientId::new("alice"));
        let update = doc.insert(0, "hello").unwrap();
        assert!(!update.is_empty());
        assert_eq!(doc.content(), "hello");
        assert_eq!(doc.len(), 5);
    }

    #[test]
    fn test_delete_range() {
        let mut doc = TextDocument::new(&ClientId::new("alice"));
        doc.insert(0, "hello world").unwrap();
        doc.delete(5, 6).unwrap();
        assert_eq!(doc.content(), "hello");
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut doc = TextDocument::new(&ClientId::new("alice"));
        doc.insert(0, "abc").unwrap();

        assert_eq!(
            doc.insert(4, "x"),
            Err(CoreError::OutOfBounds { offset: 4, end: 4, len: 3 })
        );
        assert!(doc.delete(2, 5).is_err());
        assert_eq!(doc.content(), "abc");
    }

    #[test]
    fn test_offset_inside_character_rejected() {
        let mut doc = TextDocument::new(&ClientId::new("alice"));
        doc.insert(0, "é").unwrap();

        assert_eq!(doc.insert(1, "x"), Err(CoreError::InvalidOffset { offset: 1 }));
        assert_eq!(doc.delete(0, 1), Err(CoreError::InvalidOffset { offset: 1 }));
        assert_eq!(doc.content(), "é");

        doc.insert(2, "x").unwrap();
        doc.delete(0, 2).unwrap();
        assert_eq!(doc.content(), "x");
    }

    #[test]
    fn test_remote_update_convergence() {
        let mut alice = TextDocument::new(&ClientId::new("alice"));
        let mut bob = TextDocument::new(&ClientId::new("bob"));

        let a = alice.insert(0, "left").unwrap();
        let b = bob.insert(0, "right").unwrap();

        alice.apply_update(&b).unwrap();
        bob.apply_update(&a).unwrap();

        assert_eq!(alice.content(), bob.content());
        assert_eq!(alice.len(), 9);
    }

    #[test]
    fn test_apply_update_is_idempotent() {
        let mut alice = TextDocument::new(&ClientId::new("alice"));
        let mut bob = TextDocument::new(&ClientId::new("bob"));

        let update = alice.insert(0, "once").unwrap();
        bob.apply_update(&update).unwrap();
        bob.apply_update(&update).unwrap();
        assert_eq!(bob.content(), "once");
    }

    #[test]
    fn test_decode_empty_update_fails() {
        let mut doc = TextDocument::new(&ClientId::new("alice"));
        assert!(matches!(
            doc.apply_update(&[]),
            Err(CoreError::Decode(_)) | Err(CoreError::Apply(_))
        ));
    }
}
