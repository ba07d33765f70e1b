//! Client-side copy of every document's log.
//!
//! Grown by accepted local pushes and by pulled remote entries. After each
//! application its length for a document equals the editor's version.

use quire_core::{ChangeEntry, DocumentName};
use std::collections::HashMap;

use crate::error::SyncError;

#[derive(Debug, Default)]
pub struct LocalMirror {
    documents: HashMap<DocumentName, Vec<ChangeEntry>>,
}

impl LocalMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a document. Existing entries are kept.
    pub fn register(&mut self, document: &DocumentName) {
        self.documents.entry(document.clone()).or_default();
    }

    pub fn contains(&self, document: &DocumentName) -> bool {
        self.documents.contains_key(document)
    }

    pub fn entries(&self, document: &DocumentName) -> Result<&[ChangeEntry], SyncError> {
        self.documents
            .get(document)
            .map(Vec::as_slice)
            .ok_or_else(|| SyncError::UnknownDocument(document.clone()))
    }

    pub fn version(&self, document: &DocumentName) -> Result<u64, SyncError> {
        self.entries(document).map(|e| e.len() as u64)
    }

    /// Append entries and return the mirror's new version for the document.
    pub fn extend(
        &mut self,
        document: &DocumentName,
        entries: &[ChangeEntry],
    ) -> Result<u64, SyncError> {
        let log = self
            .documents
            .get_mut(document)
            .ok_or_else(|| SyncError::UnknownDocument(document.clone()))?;
        log.extend_from_slice(entries);
        Ok(log.len() as u64)
    }

    pub fn remove(&mut self, document: &DocumentName) -> Option<Vec<ChangeEntry>> {
        self.documents.remove(document)
    }

    pub fn documents(&self) -> Vec<DocumentName> {
        let mut names: Vec<_> = self.documents.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::ClientId;

    #[test]
    fn test_unknown_document_is_error_not_panic() {
        let mut mirror = LocalMirror::new();
        let doc = DocumentName::new("ghost.md").unwrap();

        assert_eq!(mirror.version(&doc), Err(SyncError::UnknownDocument(doc.clone())));
        assert!(mirror.entries(&doc).is_err());
        assert!(mirror.extend(&doc, &[]).is_err());
    }

    #[test]
    fn test_extend_grows_version() {
        let mut mirror = LocalMirror::new();
        let doc = DocumentName::new("a.md").unwrap();
        mirror.register(&doc);

        let e = ChangeEntry::new(vec![1], ClientId::new("alice"));
        assert_eq!(mirror.extend(&doc, &[e.clone(), e.clone()]).unwrap(), 2);
        assert_eq!(mirror.version(&doc).unwrap(), 2);

        // Re-registering keeps what is already mirrored.
        mirror.register(&doc);
        assert_eq!(mirror.entries(&doc).unwrap().len(), 2);
        assert_eq!(mirror.documents(), vec![doc.clone()]);
        assert_eq!(mirror.remove(&doc).map(|v| v.len()), Some(2));
        assert!(!mirror.contains(&doc));
    }
}
