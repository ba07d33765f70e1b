//! User-visible notices for errors the sync core escalates.
//!
//! The core recovers version conflicts on its own; anything else ends up
//! here so the host can show it instead of failing silently.

use quire_collab::SyncError;
use quire_core::DocumentName;
use std::collections::VecDeque;
use std::fmt;

use crate::error::HostError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// The next local change retries on its own.
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub document: Option<DocumentName>,
    pub message: String,
}

impl Notice {
    pub fn from_error(document: Option<&DocumentName>, error: &HostError) -> Self {
        let level = match error {
            HostError::Sync(SyncError::RetriesExhausted { .. }) => NoticeLevel::Warning,
            _ => NoticeLevel::Error,
        };
        Self {
            level,
            document: document.cloned(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        match &self.document {
            Some(doc) => write!(f, "[{level}] {doc}: {}", self.message),
            None => write!(f, "[{level}] {}", self.message),
        }
    }
}

/// Bounded queue; the oldest notice is dropped when full.
#[derive(Debug)]
pub struct NoticeQueue {
    notices: VecDeque<Notice>,
    limit: usize,
}

impl NoticeQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            notices: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, notice: Notice) {
        if self.notices.len() == self.limit {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.notices.back()
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}

impl Default for NoticeQueue {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> DocumentName {
        DocumentName::new("a.md").unwrap()
    }

    #[test]
    fn test_retries_exhausted_is_warning() {
        let err = HostError::Sync(SyncError::RetriesExhausted {
            document: doc(),
            attempts: 5,
        });
        let notice = Notice::from_error(Some(&doc()), &err);
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.to_string().starts_with("[warning] a.md:"));
    }

    #[test]
    fn test_unknown_document_is_error() {
        let err = HostError::Sync(SyncError::UnknownDocument(doc()));
        assert_eq!(Notice::from_error(None, &err).level, NoticeLevel::Error);
    }

    #[test]
    fn test_queue_drops_oldest() {
        let mut queue = NoticeQueue::new(2);
        for i in 0..3 {
            queue.push(Notice {
                level: NoticeLevel::Error,
                document: None,
                message: format!("n{i}"),
            });
        }
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.latest().map(|n| n.message.as_str()), Some("n2"));
        let drained = queue.drain();
        assert_eq!(drained[0].message, "n1");
        assert!(queue.is_empty());
    }
}
