//! Remote cursor decorations.
//!
//! Rebuilt in full from an explicit presence snapshot on every call. The
//! overlay never reads shared state, so the same snapshot and document
//! length always yield the same set.

use quire_core::{ClientId, DocumentName};
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::config::SyncConfig;
use crate::presence::{CursorColor, OthersSnapshot};

/// How a remote cursor is drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecorationStyle {
    /// Zero-width marker at the offset
    #[default]
    Widget,
    /// One-unit highlight ending at the offset
    Mark,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CursorDecoration {
    pub client_id: ClientId,
    pub offset: usize,
    pub range: Range<usize>,
    pub color: CursorColor,
    pub style: DecorationStyle,
}

/// Decorations ordered by ascending offset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecorationSet {
    decorations: Vec<CursorDecoration>,
}

impl DecorationSet {
    pub fn len(&self) -> usize {
        self.decorations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CursorDecoration> {
        self.decorations.iter()
    }

    pub fn offsets(&self) -> Vec<usize> {
        self.decorations.iter().map(|d| d.offset).collect()
    }
}

impl IntoIterator for DecorationSet {
    type Item = CursorDecoration;
    type IntoIter = std::vec::IntoIter<CursorDecoration>;

    fn into_iter(self) -> Self::IntoIter {
        self.decorations.into_iter()
    }
}

/// Build decorations for `snapshot`.
///
/// `active = None` keeps participants from every document. A participant
/// gets no decoration when its offset is missing, zero, or past `doc_len`.
pub fn build_decorations(
    snapshot: &OthersSnapshot,
    active: Option<&DocumentName>,
    doc_len: usize,
    style: DecorationStyle,
) -> DecorationSet {
    let mut decorations: Vec<CursorDecoration> = snapshot
        .iter()
        .filter(|record| active.is_none_or(|doc| record.presence.is_in(doc)))
        .filter_map(|record| {
            let offset = record.presence.cursor_offset.filter(|&o| o > 0 && o <= doc_len)?;
            let range = match style {
                DecorationStyle::Mark => offset - 1..offset,
                DecorationStyle::Widget => offset..offset,
            };
            Some(CursorDecoration {
                client_id: record.client_id.clone(),
                offset,
                range,
                color: CursorColor::from_client_id(&record.client_id),
                style,
            })
        })
        .collect();

    // Stable: equal offsets keep snapshot order.
    decorations.sort_by_key(|d| d.offset);
    DecorationSet { decorations }
}

/// Keeps the last built set for a host view.
pub struct CursorOverlay {
    style: DecorationStyle,
    filter_by_document: bool,
    current: DecorationSet,
    rebuilds: u64,
}

impl CursorOverlay {
    pub fn new(style: DecorationStyle, filter_by_document: bool) -> Self {
        Self {
            style,
            filter_by_document,
            current: DecorationSet::default(),
            rebuilds: 0,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.decoration_style, config.filter_by_document)
    }

    /// Rebuild from scratch for the given snapshot and active document.
    pub fn refresh(
        &mut self,
        snapshot: &OthersSnapshot,
        active: &DocumentName,
        doc_len: usize,
    ) -> &DecorationSet {
        let filter = self.filter_by_document.then_some(active);
        self.current = build_decorations(snapshot, filter, doc_len, self.style);
        self.rebuilds += 1;
        &self.current
    }

    pub fn decorations(&self) -> &DecorationSet {
        &self.current
    }

    pub fn style(&self) -> DecorationStyle {
        self.style
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}
