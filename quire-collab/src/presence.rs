//! Presence: who is in which document, and where their cursor is.
//!
//! ## Flow
//!
//! ```text
//! Local cursor move
//!       │
//!       ▼
//! LocalPresence::update_cursor()   (throttled by presence_interval_ms)
//!       │
//!       ▼
//! PresenceMessage::Update { … }    (bincode on the wire)
//!       │
//!       ▼
//! PresenceGroup (one per room)     stale timestamps dropped
//!       │
//!       ▼  fan-out: full member list
//! PresenceSubscription ──► OthersSnapshot (self removed)
//!       │
//!       ▼
//! PresenceTracker ──► CursorOverlay / participant_summary
//! ```

use quire_core::{ClientId, DocumentName};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::PresenceError;

// ───────────────────────────────────────────────────────────────────
// Core types
// ───────────────────────────────────────────────────────────────────

/// What a participant publishes about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    #[serde(rename = "documentName")]
    pub document_name: Option<DocumentName>,
    #[serde(rename = "cursorOffset")]
    pub cursor_offset: Option<usize>,
}

impl Presence {
    pub fn at(document: DocumentName, cursor_offset: usize) -> Self {
        Self {
            document_name: Some(document),
            cursor_offset: Some(cursor_offset),
        }
    }

    /// Whether this presence names `document`.
    pub fn is_in(&self, document: &DocumentName) -> bool {
        self.document_name.as_ref() == Some(document)
    }
}

/// A remote participant's latest presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub client_id: ClientId,
    pub presence: Presence,
}

/// The other participants, as last reported by the channel.
///
/// Replaced wholesale on every channel event, never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OthersSnapshot {
    pub others: Vec<PresenceRecord>,
}

impl OthersSnapshot {
    pub fn new(others: Vec<PresenceRecord>) -> Self {
        Self { others }
    }

    pub fn count(&self) -> usize {
        self.others.len()
    }

    pub fn is_empty(&self) -> bool {
        self.others.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PresenceRecord> {
        self.others.iter()
    }

    pub fn get(&self, client_id: &ClientId) -> Option<&PresenceRecord> {
        self.others.iter().find(|r| &r.client_id == client_id)
    }
}

/// Participant-count text shown in the host UI.
pub fn participant_summary(others: usize) -> String {
    match others {
        0 => "You're the only one here.".to_string(),
        1 => "There is one other person here.".to_string(),
        n => format!("There are {n} other people here."),
    }
}

// ───────────────────────────────────────────────────────────────────
// Cursor colour
// ───────────────────────────────────────────────────────────────────

/// RGBA colour for a remote cursor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl CursorColor {
    /// Stable colour for a client: the hue comes from the identity hash.
    pub fn from_client_id(client_id: &ClientId) -> Self {
        let hue = ((client_id.crdt_client_id() % 360) as f32) / 360.0;
        let (r, g, b) = hsl_to_rgb(hue, 0.7, 0.6);
        Self { r, g, b, a: 1.0 }
    }

    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// `#rrggbb`, alpha dropped.
    pub fn to_hex(&self) -> String {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "#{:02x}{:02x}{:02x}",
            channel(self.r),
            channel(self.g),
            channel(self.b)
        )
    }
}

impl Default for CursorColor {
    fn default() -> Self {
        Self { r: 0.26, g: 0.52, b: 0.96, a: 1.0 }
    }
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s == 0.0 {
        return (l, l, l);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    (
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    )
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

// ───────────────────────────────────────────────────────────────────
// Wire messages
// ───────────────────────────────────────────────────────────────────

/// Presence traffic on a room's channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceMessage {
    /// Latest presence of one client.
    Update {
        client_id: ClientId,
        presence: Presence,
        /// Per-client monotonic counter; older updates are ignored.
        timestamp: u64,
    },
    /// Clean departure.
    Leave { client_id: ClientId },
}

impl PresenceMessage {
    pub fn encode(&self) -> Result<Vec<u8>, PresenceError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| PresenceError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PresenceError> {
        let (msg, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| PresenceError::Decode(e.to_string()))?;
        Ok(msg)
    }

    pub fn client_id(&self) -> &ClientId {
        match self {
            PresenceMessage::Update { client_id, .. } => client_id,
            PresenceMessage::Leave { client_id } => client_id,
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// Local side
// ───────────────────────────────────────────────────────────────────

/// The local participant's presence and its broadcast throttle.
pub struct LocalPresence {
    client_id: ClientId,
    presence: Presence,
    interval: Duration,
    last_broadcast: Option<Instant>,
    timestamp_counter: u64,
}

impl LocalPresence {
    pub fn new(client_id: ClientId) -> Self {
        Self::with_interval(client_id, Duration::ZERO)
    }

    /// `interval` is the minimum gap between two cursor broadcasts.
    pub fn with_interval(client_id: ClientId, interval: Duration) -> Self {
        Self {
            client_id,
            presence: Presence::default(),
            interval,
            last_broadcast: None,
            timestamp_counter: 0,
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    /// Record a cursor move and return the message to publish, if not throttled.
    ///
    /// A throttled move is still remembered; [`force_broadcast`](Self::force_broadcast) sends it.
    pub fn update_cursor(
        &mut self,
        document: DocumentName,
        cursor_offset: usize,
    ) -> Option<PresenceMessage> {
        self.presence = Presence::at(document, cursor_offset);

        if let Some(last) = self.last_broadcast {
            if last.elapsed() < self.interval {
                return None;
            }
        }
        Some(self.force_broadcast())
    }

    /// Broadcast the current presence regardless of the throttle.
    pub fn force_broadcast(&mut self) -> PresenceMessage {
        self.timestamp_counter += 1;
        self.last_broadcast = Some(Instant::now());

        PresenceMessage::Update {
            client_id: self.client_id.clone(),
            presence: self.presence.clone(),
            timestamp: self.timestamp_counter,
        }
    }

    pub fn leave_message(&self) -> PresenceMessage {
        PresenceMessage::Leave {
            client_id: self.client_id.clone(),
        }
    }
}

/// Holds the latest others snapshot for a host.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    snapshot: Arc<OthersSnapshot>,
    updates: u64,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, snapshot: Arc<OthersSnapshot>) {
        self.snapshot = snapshot;
        self.updates += 1;
    }

    pub fn snapshot(&self) -> Arc<OthersSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn summary(&self) -> String {
        participant_summary(self.snapshot.count())
    }

    /// Number of snapshots received so far.
    pub fn updates(&self) -> u64 {
        self.updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> DocumentName {
        DocumentName::new("notes.md").unwrap()
    }

    #[test]
    fn test_participant_summary() {
        assert_eq!(participant_summary(0), "You're the only one here.");
        assert_eq!(participant_summary(1), "There is one other person here.");
        assert_eq!(participant_summary(5), "There are 5 other people here.");
    }

    #[test]
    fn test_message_codec() {
        let msg = PresenceMessage::Update {
            client_id: ClientId::new("alice"),
            presence: Presence::at(doc(), 12),
            timestamp: 3,
        };
        let bytes = msg.encode().unwrap();
        assert_eq!(PresenceMessage::decode(&bytes).unwrap(), msg);
        assert_eq!(msg.client_id().as_str(), "alice");
    }

    #[test]
    fn test_decode_garbage_is_error() {
        assert!(matches!(
            PresenceMessage::decode(&[0xff]),
            Err(PresenceError::Decode(_))
        ));
    }

    #[test]
    fn test_unthrottled_broadcasts_every_move() {
        let mut local = LocalPresence::new(ClientId::new("alice"));
        let first = local.update_cursor(doc(), 1).unwrap();
        let second = local.update_cursor(doc(), 2).unwrap();

        match (first, second) {
            (
                PresenceMessage::Update { timestamp: t1, .. },
                PresenceMessage::Update { timestamp: t2, presence, .. },
            ) => {
                assert!(t2 > t1);
                assert_eq!(presence.cursor_offset, Some(2));
            }
            other => panic!("unexpected messages: {other:?}"),
        }
    }

    #[test]
    fn test_throttled_move_is_remembered() {
        let mut local = LocalPresence::with_interval(ClientId::new("alice"), Duration::from_secs(60));
        assert!(local.update_cursor(doc(), 1).is_some());
        assert!(local.update_cursor(doc(), 7).is_none());
        assert_eq!(local.presence().cursor_offset, Some(7));

        match local.force_broadcast() {
            PresenceMessage::Update { presence, .. } => assert_eq!(presence.cursor_offset, Some(7)),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_cursor_color_stable() {
        let alice = ClientId::new("alice");
        assert_eq!(
            CursorColor::from_client_id(&alice),
            CursorColor::from_client_id(&alice)
        );
        let hex = CursorColor::from_client_id(&alice).to_hex();
        assert_eq!(hex.len(), 7);
        assert!(hex.starts_with('#'));
        assert_eq!(CursorColor::rgba(1.0, 0.0, 0.0, 1.0).to_hex(), "#ff0000");
    }

    #[test]
    fn test_tracker_replaces_snapshot() {
        let mut tracker = PresenceTracker::new();
        assert_eq!(tracker.summary(), "You're the only one here.");

        tracker.replace(Arc::new(OthersSnapshot::new(vec![PresenceRecord {
            client_id: ClientId::new("bob"),
            presence: Presence::at(doc(), 4),
        }])));
        assert_eq!(tracker.summary(), "There is one other person here.");
        assert_eq!(tracker.updates(), 1);
        assert!(tracker.snapshot().get(&ClientId::new("bob")).is_some());
    }
}
