//! In-memory presence channel with per-room fan-out.
//!
//! Every accepted message re-broadcasts the room's full member list through
//! a tokio broadcast channel; each subscriber removes itself to get its
//! [`OthersSnapshot`]. A subscriber that falls more than `capacity` lists
//! behind skips to the newest one, since only the latest list matters.

use quire_core::ClientId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::RwLock;

use crate::config::SyncConfig;
use crate::error::PresenceError;
use crate::presence::{OthersSnapshot, Presence, PresenceMessage, PresenceRecord};

/// Statistics for monitoring presence traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceStats {
    pub messages_published: u64,
    pub stale_dropped: u64,
    pub lagged: u64,
    pub members: usize,
}

struct AtomicPresenceStats {
    messages_published: AtomicU64,
    stale_dropped: AtomicU64,
    lagged: AtomicU64,
}

impl AtomicPresenceStats {
    fn new() -> Self {
        Self {
            messages_published: AtomicU64::new(0),
            stale_dropped: AtomicU64::new(0),
            lagged: AtomicU64::new(0),
        }
    }
}

struct Member {
    record: PresenceRecord,
    last_timestamp: u64,
}

/// One presence room.
pub struct PresenceGroup {
    sender: broadcast::Sender<Arc<Vec<PresenceRecord>>>,
    /// Join order is the order others appear in snapshots
    members: RwLock<Vec<Member>>,
    capacity: usize,
    stats: AtomicPresenceStats,
}

impl PresenceGroup {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            members: RwLock::new(Vec::new()),
            capacity,
            stats: AtomicPresenceStats::new(),
        }
    }

    /// Add a member with an empty presence and announce it.
    ///
    /// Rejoining clears the member's presence and restarts its timestamps at zero.
    pub async fn join(&self, client_id: &ClientId) -> broadcast::Receiver<Arc<Vec<PresenceRecord>>> {
        let mut members = self.members.write().await;
        let receiver = self.sender.subscribe();
        match members.iter_mut().find(|m| &m.record.client_id == client_id) {
            Some(member) => {
                log::debug!("{client_id} rejoined presence room");
                member.record.presence = Presence::default();
                member.last_timestamp = 0;
            }
            None => members.push(Member {
                record: PresenceRecord {
                    client_id: client_id.clone(),
                    presence: Presence::default(),
                },
                last_timestamp: 0,
            }),
        }
        self.fan_out(&members);
        receiver
    }

    /// Apply a presence message and fan out the new member list.
    ///
    /// Returns the number of subscribers reached; 0 if the update was stale.
    pub async fn publish(&self, msg: &PresenceMessage) -> usize {
        let mut members = self.members.write().await;

        match msg {
            PresenceMessage::Update {
                client_id,
                presence,
                timestamp,
            } => match members.iter_mut().find(|m| &m.record.client_id == client_id) {
                Some(member) if *timestamp <= member.last_timestamp => {
                    self.stats.stale_dropped.fetch_add(1, Ordering::Relaxed);
                    log::trace!(
                        "Dropped stale presence from {client_id} ({timestamp} <= {})",
                        member.last_timestamp
                    );
                    return 0;
                }
                Some(member) => {
                    member.record.presence = presence.clone();
                    member.last_timestamp = *timestamp;
                }
                None => members.push(Member {
                    record: PresenceRecord {
                        client_id: client_id.clone(),
                        presence: presence.clone(),
                    },
                    last_timestamp: *timestamp,
                }),
            },
            PresenceMessage::Leave { client_id } => {
                members.retain(|m| &m.record.client_id != client_id);
                log::debug!("{client_id} left presence room");
            }
        }

        self.stats.messages_published.fetch_add(1, Ordering::Relaxed);
        self.fan_out(&members)
    }

    /// Decode and publish a bincode-encoded [`PresenceMessage`].
    pub async fn publish_raw(&self, bytes: &[u8]) -> Result<usize, PresenceError> {
        let msg = PresenceMessage::decode(bytes)?;
        Ok(self.publish(&msg).await)
    }

    fn fan_out(&self, members: &[Member]) -> usize {
        let list = Arc::new(members.iter().map(|m| m.record.clone()).collect::<Vec<_>>());
        // No receivers is fine: nobody is listening yet.
        self.sender.send(list).unwrap_or(0)
    }

    pub async fn members(&self) -> Vec<PresenceRecord> {
        self.members
            .read()
            .await
            .iter()
            .map(|m| m.record.clone())
            .collect()
    }

    pub async fn member_count(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn stats(&self) -> PresenceStats {
        PresenceStats {
            messages_published: self.stats.messages_published.load(Ordering::Relaxed),
            stale_dropped: self.stats.stale_dropped.load(Ordering::Relaxed),
            lagged: self.stats.lagged.load(Ordering::Relaxed),
            members: self.member_count().await,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Maps room names to presence groups.
pub struct PresenceHub {
    rooms: RwLock<HashMap<String, Arc<PresenceGroup>>>,
    capacity: usize,
}

impl PresenceHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.presence_capacity)
    }

    pub async fn get_or_create(&self, room: &str) -> Arc<PresenceGroup> {
        // Fast path: read lock
        {
            let rooms = self.rooms.read().await;
            if let Some(group) = rooms.get(room) {
                return Arc::clone(group);
            }
        }

        // Slow path: write lock, double-checked
        let mut rooms = self.rooms.write().await;
        if let Some(group) = rooms.get(room) {
            return Arc::clone(group);
        }
        let group = Arc::new(PresenceGroup::new(self.capacity));
        rooms.insert(room.to_string(), Arc::clone(&group));
        group
    }

    /// Join `room` as `client_id`.
    pub async fn join(&self, room: &str, client_id: ClientId) -> PresenceSubscription {
        let group = self.get_or_create(room).await;
        let receiver = group.join(&client_id).await;
        log::debug!("{client_id} joined presence room {room}");
        PresenceSubscription {
            client_id,
            room: room.to_string(),
            group: Arc::downgrade(&group),
            receiver,
        }
    }

    /// Drop a room; its subscribers see [`PresenceError::Closed`].
    pub async fn close_room(&self, room: &str) -> bool {
        self.rooms.write().await.remove(room).is_some()
    }

    pub async fn remove_if_empty(&self, room: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        if let Some(group) = rooms.get(room) {
            if group.member_count().await == 0 {
                rooms.remove(room);
                return true;
            }
        }
        false
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn rooms(&self) -> Vec<String> {
        let mut names: Vec<_> = self.rooms.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

/// One client's view of a presence room.
///
/// Dropping it without [`leave`](Self::leave) keeps the member listed until
/// the same client joins again.
pub struct PresenceSubscription {
    client_id: ClientId,
    room: String,
    group: Weak<PresenceGroup>,
    receiver: broadcast::Receiver<Arc<Vec<PresenceRecord>>>,
}

impl PresenceSubscription {
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    fn group(&self) -> Result<Arc<PresenceGroup>, PresenceError> {
        self.group.upgrade().ok_or(PresenceError::Closed)
    }

    fn others_from(&self, list: &[PresenceRecord]) -> Arc<OthersSnapshot> {
        Arc::new(OthersSnapshot::new(
            list.iter()
                .filter(|r| r.client_id != self.client_id)
                .cloned()
                .collect(),
        ))
    }

    fn record_lag(&self, skipped: u64) {
        if let Some(group) = self.group.upgrade() {
            group.stats.lagged.fetch_add(skipped, Ordering::Relaxed);
        }
        log::debug!("{} skipped {skipped} presence lists", self.client_id);
    }

    /// Wait for the next "others changed" event.
    pub async fn next_others(&mut self) -> Result<Arc<OthersSnapshot>, PresenceError> {
        loop {
            match self.receiver.recv().await {
                Ok(list) => return Ok(self.others_from(&list)),
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => return Err(PresenceError::Closed),
            }
        }
    }

    /// Drain queued events and return the newest, if any.
    pub fn try_next_others(&mut self) -> Result<Option<Arc<OthersSnapshot>>, PresenceError> {
        let mut latest = None;
        loop {
            match self.receiver.try_recv() {
                Ok(list) => latest = Some(list),
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => {
                    if latest.is_none() {
                        return Err(PresenceError::Closed);
                    }
                    break;
                }
            }
        }
        Ok(latest.map(|list| self.others_from(&list)))
    }

    /// Current others, read from the room rather than the event queue.
    pub async fn current_others(&self) -> Result<Arc<OthersSnapshot>, PresenceError> {
        let members = self.group()?.members().await;
        Ok(self.others_from(&members))
    }

    pub async fn publish(&self, msg: &PresenceMessage) -> Result<usize, PresenceError> {
        Ok(self.group()?.publish(msg).await)
    }

    pub async fn publish_raw(&self, bytes: &[u8]) -> Result<usize, PresenceError> {
        self.group()?.publish_raw(bytes).await
    }

    /// Announce departure and stop listening.
    pub async fn leave(self) -> Result<(), PresenceError> {
        let group = self.group()?;
        group
            .publish(&PresenceMessage::Leave {
                client_id: self.client_id.clone(),
            })
            .await;
        Ok(())
    }
}
