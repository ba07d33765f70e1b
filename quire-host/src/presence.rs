//! Host presence bridge: turns local cursor moves into presence messages
//! and keeps the latest others snapshot for rendering.
//!
//! ## Data flow
//!
//! ```text
//!  host cursor move
//!       │
//!       ▼
//!  HostPresence::cursor_moved()
//!       │                               ─── throttled PresenceMessage
//!       ▼
//!  PresenceSubscription::publish()
//!
//!  PresenceSubscription events
//!       │
//!       ▼
//!  HostPresence::poll()                 ─── PresenceTracker::replace
//!       │
//!       ▼
//!  HostEditor::render()
//! ```

use quire_collab::{
    LocalPresence, OthersSnapshot, PresenceError, PresenceSubscription, PresenceTracker,
};
use quire_core::{ClientId, DocumentName};
use std::sync::Arc;
use std::time::Duration;

pub struct HostPresence {
    local: LocalPresence,
    subscription: PresenceSubscription,
    tracker: PresenceTracker,
    /// Whether the others snapshot changed since the last render.
    dirty: bool,
}

impl HostPresence {
    pub fn new(subscription: PresenceSubscription, interval: Duration) -> Self {
        let local = LocalPresence::with_interval(subscription.client_id().clone(), interval);
        Self {
            local,
            subscription,
            tracker: PresenceTracker::new(),
            dirty: false,
        }
    }

    pub fn client_id(&self) -> &ClientId {
        self.local.client_id()
    }

    /// Record a local cursor move; returns `true` if it was published.
    pub async fn cursor_moved(
        &mut self,
        document: &DocumentName,
        offset: usize,
    ) -> Result<bool, PresenceError> {
        match self.local.update_cursor(document.clone(), offset) {
            Some(msg) => {
                self.subscription.publish(&msg).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Publish the current presence even if the throttle would hold it.
    pub async fn flush(&mut self) -> Result<(), PresenceError> {
        let msg = self.local.force_broadcast();
        self.subscription.publish(&msg).await?;
        Ok(())
    }

    /// Take every queued "others changed" event; returns `true` if any arrived.
    pub fn poll(&mut self) -> Result<bool, PresenceError> {
        match self.subscription.try_next_others()? {
            Some(snapshot) => {
                self.tracker.replace(snapshot);
                self.dirty = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Wait for the next "others changed" event.
    pub async fn wait_for_change(&mut self) -> Result<(), PresenceError> {
        let snapshot = self.subscription.next_others().await?;
        self.tracker.replace(snapshot);
        self.dirty = true;
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<OthersSnapshot> {
        self.tracker.snapshot()
    }

    pub fn summary(&self) -> String {
        self.tracker.summary()
    }

    /// Return and clear the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub async fn leave(self) -> Result<(), PresenceError> {
        self.subscription.leave().await
    }
}
