//! # quire-host: the host editor side of Quire
//!
//! Feeds host events (text changes, document switches) into the sync core,
//! publishes local presence, and produces what the host draws: the active
//! document's text, remote cursor decorations and the participant block.
//!
//! - [`host`]: `HostEditor`, host events and rendered frames
//! - [`presence`]: local presence bridge with a redraw flag
//! - [`notice`]: user-visible notices for escalated errors

pub mod error;
pub mod host;
pub mod notice;
pub mod presence;

pub use error::HostError;
pub use host::{Edit, HostEditor, HostEvent, HostFrame};
pub use notice::{Notice, NoticeLevel, NoticeQueue};
pub use presence::HostPresence;

/// Presence room shared by every host of one workspace.
pub const PRESENCE_ROOM: &str = "quire-presence";
