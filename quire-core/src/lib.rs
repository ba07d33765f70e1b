//! Quire core: shared data model for collaborative text editing.
//!
//! Holds the identities every other crate keys on ([`DocumentName`],
//! [`ClientId`]), the unit of exchange ([`ChangeEntry`]) and the
//! editor-side collaboration state in [`collab`].

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod collab;
pub mod error;

pub use collab::{CollabEditor, EditorState, Received, TextDocument};
pub use error::CoreError;

/// Stable name of one collaboratively edited document.
///
/// Namespaces both the change log and presence. Never empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentName(String);

impl DocumentName {
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::InvalidDocumentName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentName {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocumentName> for String {
    fn from(name: DocumentName) -> Self {
        name.0
    }
}

impl fmt::Display for DocumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one participating client (one editor instance).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random client identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric client id for the CRDT primitive.
    ///
    /// FNV-1a over the identity bytes, masked to 53 bits so it stays a safe
    /// integer for JavaScript peers reading the same updates.
    pub fn crdt_client_id(&self) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in self.0.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        hash & ((1 << 53) - 1)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One atomic, composable edit produced by one client.
///
/// `changes` is an opaque `yrs` v1 update. Once recorded in a change log an
/// entry is never modified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub changes: Vec<u8>,
    #[serde(rename = "clientID")]
    pub client_id: ClientId,
}

impl ChangeEntry {
    pub fn new(changes: Vec<u8>, client_id: ClientId) -> Self {
        Self { changes, client_id }
    }

    pub fn is_from(&self, client_id: &ClientId) -> bool {
        &self.client_id == client_id
    }
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
