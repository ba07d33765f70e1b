//! Compressed change log snapshots.
//!
//! Layout: `[format: u8][lz4(size-prepended) bincode(Vec<DocumentLogSnapshot>)]`.
//! The format byte lets a later layout be rejected instead of misread.

use quire_core::{ChangeEntry, DocumentName};
use serde::{Deserialize, Serialize};

use super::StoreError;

/// Current snapshot layout.
pub const SNAPSHOT_FORMAT: u8 = 1;

/// One document's full change log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLogSnapshot {
    pub document: DocumentName,
    pub entries: Vec<ChangeEntry>,
}

pub fn encode_snapshot(logs: &[DocumentLogSnapshot]) -> Result<Vec<u8>, StoreError> {
    let encoded = bincode::serde::encode_to_vec(logs, bincode::config::standard())
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let compressed = lz4_flex::compress_prepend_size(&encoded);

    let mut out = Vec::with_capacity(compressed.len() + 1);
    out.push(SNAPSHOT_FORMAT);
    out.extend_from_slice(&compressed);
    Ok(out)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<Vec<DocumentLogSnapshot>, StoreError> {
    let (format, body) = bytes
        .split_first()
        .ok_or_else(|| StoreError::Deserialization("empty snapshot".into()))?;
    if *format != SNAPSHOT_FORMAT {
        return Err(StoreError::Deserialization(format!(
            "unsupported snapshot format {format}"
        )));
    }

    let decompressed = lz4_flex::decompress_size_prepended(body)
        .map_err(|e| StoreError::Compression(e.to_string()))?;
    let (logs, _): (Vec<DocumentLogSnapshot>, _) =
        bincode::serde::decode_from_slice(&decompressed, bincode::config::standard())
            .map_err(|e| StoreError::Deserialization(e.to_string()))?;
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::ClientId;

    fn sample() -> Vec<DocumentLogSnapshot> {
        vec![DocumentLogSnapshot {
            document: DocumentName::new("notes.md").unwrap(),
            entries: vec![
                ChangeEntry::new(vec![7; 64], ClientId::new("alice")),
                ChangeEntry::new(vec![7; 64], ClientId::new("bob")),
            ],
        }]
    }

    #[test]
    fn test_snapshot_preserves_entry_order() {
        let bytes = encode_snapshot(&sample()).unwrap();
        assert_eq!(bytes[0], SNAPSHOT_FORMAT);

        let logs = decode_snapshot(&bytes).unwrap();
        assert_eq!(logs, sample());
        assert_eq!(logs[0].entries[1].client_id, ClientId::new("bob"));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let mut bytes = encode_snapshot(&sample()).unwrap();
        bytes[0] = 99;
        assert!(matches!(
            decode_snapshot(&bytes),
            Err(StoreError::Deserialization(_))
        ));
    }

    #[test]
    fn test_empty_and_corrupt_input_rejected() {
        assert!(decode_snapshot(&[]).is_err());
        assert!(decode_snapshot(&[SNAPSHOT_FORMAT, 4, 0, 0, 0, 0xff]).is_err());
    }
}
