//! Optimistic push of local entries to the change log.

use quire_core::{ChangeEntry, DocumentName};

use crate::store::{ChangeLogStore, StoreError};

/// Result of one push attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The log accepted every entry and now has `version` entries.
    Accepted { version: u64, pushed: usize },
    /// The log moved past `local_version`; nothing was written.
    Conflict { local_version: u64, store_version: u64 },
    /// No local entries were waiting.
    NothingToPush,
    /// Another push for the same session has not finished yet.
    InFlight,
}

impl PushOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PushOutcome::Accepted { .. })
    }
}

/// Append `entries` to `document`'s log if the log still has `version` entries.
///
/// The length is checked twice: once against the read copy, and again by the
/// store at write time, so a writer that lands in between still wins.
pub async fn push_updates<S>(
    store: &S,
    document: &DocumentName,
    version: u64,
    entries: &[ChangeEntry],
) -> Result<PushOutcome, StoreError>
where
    S: ChangeLogStore + ?Sized,
{
    if entries.is_empty() {
        return Ok(PushOutcome::NothingToPush);
    }

    let mut log = store.read(document).await?;
    let store_version = log.len() as u64;
    if store_version != version {
        log::warn!(
            "Push to {document} conflicts: local version {version}, log at {store_version}"
        );
        return Ok(PushOutcome::Conflict {
            local_version: version,
            store_version,
        });
    }

    log.extend_from_slice(entries);
    let new_version = log.len() as u64;

    if !store.replace(document, version, log).await? {
        let store_version = store.read(document).await?.len() as u64;
        log::warn!(
            "Push to {document} lost the write race: local version {version}, log at {store_version}"
        );
        return Ok(PushOutcome::Conflict {
            local_version: version,
            store_version,
        });
    }

    log::debug!(
        "Pushed {} entries to {document}: version {version} -> {new_version}",
        entries.len()
    );
    Ok(PushOutcome::Accepted {
        version: new_version,
        pushed: entries.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use quire_core::ClientId;

    fn doc() -> DocumentName {
        DocumentName::new("draft.md").unwrap()
    }

    fn entries(client: &str, n: u8) -> Vec<ChangeEntry> {
        (0..n)
            .map(|i| ChangeEntry::new(vec![i], ClientId::new(client)))
            .collect()
    }

    #[tokio::test]
    async fn test_push_on_matching_version() {
        let store = MemoryStore::new();
        let first = push_updates(&store, &doc(), 0, &entries("alice", 2)).await.unwrap();
        assert_eq!(first, PushOutcome::Accepted { version: 2, pushed: 2 });

        let second = push_updates(&store, &doc(), 2, &entries("alice", 3)).await.unwrap();
        assert_eq!(second, PushOutcome::Accepted { version: 5, pushed: 3 });
        assert_eq!(store.read(&doc()).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_push_with_stale_version_conflicts() {
        let store = MemoryStore::new();
        push_updates(&store, &doc(), 0, &entries("alice", 1)).await.unwrap();

        let outcome = push_updates(&store, &doc(), 0, &entries("bob", 1)).await.unwrap();
        assert_eq!(
            outcome,
            PushOutcome::Conflict { local_version: 0, store_version: 1 }
        );

        let log = store.read(&doc()).await.unwrap();
        assert_eq!(log, entries("alice", 1));
    }

    #[tokio::test]
    async fn test_push_nothing() {
        let store = MemoryStore::new();
        let outcome = push_updates(&store, &doc(), 0, &[]).await.unwrap();
        assert_eq!(outcome, PushOutcome::NothingToPush);
        assert!(!outcome.is_accepted());
        assert_eq!(store.stats().await.writes_accepted, 0);
    }
}
