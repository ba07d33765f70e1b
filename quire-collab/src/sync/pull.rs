//! Pull: fetch the gap `[V, L)` or park until the log grows past `V`.

use quire_core::{ChangeEntry, DocumentName};
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;
use crate::store::{ChangeLogStore, StoreError};

/// A pull parked until its document's version advances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPull {
    pub document: DocumentName,
    pub version: u64,
}

/// Result of a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// Entries `[V, L)` in log order.
    Delivered(Vec<ChangeEntry>),
    /// Teardown fired before the log grew.
    Cancelled,
}

/// Non-blocking gap fetch.
///
/// `Ok(None)` when the log has exactly `version` entries.
pub async fn pull_once<S>(
    store: &S,
    document: &DocumentName,
    version: u64,
) -> Result<Option<Vec<ChangeEntry>>, SyncError>
where
    S: ChangeLogStore + ?Sized,
{
    let log = store.read(document).await?;
    let len = log.len() as u64;

    if version > len {
        log::warn!("Local version {version} of {document} is ahead of the log ({len})");
        return Err(SyncError::VersionAhead {
            document: document.clone(),
            local: version,
            store: len,
        });
    }
    if version == len {
        return Ok(None);
    }

    // version < len, so the cast is within the vector's bounds
    let gap = log.into_iter().skip(version as usize).collect::<Vec<_>>();
    log::debug!("Pulled {} entries of {document} from version {version}", gap.len());
    Ok(Some(gap))
}

/// Pull entries past `version`, waiting for the log to grow if needed.
///
/// The version channel is subscribed before the first read, so a write that
/// lands between the read and the wait still wakes this pull.
pub async fn pull_updates<S>(
    store: &S,
    document: &DocumentName,
    version: u64,
    cancel: &CancellationToken,
) -> Result<PullOutcome, SyncError>
where
    S: ChangeLogStore + ?Sized,
{
    let mut versions = store.subscribe(document).await?;

    loop {
        if cancel.is_cancelled() {
            return Ok(PullOutcome::Cancelled);
        }
        if let Some(entries) = pull_once(store, document, version).await? {
            return Ok(PullOutcome::Delivered(entries));
        }

        let pending = PendingPull {
            document: document.clone(),
            version,
        };
        log::trace!("Parked pull {pending:?}");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(PullOutcome::Cancelled),
            advanced = async { versions.wait_for(|v| *v > version).await.map(|_| ()) } => {
                if advanced.is_err() {
                    return Err(StoreError::Unavailable(format!(
                        "version channel for {document} closed"
                    ))
                    .into());
                }
            }
        }
    }
}
