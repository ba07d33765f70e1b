//! Quire demo: two hosts editing one document through a shared in-memory
//! change log and presence hub.
//!
//! `QUIRE_CONFIG` names an optional JSON config file; `QUIRE_SNAPSHOT` names
//! an optional file the change log is saved to on exit. Logging follows
//! `RUST_LOG`.

use log::info;
use quire_collab::{ChangeLogStore, MemoryStore, PresenceHub, SyncConfig};
use quire_core::{ClientId, CollabEditor, DocumentName, EditorState};
use quire_host::{Edit, HostEditor, HostError, HostEvent, PRESENCE_ROOM};
use std::sync::Arc;
use std::time::Duration;

fn load_config() -> Result<SyncConfig, HostError> {
    match std::env::var_os("QUIRE_CONFIG") {
        Some(path) => {
            info!("Loading config from {}", path.to_string_lossy());
            Ok(SyncConfig::load(path)?)
        }
        None => Ok(SyncConfig::default()),
    }
}

async fn host(
    store: &Arc<MemoryStore>,
    hub: &PresenceHub,
    name: &str,
    config: &SyncConfig,
) -> HostEditor<MemoryStore> {
    let subscription = hub.join(PRESENCE_ROOM, ClientId::new(name)).await;
    HostEditor::new(Arc::clone(store), subscription, config.clone())
}

fn insert(document: &DocumentName, offset: usize, text: &str) -> HostEvent {
    HostEvent::DocumentChanged {
        document: document.clone(),
        cursor_offset: offset + text.len(),
        edit: Edit::Insert {
            offset,
            text: text.to_string(),
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), HostError> {
    env_logger::init();
    info!("Starting Quire demo (quire-core {})...", quire_core::version());

    let config = load_config()?;
    let store = Arc::new(MemoryStore::new());
    let hub = PresenceHub::from_config(&config);
    let document = DocumentName::new("welcome.md")?;

    let mut alice = host(&store, &hub, "alice", &config).await;
    let mut bob = host(&store, &hub, "bob", &config).await;
    alice.open_document(&document).await?;
    bob.open_document(&document).await?;

    alice.dispatch(insert(&document, 0, "Hello from alice.")).await;
    bob.wait_for_version(&document, 1).await?;

    let end = bob.content(&document).await?.len();
    bob.dispatch(insert(&document, end, " And bob.")).await;
    alice.wait_for_version(&document, 2).await?;

    // Give presence a moment to fan out, then draw both views.
    tokio::time::sleep(Duration::from_millis(10)).await;
    for host in [&mut alice, &mut bob] {
        host.poll_presence()?;
        let frame = host.render().await?;
        info!(
            "{} sees {:?} ({})",
            host.client_id(),
            frame.annotated(),
            frame.participants
        );
        for notice in host.take_notices() {
            log::warn!("{notice}");
        }
    }

    let stats = store.stats().await;
    info!(
        "Change log: {} documents, {} entries, {} writes accepted, {} rejected",
        stats.documents, stats.entries, stats.writes_accepted, stats.writes_rejected
    );

    if let Some(path) = std::env::var_os("QUIRE_SNAPSHOT") {
        let bytes = store.save_to(&path).await?;
        info!("Snapshot written ({bytes} bytes)");

        // Reload and replay to show the snapshot is complete.
        let restored = MemoryStore::load_from(&path).await?;
        let mut replay = EditorState::new(ClientId::generate());
        let entries = restored.read(&document).await?;
        replay.receive(&entries)?;
        info!("Replayed snapshot: {:?}", replay.content());
    }

    alice.shutdown().await?;
    bob.shutdown().await?;
    Ok(())
}
