use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::hint::black_box;
use quire_collab::presence::{OthersSnapshot, Presence, PresenceMessage, PresenceRecord};
use quire_collab::store::{encode_snapshot, ChangeLogStore, DocumentLogSnapshot, MemoryStore};
use quire_collab::sync::{pull_once, push_updates};
use quire_collab::{build_decorations, DecorationStyle};
use quire_core::{ChangeEntry, ClientId, CollabEditor, DocumentName, EditorState};

fn doc() -> DocumentName {
    DocumentName::new("bench.md").unwrap()
}

/// `n` real single-character edits from one client.
fn edits(n: usize) -> Vec<ChangeEntry> {
    let mut editor = EditorState::new(ClientId::new("bench"));
    for i in 0..n {
        editor.insert(i, "x").unwrap();
    }
    editor.pending()
}

fn bench_push(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let entries = edits(1);

    c.bench_function("push_one_entry_onto_1k_log", |b| {
        b.iter_batched(
            || {
                let store = MemoryStore::new();
                rt.block_on(push_updates(&store, &doc(), 0, &edits(1_000))).unwrap();
                store
            },
            |store| {
                rt.block_on(push_updates(&store, &doc(), 1_000, black_box(&entries)))
                    .unwrap()
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_pull_gap(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = MemoryStore::new();
    rt.block_on(push_updates(&store, &doc(), 0, &edits(1_000))).unwrap();

    c.bench_function("pull_gap_100_of_1k", |b| {
        b.iter(|| rt.block_on(pull_once(&store, &doc(), black_box(900))).unwrap())
    });
}

fn bench_editor_receive(c: &mut Criterion) {
    let remote = edits(200);

    c.bench_function("editor_receive_200_remote", |b| {
        b.iter_batched(
            || EditorState::new(ClientId::new("reader")),
            |mut editor| editor.receive(black_box(&remote)).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

fn bench_decorations(c: &mut Criterion) {
    let active = doc();
    let snapshot = OthersSnapshot::new(
        (0..100)
            .map(|i| PresenceRecord {
                client_id: ClientId::new(format!("peer-{i}")),
                presence: Presence::at(active.clone(), (i * 37) % 500 + 1),
            })
            .collect(),
    );

    c.bench_function("build_decorations_100_peers", |b| {
        b.iter(|| {
            build_decorations(
                black_box(&snapshot),
                Some(&active),
                1_000,
                DecorationStyle::Widget,
            )
        })
    });
}

fn bench_presence_encode(c: &mut Criterion) {
    let msg = PresenceMessage::Update {
        client_id: ClientId::new("bench"),
        presence: Presence::at(doc(), 42),
        timestamp: 7,
    };

    c.bench_function("presence_encode", |b| b.iter(|| black_box(&msg).encode().unwrap()));
}

fn bench_snapshot(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = MemoryStore::new();
    rt.block_on(push_updates(&store, &doc(), 0, &edits(1_000))).unwrap();
    let logs = vec![DocumentLogSnapshot {
        document: doc(),
        entries: rt.block_on(store.read(&doc())).unwrap(),
    }];

    c.bench_function("snapshot_encode_1k_entries", |b| {
        b.iter(|| encode_snapshot(black_box(&logs)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_push,
    bench_pull_gap,
    bench_editor_receive,
    bench_decorations,
    bench_presence_encode,
    bench_snapshot,
);
criterion_main!(benches);
