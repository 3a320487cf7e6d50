//! Indexing through the application layer against the in-memory store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use nusearch_cli::{NusearchApp, NusearchConfig};
use nusearch_core::DocumentStore;
use nusearch_index::BootstrapMode;
use nusearch_store::MemoryStore;
use tempfile::TempDir;

async fn dump_with(dir: &TempDir, count: usize) {
    let lines: String = (0..count)
        .map(|i| format!("{{\"id\":\"Pkg.N{i}\",\"downloadCount\":{i}}}\n"))
        .collect();
    tokio::fs::write(dir.path().join("dump.jsonl"), lines)
        .await
        .unwrap();
}

fn small_batches() -> NusearchConfig {
    let mut config = NusearchConfig::default();
    config.indexing.batch_size = 3;
    config.indexing.max_parallel_batches = 2;
    config
}

#[tokio::test]
async fn cancelled_before_start_indexes_nothing() {
    let dir = TempDir::new().unwrap();
    dump_with(&dir, 10).await;
    let store = MemoryStore::new();
    let app = NusearchApp::with_store(small_batches(), Arc::new(store.clone()));

    let report = app
        .index(
            Some(dir.path().to_path_buf()),
            BootstrapMode::Recreate,
            std::future::ready(()),
        )
        .await
        .unwrap();

    assert_eq!(report.indexed, 0);
    assert_eq!(report.batches, 0);
    assert_eq!(store.count("nusearch").await.unwrap(), 0);
}

#[tokio::test]
async fn full_run_splits_into_configured_batches() {
    let dir = TempDir::new().unwrap();
    dump_with(&dir, 10).await;
    let store = MemoryStore::new();
    let app = NusearchApp::with_store(small_batches(), Arc::new(store.clone()));

    let report = app
        .index(
            Some(dir.path().to_path_buf()),
            BootstrapMode::Recreate,
            std::future::pending(),
        )
        .await
        .unwrap();

    assert_eq!(report.batches, 4);
    assert_eq!(report.indexed, 10);
    assert!(report.failed_items.is_empty());
    assert_eq!(store.count("nusearch").await.unwrap(), 10);
}

#[tokio::test]
async fn malformed_dump_line_is_fatal() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(dir.path().join("bad.jsonl"), "{\"id\":\"Ok\"}\nnot json\n")
        .await
        .unwrap();
    let store = MemoryStore::new();
    let app = NusearchApp::with_store(small_batches(), Arc::new(store));

    let err = app
        .index(
            Some(dir.path().to_path_buf()),
            BootstrapMode::Recreate,
            std::future::pending(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("bad.jsonl:2"));
}
