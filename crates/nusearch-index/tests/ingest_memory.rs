//! Full ingestion runs into the in-memory store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use nusearch_core::{DocumentStore, Package};
use nusearch_index::{
    BootstrapAction, BootstrapMode, BulkIndexer, DumpReader, IndexBootstrap, IngestOptions,
    IngestOutcome,
};
use nusearch_store::MemoryStore;
use tempfile::TempDir;

const INDEX: &str = "packages";

fn options() -> IngestOptions {
    IngestOptions::default()
        .with_batch_size(2)
        .with_max_parallel_batches(2)
}

#[tokio::test]
async fn reindexing_overwrites_by_identifier() {
    let store = Arc::new(MemoryStore::new());
    IndexBootstrap::new(store.clone(), INDEX)
        .prepare(BootstrapMode::Recreate)
        .await
        .unwrap();
    let indexer = BulkIndexer::new(store.clone(), INDEX).with_options(options());

    let first = vec![
        Package::new("Serilog").with_summary("old"),
        Package::new("Dapper"),
    ];
    assert!(indexer.ingest_iter(first).await.is_success());

    let second = vec![Package::new("Serilog").with_summary("new").with_downloads(7)];
    assert!(indexer.ingest_iter(second).await.is_success());

    assert_eq!(store.count(INDEX).await.unwrap(), 2);
    let serilog = store.get(INDEX, "Serilog").await.unwrap().unwrap();
    assert_eq!(serilog.summary, "new");
    assert_eq!(serilog.download_count, 7);
}

#[tokio::test]
async fn dump_directory_to_searchable_index() {
    let temp = TempDir::new().unwrap();
    tokio::fs::write(
        temp.path().join("part-0.jsonl"),
        concat!(
            r#"{"id":"Newtonsoft.Json","downloadCount":500,"authors":[{"name":"James"}]}"#,
            "\n",
            r#"{"id":"Serilog","versions":[{"version":"3.0.0","lastUpdated":"2023-06-01T00:00:00Z"}]}"#,
            "\n",
            r#"{"id":"  "}"#,
            "\n",
        ),
    )
    .await
    .unwrap();

    let store = Arc::new(MemoryStore::new());
    let action = IndexBootstrap::new(store.clone(), INDEX)
        .prepare(BootstrapMode::KeepExisting)
        .await
        .unwrap();
    assert_eq!(action, BootstrapAction::Created);

    let packages = DumpReader::new(temp.path()).packages().await.unwrap();
    let outcome = BulkIndexer::new(store.clone(), INDEX)
        .with_options(options())
        .ingest(packages)
        .await;

    let IngestOutcome::PartialFailure(report) = outcome else {
        unreachable!("blank identifier should be rejected");
    };
    assert_eq!(report.indexed, 2);
    assert_eq!(report.failed_items.len(), 1);
    // The indexer refreshed, so counts see the documents.
    assert_eq!(store.count(INDEX).await.unwrap(), 2);
}
