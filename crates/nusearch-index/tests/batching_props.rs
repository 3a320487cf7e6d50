//! Batching properties of the bulk indexer.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use nusearch_core::Package;
use nusearch_core::mock::MockStore;
use nusearch_index::{BulkIndexer, IngestOptions, IngestReport};
use proptest::prelude::*;

struct Run {
    report: IngestReport,
    attempts: Vec<Vec<String>>,
    peak_in_flight: usize,
}

fn run(n: usize, batch_size: usize, parallel: usize) -> Run {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();

    let store = MockStore::new().with_latency(Duration::from_millis(10));
    let indexer = BulkIndexer::new(Arc::new(store.clone()), "props").with_options(
        IngestOptions::default()
            .with_batch_size(batch_size)
            .with_max_parallel_batches(parallel),
    );
    let packages: Vec<Package> = (0..n).map(|i| Package::new(format!("p{i:04}"))).collect();

    let report = runtime
        .block_on(indexer.ingest_iter(packages))
        .into_result()
        .unwrap();
    Run {
        report,
        attempts: runtime.block_on(store.attempts()),
        peak_in_flight: store.peak_in_flight(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn batches_partition_the_input(n in 0usize..200, batch_size in 1usize..40, parallel in 1usize..6) {
        let Run { report, attempts, .. } = run(n, batch_size, parallel);

        prop_assert_eq!(report.batches, n.div_ceil(batch_size));
        prop_assert_eq!(report.indexed, n);
        prop_assert_eq!(attempts.len(), n.div_ceil(batch_size));

        // Every batch is full except possibly the last one drawn.
        let short = attempts.iter().filter(|b| b.len() < batch_size).count();
        prop_assert!(short <= 1);
        prop_assert!(attempts.iter().all(|b| !b.is_empty() && b.len() <= batch_size));

        // Batches are contiguous runs of the input.
        for batch in &attempts {
            let first: usize = batch[0][1..].parse().unwrap();
            for (offset, id) in batch.iter().enumerate() {
                prop_assert_eq!(id, &format!("p{:04}", first + offset));
            }
        }
    }

    #[test]
    fn parallelism_never_exceeds_the_limit(n in 1usize..120, batch_size in 1usize..10, parallel in 1usize..6) {
        let peak = run(n, batch_size, parallel).peak_in_flight;
        prop_assert!(peak <= parallel);
        prop_assert!(peak >= 1);
    }
}
