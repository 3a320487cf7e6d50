//! Bulk indexing pipeline.
//!
//! [`BulkIndexer`] drains a lazy stream of packages into a
//! [`DocumentStore`] in fixed-size batches:
//!
//! - at most `max_parallel_batches` bulk requests are in flight
//! - each batch retries transient failures on a constant backoff, holding
//!   only its own slot while it waits; documents the store throttled are
//!   resent on their own, the rest of the batch is not
//! - per-document rejections are collected, never fatal
//! - any other store error, or a broken source record, aborts the run and
//!   drops the in-flight requests
//!
//! # Example
//!
//! ```rust,ignore
//! use nusearch_index::{BulkIndexer, IngestOptions};
//!
//! let indexer = BulkIndexer::new(store, "nusearch")
//!     .with_options(IngestOptions::default().with_batch_size(500));
//! let report = indexer.ingest(reader.packages().await?).await.into_result()?;
//! ```

use std::future::{self, Future};
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use futures::{FutureExt, Stream, StreamExt, stream};
use nusearch_core::{BulkResponse, DocumentStore, Error, ItemStatus, Package, Result};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::options::IngestOptions;
use crate::outcome::{FailedBatch, FailedItem, IngestOutcome, IngestReport};

/// Pushes package streams into one index.
pub struct BulkIndexer {
    store: Arc<dyn DocumentStore>,
    index: String,
    options: IngestOptions,
}

/// Terminal state of a single batch.
struct BatchReport {
    number: usize,
    indexed: usize,
    attempts: usize,
    rejected: Vec<FailedItem>,
    exhausted: Option<FailedBatch>,
}

impl BulkIndexer {
    /// Creates an indexer with default options.
    pub fn new(store: Arc<dyn DocumentStore>, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
            options: IngestOptions::default(),
        }
    }

    /// Replaces the options.
    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    /// Target index.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Current options.
    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Index every package of `documents` and wait for the terminal outcome.
    pub async fn ingest<S>(&self, documents: S) -> IngestOutcome
    where
        S: Stream<Item = Result<Package>>,
    {
        self.ingest_until(documents, future::pending()).await
    }

    /// Index an in-memory sequence.
    pub async fn ingest_iter<I>(&self, documents: I) -> IngestOutcome
    where
        I: IntoIterator<Item = Package>,
    {
        self.ingest(stream::iter(documents.into_iter().map(Ok)))
            .await
    }

    /// Like [`ingest`](Self::ingest), but stops drawing new batches once
    /// `cancel` completes. Batches already submitted run to completion,
    /// retries included.
    pub async fn ingest_until<S, C>(&self, documents: S, cancel: C) -> IngestOutcome
    where
        S: Stream<Item = Result<Package>>,
        C: Future<Output = ()>,
    {
        let mut report = IngestReport::default();
        if let Err(error) = self.options.validate() {
            return IngestOutcome::Fatal { error, report };
        }

        info!(
            index = %self.index,
            batch_size = self.options.batch_size,
            parallelism = self.options.max_parallel_batches,
            "starting bulk ingestion"
        );

        let cancelled = AtomicBool::new(false);
        let cancel = cancel.inspect(|_| cancelled.store(true, Ordering::SeqCst));

        let batches = documents
            .chunks(self.options.batch_size)
            .take_until(cancel)
            .enumerate()
            .map(|(number, chunk)| self.submit(number, chunk))
            .buffer_unordered(self.options.max_parallel_batches);
        let mut batches = pin!(batches);

        while let Some(result) = batches.next().await {
            match result {
                Ok(batch) => record(&mut report, batch),
                Err(error) => {
                    error!(index = %self.index, error = %error, "aborting bulk ingestion");
                    return IngestOutcome::Fatal { error, report };
                }
            }
        }

        if self.options.refresh_on_completion && report.indexed > 0 {
            if let Err(error) = self.store.refresh(&self.index).await {
                error!(index = %self.index, error = %error, "refresh after ingestion failed");
                return IngestOutcome::Fatal { error, report };
            }
        }

        info!(
            index = %self.index,
            batches = report.batches,
            indexed = report.indexed,
            failed = report.failed_documents(),
            "bulk ingestion finished"
        );

        if cancelled.load(Ordering::SeqCst) {
            warn!(index = %self.index, "bulk ingestion cancelled");
            return IngestOutcome::Cancelled(report);
        }
        IngestOutcome::completed(report)
    }

    /// Submit one batch, retrying transient failures.
    ///
    /// A retry resends the whole batch after a request-level failure, but
    /// only the throttled documents after a partially accepted request.
    /// Returns `Err` only for errors that must abort the whole run.
    async fn submit(&self, number: usize, chunk: Vec<Result<Package>>) -> Result<BatchReport> {
        let batch = chunk.into_iter().collect::<Result<Vec<_>>>()?;
        debug!(batch = number, size = batch.len(), "submitting batch");

        let backoff = ConstantBuilder::default()
            .with_delay(self.options.retry_backoff)
            .with_max_times(self.options.max_retries_per_batch);

        let attempts = AtomicUsize::new(0);
        let progress = Mutex::new(BatchProgress::new(batch));
        let (store, index, state, counter) =
            (&self.store, self.index.as_str(), &progress, &attempts);

        let result = (|| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let sent = std::mem::take(&mut state.lock().await.pending);
            match store.bulk_write(index, &sent).await {
                Ok(response) => {
                    let mut state = state.lock().await;
                    state.absorb(number, sent, response);
                    match state.pending.len() {
                        0 => Ok(()),
                        throttled => Err(Error::transient(format!(
                            "{throttled} documents throttled by the store"
                        ))),
                    }
                }
                Err(err) => {
                    state.lock().await.pending = sent;
                    Err(err)
                }
            }
        })
        .retry(backoff)
        .when(Error::is_retryable)
        .notify(|err: &Error, delay: Duration| {
            warn!(batch = number, delay = ?delay, error = %err, "bulk request failed, retrying");
        })
        .await;

        let attempts = attempts.into_inner();
        let BatchProgress {
            pending,
            indexed,
            rejected,
        } = progress.into_inner();
        for item in &rejected {
            warn!(batch = number, id = %item.id, reason = %item.reason, "document rejected");
        }

        match result {
            Ok(()) => Ok(BatchReport {
                number,
                indexed,
                attempts,
                rejected,
                exhausted: None,
            }),
            Err(err) if err.is_retryable() => {
                error!(
                    batch = number,
                    attempts,
                    indexed,
                    remaining = pending.len(),
                    error = %err,
                    "batch failed after exhausting retries"
                );
                Ok(BatchReport {
                    number,
                    indexed,
                    attempts,
                    rejected,
                    exhausted: Some(FailedBatch {
                        batch: number,
                        ids: pending.into_iter().map(|p| p.id).collect(),
                        attempts,
                        error: err.to_string(),
                    }),
                })
            }
            Err(err) => Err(err),
        }
    }
}

/// What the attempts on one batch have achieved so far.
struct BatchProgress {
    /// Documents still to be written.
    pending: Vec<Package>,
    indexed: usize,
    rejected: Vec<FailedItem>,
}

impl BatchProgress {
    fn new(batch: Vec<Package>) -> Self {
        Self {
            pending: batch,
            indexed: 0,
            rejected: Vec::new(),
        }
    }

    /// Credit one bulk response; throttled documents stay pending.
    fn absorb(&mut self, number: usize, sent: Vec<Package>, response: BulkResponse) {
        self.indexed += response.indexed_count();
        self.rejected
            .extend(response.rejected().map(|(id, reason)| FailedItem {
                id: id.to_string(),
                batch: number,
                reason: reason.to_string(),
            }));
        self.pending = sent
            .into_iter()
            .zip(response.items)
            .filter(|(_, item)| item.status == ItemStatus::Throttled)
            .map(|(package, _)| package)
            .collect();
    }
}

fn record(report: &mut IngestReport, batch: BatchReport) {
    debug!(
        batch = batch.number,
        indexed = batch.indexed,
        rejected = batch.rejected.len(),
        "batch finished"
    );
    report.batches += 1;
    report.indexed += batch.indexed;
    report.retries += batch.attempts.saturating_sub(1);
    report.failed_items.extend(batch.rejected);
    report.failed_batches.extend(batch.exhausted);
}
