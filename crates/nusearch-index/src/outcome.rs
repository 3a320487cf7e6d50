//! Terminal results of an ingestion run.

use nusearch_core::{Error, Result};
use serde::Serialize;

/// A document the store refused to index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    /// Document identifier.
    pub id: String,
    /// Zero-based number of the batch it travelled in.
    pub batch: usize,
    /// Store-provided reason.
    pub reason: String,
}

/// A batch that kept failing transiently until its retry budget ran out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedBatch {
    /// Zero-based batch number.
    pub batch: usize,
    /// Identifiers of the documents of the batch that were never written.
    pub ids: Vec<String>,
    /// Submissions made, including the first.
    pub attempts: usize,
    /// Last error seen.
    pub error: String,
}

/// Counters and failures accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Batches that reached a terminal state.
    pub batches: usize,
    /// Documents indexed.
    pub indexed: usize,
    /// Resubmissions across all batches.
    pub retries: usize,
    /// Per-document rejections.
    pub failed_items: Vec<FailedItem>,
    /// Batches that exhausted their retries.
    pub failed_batches: Vec<FailedBatch>,
}

impl IngestReport {
    /// Whether anything failed.
    pub fn has_failures(&self) -> bool {
        !self.failed_items.is_empty() || !self.failed_batches.is_empty()
    }

    /// Number of documents that did not make it into the index.
    pub fn failed_documents(&self) -> usize {
        self.failed_items.len()
            + self
                .failed_batches
                .iter()
                .map(|b| b.ids.len())
                .sum::<usize>()
    }
}

/// How an ingestion run ended.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Every document was indexed.
    Success(IngestReport),
    /// The run completed, but some documents or batches failed.
    PartialFailure(IngestReport),
    /// Cancelled; in-flight batches were allowed to finish.
    Cancelled(IngestReport),
    /// A non-retryable error stopped the run.
    Fatal {
        /// The error that aborted the run.
        error: Error,
        /// Progress made before the abort.
        report: IngestReport,
    },
}

impl IngestOutcome {
    /// Classify a completed run.
    pub fn completed(report: IngestReport) -> Self {
        if report.has_failures() {
            Self::PartialFailure(report)
        } else {
            Self::Success(report)
        }
    }

    /// The run's report, whatever the outcome.
    pub fn report(&self) -> &IngestReport {
        match self {
            Self::Success(report) | Self::PartialFailure(report) | Self::Cancelled(report) => {
                report
            }
            Self::Fatal { report, .. } => report,
        }
    }

    /// Whether every document was indexed.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Turn a fatal outcome into an error, keeping the report otherwise.
    pub fn into_result(self) -> Result<IngestReport> {
        match self {
            Self::Success(report) | Self::PartialFailure(report) | Self::Cancelled(report) => {
                Ok(report)
            }
            Self::Fatal { error, .. } => Err(error),
        }
    }
}
