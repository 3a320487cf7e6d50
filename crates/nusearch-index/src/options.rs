//! Bulk ingestion options.

use std::time::Duration;

use nusearch_core::{Error, Result};

/// Tuning knobs for a [`BulkIndexer`](crate::BulkIndexer) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Documents per bulk request.
    pub batch_size: usize,
    /// Bulk requests allowed in flight at once.
    pub max_parallel_batches: usize,
    /// Resubmissions of a batch after a transient failure.
    pub max_retries_per_batch: usize,
    /// Fixed wait before each resubmission.
    pub retry_backoff: Duration,
    /// Refresh the index once ingestion finishes.
    pub refresh_on_completion: bool,
}

impl Default for IngestOptions {
    /// Defaults:
    /// - Batch size: 1000
    /// - Parallel batches: 4
    /// - Retries per batch: 2
    /// - Backoff: 30 seconds (constant)
    /// - Refresh on completion: yes
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_parallel_batches: 4,
            max_retries_per_batch: 2,
            retry_backoff: Duration::from_secs(30),
            refresh_on_completion: true,
        }
    }
}

impl IngestOptions {
    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the number of concurrent bulk requests.
    pub fn with_max_parallel_batches(mut self, max_parallel_batches: usize) -> Self {
        self.max_parallel_batches = max_parallel_batches;
        self
    }

    /// Sets the retry budget per batch.
    pub fn with_max_retries_per_batch(mut self, max_retries: usize) -> Self {
        self.max_retries_per_batch = max_retries;
        self
    }

    /// Sets the backoff between retries.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Sets whether to refresh the index at the end of the run.
    pub fn with_refresh_on_completion(mut self, refresh: bool) -> Self {
        self.refresh_on_completion = refresh;
        self
    }

    /// Reject settings that would stall or never batch.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        if self.max_parallel_batches == 0 {
            return Err(Error::config("max_parallel_batches must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = IngestOptions::default();
        assert_eq!(options.batch_size, 1000);
        assert_eq!(options.max_parallel_batches, 4);
        assert_eq!(options.max_retries_per_batch, 2);
        assert_eq!(options.retry_backoff, Duration::from_secs(30));
        assert!(options.refresh_on_completion);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let options = IngestOptions::default()
            .with_batch_size(10)
            .with_max_parallel_batches(2)
            .with_max_retries_per_batch(5)
            .with_retry_backoff(Duration::from_millis(500))
            .with_refresh_on_completion(false);

        assert_eq!(options.batch_size, 10);
        assert_eq!(options.max_parallel_batches, 2);
        assert_eq!(options.max_retries_per_batch, 5);
        assert_eq!(options.retry_backoff, Duration::from_millis(500));
        assert!(!options.refresh_on_completion);
    }

    #[test]
    fn test_zero_settings_rejected() {
        assert!(IngestOptions::default().with_batch_size(0).validate().is_err());
        assert!(
            IngestOptions::default()
                .with_max_parallel_batches(0)
                .validate()
                .is_err()
        );
        // No retries is a valid policy.
        assert!(
            IngestOptions::default()
                .with_max_retries_per_batch(0)
                .validate()
                .is_ok()
        );
    }
}
