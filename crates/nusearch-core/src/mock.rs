//! Mock document store for testing.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::model::Package;
use crate::query::QueryDescriptor;
use crate::schema::IndexSchema;
use crate::store::{BulkItem, BulkResponse, DocumentStore, SearchResponse};
use crate::{Error, Result};

/// Scriptable in-process store.
///
/// Records every bulk attempt and the peak number of concurrent bulk calls.
/// Failures are scripted per document identifier: a batch containing a
/// scripted identifier fails as a whole. Throttling and rejection are scripted
/// per item and leave the rest of the batch indexed.
///
/// # Examples
///
/// ```
/// use nusearch_core::mock::MockStore;
///
/// let store = MockStore::new()
///     .fail_transiently("flaky", 2)
///     .throttle("busy", 1)
///     .reject("broken", "mapper_parsing_exception");
/// ```
#[derive(Clone, Default)]
pub struct MockStore {
    state: Arc<Mutex<MockState>>,
    latency: Duration,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

#[derive(Default)]
struct MockState {
    attempts: Vec<Vec<String>>,
    documents: BTreeMap<String, Package>,
    indices: BTreeSet<String>,
    transient: HashMap<String, u32>,
    throttled: HashMap<String, u32>,
    fatal: HashSet<String>,
    rejected: HashMap<String, String>,
    refreshes: Vec<String>,
    searches: Vec<QueryDescriptor>,
    search_response: SearchResponse,
}

impl MockStore {
    /// Creates an empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every bulk call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the batch containing `id` with a transient error `times` times.
    pub fn fail_transiently(self, id: impl Into<String>, times: u32) -> Self {
        self.script(|state| {
            state.transient.insert(id.into(), times);
        })
    }

    /// Answer `id` with a throttled item `times` times; the other documents
    /// of its batch are indexed.
    pub fn throttle(self, id: impl Into<String>, times: u32) -> Self {
        self.script(|state| {
            state.throttled.insert(id.into(), times);
        })
    }

    /// Fail the batch containing `id` with a fatal error, always.
    pub fn fail_fatally(self, id: impl Into<String>) -> Self {
        self.script(|state| {
            state.fatal.insert(id.into());
        })
    }

    /// Reject `id` individually inside an otherwise accepted batch.
    pub fn reject(self, id: impl Into<String>, reason: impl Into<String>) -> Self {
        self.script(|state| {
            state.rejected.insert(id.into(), reason.into());
        })
    }

    /// Canned answer for every search.
    pub fn with_search_response(self, response: SearchResponse) -> Self {
        self.script(|state| state.search_response = response)
    }

    /// Pretend the index already exists.
    pub fn with_index(self, index: impl Into<String>) -> Self {
        self.script(|state| {
            state.indices.insert(index.into());
        })
    }

    fn script(self, f: impl FnOnce(&mut MockState)) -> Self {
        // Scripting happens before the store is shared, so the lock is free.
        if let Ok(mut state) = self.state.try_lock() {
            f(&mut state);
        }
        self
    }

    /// Identifiers of every bulk attempt, including retries.
    pub async fn attempts(&self) -> Vec<Vec<String>> {
        self.state.lock().await.attempts.clone()
    }

    /// Snapshot of stored documents.
    pub async fn documents(&self) -> BTreeMap<String, Package> {
        self.state.lock().await.documents.clone()
    }

    /// Indices refreshed, in call order.
    pub async fn refreshes(&self) -> Vec<String> {
        self.state.lock().await.refreshes.clone()
    }

    /// Descriptors received by `search`.
    pub async fn searches(&self) -> Vec<QueryDescriptor> {
        self.state.lock().await.searches.clone()
    }

    /// Existing indices.
    pub async fn indices(&self) -> BTreeSet<String> {
        self.state.lock().await.indices.clone()
    }

    /// Highest number of bulk calls observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Bulk calls currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    async fn apply_bulk(&self, batch: &[Package]) -> Result<BulkResponse> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state
            .attempts
            .push(batch.iter().map(|p| p.id.clone()).collect());

        if let Some(p) = batch.iter().find(|p| state.fatal.contains(&p.id)) {
            debug!(id = %p.id, "mock store: scripted fatal failure");
            return Err(Error::store(format!("scripted fatal failure on '{}'", p.id)));
        }

        for package in batch {
            if let Some(remaining) = state.transient.get_mut(&package.id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    debug!(id = %package.id, remaining = *remaining, "mock store: scripted transient failure");
                    return Err(Error::transient(format!(
                        "scripted transient failure on '{}'",
                        package.id
                    )));
                }
            }
        }

        let mut items = Vec::with_capacity(batch.len());
        for package in batch {
            if let Some(remaining) = state.throttled.get_mut(&package.id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    debug!(id = %package.id, remaining = *remaining, "mock store: scripted throttle");
                    items.push(BulkItem::throttled(&package.id));
                    continue;
                }
            }
            match state.rejected.get(&package.id) {
                Some(reason) => items.push(BulkItem::rejected(&package.id, reason.clone())),
                None => {
                    state
                        .documents
                        .insert(package.id.clone(), package.clone());
                    items.push(BulkItem::indexed(&package.id));
                }
            }
        }
        Ok(BulkResponse { items })
    }
}

/// Counts one bulk call as in flight until dropped, including when the
/// calling future is cancelled.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MockStore {
    async fn bulk_write(&self, _index: &str, batch: &[Package]) -> Result<BulkResponse> {
        let _slot = InFlight::enter(&self.in_flight, &self.peak_in_flight);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.apply_bulk(batch).await
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        self.state.lock().await.refreshes.push(index.to_string());
        Ok(())
    }

    async fn exists(&self, index: &str) -> Result<bool> {
        Ok(self.state.lock().await.indices.contains(index))
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.indices.remove(index) {
            return Err(Error::not_found(format!("index '{index}'")));
        }
        state.documents.clear();
        Ok(())
    }

    async fn create_index(&self, index: &str, _schema: &IndexSchema) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.indices.insert(index.to_string()) {
            return Err(Error::store(format!("index '{index}' already exists")));
        }
        Ok(())
    }

    async fn count(&self, _index: &str) -> Result<u64> {
        Ok(self.state.lock().await.documents.len() as u64)
    }

    async fn get(&self, _index: &str, id: &str) -> Result<Option<Package>> {
        Ok(self.state.lock().await.documents.get(id).cloned())
    }

    async fn search(&self, _index: &str, query: &QueryDescriptor) -> Result<SearchResponse> {
        let mut state = self.state.lock().await;
        state.searches.push(query.clone());
        Ok(state.search_response.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn batch(ids: &[&str]) -> Vec<Package> {
        ids.iter().map(|id| Package::new(*id)).collect()
    }

    #[tokio::test]
    async fn test_mock_store_indexes_batch() {
        let store = MockStore::new();
        let response = store.bulk_write("idx", &batch(&["a", "b"])).await.unwrap();

        assert_eq!(response.indexed_count(), 2);
        assert_eq!(store.count("idx").await.unwrap(), 2);
        assert_eq!(store.attempts().await, vec![vec!["a", "b"]]);
    }

    #[tokio::test]
    async fn test_mock_store_transient_then_success() {
        let store = MockStore::new().fail_transiently("a", 1);

        let err = store.bulk_write("idx", &batch(&["a"])).await.unwrap_err();
        assert!(err.is_retryable());

        let response = store.bulk_write("idx", &batch(&["a"])).await.unwrap();
        assert_eq!(response.indexed_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_store_fatal() {
        let store = MockStore::new().fail_fatally("b");
        let err = store.bulk_write("idx", &batch(&["a", "b"])).await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(store.count("idx").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mock_store_rejects_item() {
        let store = MockStore::new().reject("b", "bad");
        let response = store.bulk_write("idx", &batch(&["a", "b"])).await.unwrap();
        assert_eq!(response.indexed_count(), 1);
        assert_eq!(response.rejected().collect::<Vec<_>>(), vec![("b", "bad")]);
    }

    #[tokio::test]
    async fn test_mock_store_throttles_single_item() {
        let store = MockStore::new().throttle("b", 1);

        let first = store.bulk_write("idx", &batch(&["a", "b"])).await.unwrap();
        assert_eq!(first.indexed_count(), 1);
        assert_eq!(first.throttled_count(), 1);
        assert!(store.get("idx", "b").await.unwrap().is_none());

        let second = store.bulk_write("idx", &batch(&["b"])).await.unwrap();
        assert_eq!(second.indexed_count(), 1);
        assert_eq!(store.count("idx").await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_store_dropped_call_leaves_nothing_in_flight() {
        let store = MockStore::new().with_latency(Duration::from_secs(10));
        let docs = batch(&["a"]);

        let call = store.bulk_write("idx", &docs);
        let timed_out = tokio::time::timeout(Duration::from_secs(1), call).await;
        assert!(timed_out.is_err());

        assert_eq!(store.in_flight(), 0);
        assert_eq!(store.peak_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_mock_store_index_lifecycle() {
        let store = MockStore::new();
        let schema = IndexSchema::packages();

        assert!(!store.exists("idx").await.unwrap());
        store.create_index("idx", &schema).await.unwrap();
        assert!(store.exists("idx").await.unwrap());
        assert!(store.create_index("idx", &schema).await.is_err());
        store.delete_index("idx").await.unwrap();
        assert!(!store.exists("idx").await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_store_clone_shares_state() {
        let store = MockStore::new();
        let other = store.clone();
        store.bulk_write("idx", &batch(&["a"])).await.unwrap();
        assert_eq!(other.count("idx").await.unwrap(), 1);
    }
}
