//! Document store abstraction.
//!
//! [`DocumentStore`] is the only way the indexing pipeline and the search
//! service talk to a search engine. Implementations classify their failures:
//! a retryable problem must surface as [`Error::Transient`](crate::Error),
//! anything else as a fatal error. Per-document outcomes inside an accepted
//! bulk request are not errors; they are reported item by item in a
//! [`BulkResponse`]. That includes documents the store turned away for lack
//! of capacity ([`ItemStatus::Throttled`]), which the caller may resubmit
//! on their own.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::model::Package;
use crate::query::QueryDescriptor;
use crate::schema::IndexSchema;

/// Abstraction over document search engines.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Index (create or fully replace) every package of `batch`, keyed by
    /// identifier.
    async fn bulk_write(&self, index: &str, batch: &[Package]) -> Result<BulkResponse>;

    /// Make everything written so far visible to searches.
    async fn refresh(&self, index: &str) -> Result<()>;

    /// Whether the index exists.
    async fn exists(&self, index: &str) -> Result<bool>;

    /// Delete the index and all its documents.
    async fn delete_index(&self, index: &str) -> Result<()>;

    /// Create the index with the given schema.
    async fn create_index(&self, index: &str, schema: &IndexSchema) -> Result<()>;

    /// Number of root documents in the index.
    async fn count(&self, index: &str) -> Result<u64>;

    /// Fetch a single package by identifier.
    async fn get(&self, index: &str, id: &str) -> Result<Option<Package>>;

    /// Execute a search.
    async fn search(&self, index: &str, query: &QueryDescriptor) -> Result<SearchResponse>;
}

/// Outcome of one bulk request, one entry per submitted document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResponse {
    /// Item outcomes, in submission order.
    pub items: Vec<BulkItem>,
}

/// Outcome for one document of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItem {
    /// Document identifier.
    pub id: String,
    /// Whether it was indexed.
    pub status: ItemStatus,
}

/// Per-document bulk status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    /// Indexed or replaced.
    Indexed,
    /// Rejected by the store.
    Rejected {
        /// Store-provided reason.
        reason: String,
    },
    /// Not written because the store was out of capacity; safe to resend.
    Throttled,
}

impl BulkItem {
    /// An indexed item.
    pub fn indexed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ItemStatus::Indexed,
        }
    }

    /// An item to resend later.
    pub fn throttled(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ItemStatus::Throttled,
        }
    }

    /// A rejected item.
    pub fn rejected(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ItemStatus::Rejected {
                reason: reason.into(),
            },
        }
    }
}

impl BulkResponse {
    /// Number of documents indexed.
    pub fn indexed_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.status == ItemStatus::Indexed)
            .count()
    }

    /// Rejected documents as `(id, reason)` pairs.
    pub fn rejected(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().filter_map(|item| match &item.status {
            ItemStatus::Rejected { reason } => Some((item.id.as_str(), reason.as_str())),
            ItemStatus::Indexed | ItemStatus::Throttled => None,
        })
    }

    /// Number of documents the store asked to resend.
    pub fn throttled_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.status == ItemStatus::Throttled)
            .count()
    }
}

/// Raw result of a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Number of matching documents (before pagination).
    pub total: u64,
    /// The requested page of hits, in sort order.
    pub hits: Vec<SearchHit>,
    /// Terms buckets keyed by the outer aggregation name.
    #[serde(default)]
    pub aggregations: BTreeMap<String, Vec<TermsBucket>>,
}

/// One hit of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document identifier.
    pub id: String,
    /// Combined score, absent when sorting by a field.
    pub score: Option<f64>,
    /// The stored document.
    pub package: Package,
}

/// One bucket of a terms aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsBucket {
    /// Bucket key.
    pub key: String,
    /// Occurrences of the key.
    pub doc_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_response_counts() {
        let response = BulkResponse {
            items: vec![
                BulkItem::indexed("a"),
                BulkItem::rejected("b", "mapper_parsing_exception"),
                BulkItem::indexed("c"),
            ],
        };

        assert_eq!(response.indexed_count(), 2);
        let rejected: Vec<_> = response.rejected().collect();
        assert_eq!(rejected, vec![("b", "mapper_parsing_exception")]);
    }

    #[test]
    fn test_throttled_items_are_neither_indexed_nor_rejected() {
        let response = BulkResponse {
            items: vec![BulkItem::indexed("a"), BulkItem::throttled("b")],
        };

        assert_eq!(response.indexed_count(), 1);
        assert_eq!(response.throttled_count(), 1);
        assert_eq!(response.rejected().count(), 0);
    }

    #[test]
    fn test_empty_bulk_response() {
        let response = BulkResponse::default();
        assert_eq!(response.indexed_count(), 0);
        assert_eq!(response.rejected().count(), 0);
    }
}
