//! Search service: build, execute, project.

use std::sync::Arc;

use nusearch_core::{DocumentStore, Result};
use tracing::{debug, instrument};

use crate::builder::RankedQueryBuilder;
use crate::request::SearchRequest;
use crate::results::SearchResults;

/// Answers search requests against one index.
///
/// Cheap to clone and safe to share between concurrent requests. Failures
/// are returned as-is; nothing is retried at this layer.
#[derive(Clone)]
pub struct SearchService {
    store: Arc<dyn DocumentStore>,
    index: String,
    builder: RankedQueryBuilder,
}

impl SearchService {
    /// Search `index` with the standard ranking.
    pub fn new(store: Arc<dyn DocumentStore>, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
            builder: RankedQueryBuilder::default(),
        }
    }

    /// Use a different query builder.
    pub fn with_builder(mut self, builder: RankedQueryBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Target index.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Run one search.
    #[instrument(skip(self), fields(index = %self.index))]
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResults> {
        let query = self.builder.build(&request)?;
        let response = self.store.search(&self.index, &query).await?;
        debug!(
            total = response.total,
            hits = response.hits.len(),
            "search returned"
        );
        SearchResults::project(request, response)
    }
}
