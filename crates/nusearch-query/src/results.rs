//! Projection of raw store responses into search results.

use nusearch_core::{Error, Package, Result, SearchResponse};
use serde::Serialize;

use crate::builder::AUTHORS_AGGREGATION;
use crate::request::SearchRequest;

/// Number of an author's entries among all matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorFacet {
    /// Author display name.
    pub name: String,
    /// Occurrences across every matching package.
    pub count: u64,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    /// Packages on this page, in sort order.
    pub hits: Vec<Package>,
    /// Matches across all pages.
    pub total_matches: u64,
    /// `ceil(total_matches / page_size)`.
    pub total_pages: u64,
    /// The request this page answers.
    pub request: SearchRequest,
    /// Author name to match count, one entry per distinct author.
    ///
    /// Kept as a list ordered by count descending, ties by name, so it
    /// renders stably; use [`SearchResults::author_count`] for lookups.
    pub author_facets: Vec<AuthorFacet>,
}

impl SearchResults {
    /// Project a store response for `request`.
    ///
    /// Fails only when the response lacks the author aggregation.
    pub fn project(request: SearchRequest, response: SearchResponse) -> Result<Self> {
        let SearchResponse {
            total,
            hits,
            mut aggregations,
        } = response;

        let buckets = aggregations.remove(AUTHORS_AGGREGATION).ok_or_else(|| {
            Error::malformed(format!(
                "search response lacks the '{AUTHORS_AGGREGATION}' aggregation"
            ))
        })?;

        let mut author_facets: Vec<AuthorFacet> = buckets
            .into_iter()
            .map(|b| AuthorFacet {
                name: b.key,
                count: b.doc_count,
            })
            .collect();
        author_facets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

        Ok(Self {
            hits: hits.into_iter().map(|hit| hit.package).collect(),
            total_matches: total,
            total_pages: total_pages(total, request.page_size),
            author_facets,
            request,
        })
    }

    /// Facet count for one author, if it made the top buckets.
    pub fn author_count(&self, name: &str) -> Option<u64> {
        self.author_facets
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.count)
    }

    /// Whether a later page exists.
    pub fn has_next_page(&self) -> bool {
        u64::from(self.request.page) < self.total_pages
    }
}

/// Pages needed for `total` hits; zero hits means zero pages.
pub fn total_pages(total: u64, page_size: u32) -> u64 {
    match page_size {
        0 => 0,
        size => total.div_ceil(u64::from(size)),
    }
}
