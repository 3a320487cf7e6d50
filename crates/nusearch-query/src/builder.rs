//! Ranked query construction.
//!
//! [`RankedQueryBuilder`] turns a [`SearchRequest`] into a
//! [`QueryDescriptor`]:
//!
//! - AND best-fields match over `id.keyword^1.5`, `id^1.5`, `summary^0.8`
//! - score multiplied by `min(1 + downloadCount * 0.0001, 50)`
//! - `from = (page - 1) * page_size`, `size = page_size`
//! - sort by score, downloads, or the first version's last update
//! - author facets via a nested terms aggregation
//!
//! # Example
//!
//! ```rust
//! use nusearch_query::{RankedQueryBuilder, SearchRequest, SortMode};
//!
//! let request = SearchRequest::new("json").with_sort(SortMode::Downloads);
//! let query = RankedQueryBuilder::new().build(&request).unwrap();
//! assert_eq!(query.size, 25);
//! ```

use nusearch_core::query::{
    FieldValueFactor, FieldWeight, FunctionScoreQuery, MultiMatchQuery, NestedTermsAggregation,
    Operator, SortClause, SortOrder,
};
use nusearch_core::{QueryDescriptor, Result, fields};

use crate::request::{SearchRequest, SortMode};

/// Weight of the whole-identifier field.
pub const ID_KEYWORD_WEIGHT: f64 = 1.5;
/// Weight of the tokenized identifier field.
pub const ID_WEIGHT: f64 = 1.5;
/// Weight of the summary field.
pub const SUMMARY_WEIGHT: f64 = 0.8;
/// Popularity multiplier per download.
pub const POPULARITY_FACTOR: f64 = 0.0001;
/// Ceiling of the popularity multiplier.
pub const MAX_BOOST: f64 = 50.0;

/// Name of the author facet aggregation.
pub const AUTHORS_AGGREGATION: &str = "authors";
/// Name of its inner terms aggregation.
pub const AUTHOR_NAMES_AGGREGATION: &str = "author-names";
/// Author buckets returned.
pub const AUTHOR_FACET_SIZE: usize = 10;

/// Builds ranked, paginated, faceted package queries.
#[derive(Debug, Clone)]
pub struct RankedQueryBuilder {
    facet_size: usize,
}

impl Default for RankedQueryBuilder {
    fn default() -> Self {
        Self {
            facet_size: AUTHOR_FACET_SIZE,
        }
    }
}

impl RankedQueryBuilder {
    /// Builder with the standard weights and facet size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return up to `size` author buckets.
    pub fn with_facet_size(mut self, size: usize) -> Self {
        self.facet_size = size;
        self
    }

    /// Build the descriptor for `request`, validating it first.
    pub fn build(&self, request: &SearchRequest) -> Result<QueryDescriptor> {
        request.validate()?;

        Ok(QueryDescriptor {
            from: usize::try_from(request.offset()).unwrap_or(usize::MAX),
            size: request.page_size as usize,
            query: self.function_score(&request.text),
            sort: sort_clause(request.sort),
            aggregations: vec![self.author_facets()],
        })
    }

    fn function_score(&self, text: &str) -> FunctionScoreQuery {
        FunctionScoreQuery {
            query: MultiMatchQuery {
                text: text.to_string(),
                fields: vec![
                    FieldWeight::new(fields::ID_KEYWORD, ID_KEYWORD_WEIGHT),
                    FieldWeight::new(fields::ID, ID_WEIGHT),
                    FieldWeight::new(fields::SUMMARY, SUMMARY_WEIGHT),
                ],
                operator: Operator::And,
            },
            popularity: FieldValueFactor {
                field: fields::DOWNLOAD_COUNT.to_string(),
                factor: POPULARITY_FACTOR,
            },
            max_boost: MAX_BOOST,
        }
    }

    fn author_facets(&self) -> NestedTermsAggregation {
        NestedTermsAggregation {
            name: AUTHORS_AGGREGATION.to_string(),
            path: fields::AUTHORS.to_string(),
            terms_name: AUTHOR_NAMES_AGGREGATION.to_string(),
            field: fields::AUTHOR_NAME.to_string(),
            size: self.facet_size,
        }
    }
}

fn sort_clause(mode: SortMode) -> SortClause {
    match mode {
        SortMode::Relevance => SortClause::Score,
        SortMode::Downloads => SortClause::Field {
            field: fields::DOWNLOAD_COUNT.to_string(),
            order: SortOrder::Desc,
        },
        SortMode::Recent => SortClause::Nested {
            path: fields::VERSIONS.to_string(),
            field: fields::VERSION_LAST_UPDATED.to_string(),
            order: SortOrder::Desc,
        },
    }
}
