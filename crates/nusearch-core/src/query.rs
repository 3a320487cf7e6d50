//! Store-independent query descriptors.
//!
//! A [`QueryDescriptor`] is a plain serializable value describing one ranked,
//! paginated, faceted search. It is built by `nusearch-query` and interpreted
//! by each [`DocumentStore`](crate::store::DocumentStore) implementation, so
//! query construction can be tested without a live store.

use serde::{Deserialize, Serialize};

/// One complete search against the package index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Number of sorted hits to skip.
    pub from: usize,
    /// Maximum number of hits to return.
    pub size: usize,
    /// Scoring query selecting and ranking documents.
    pub query: FunctionScoreQuery,
    /// Ordering of the hits.
    pub sort: SortClause,
    /// Facet aggregations, computed over every matching document.
    #[serde(default)]
    pub aggregations: Vec<NestedTermsAggregation>,
}

/// Base text relevance multiplied by a popularity function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionScoreQuery {
    /// Text match producing the base score.
    pub query: MultiMatchQuery,
    /// Popularity signal feeding the multiplier.
    pub popularity: FieldValueFactor,
    /// Upper bound on the multiplier.
    pub max_boost: f64,
}

impl FunctionScoreQuery {
    /// Multiplier applied to the base score for a document whose popularity
    /// field holds `value`: `min(1 + value * factor, max_boost)`.
    pub fn multiplier(&self, value: u64) -> f64 {
        (1.0 + value as f64 * self.popularity.factor).min(self.max_boost)
    }
}

/// Match the same text against several weighted fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiMatchQuery {
    /// Raw user text; each field analyzes it with its own analyzer.
    pub text: String,
    /// Fields and their weights.
    pub fields: Vec<FieldWeight>,
    /// How the analyzed terms combine within a field.
    pub operator: Operator,
}

/// A field with a fixed scoring weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWeight {
    /// Field path, see [`crate::model::fields`].
    pub field: String,
    /// Weight applied to the field's score.
    pub weight: f64,
}

impl FieldWeight {
    /// Create a weighted field.
    pub fn new(field: impl Into<String>, weight: f64) -> Self {
        Self {
            field: field.into(),
            weight,
        }
    }
}

/// Term combination within a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Every term must match.
    And,
    /// Any term may match.
    Or,
}

/// Numeric field used as a popularity signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValueFactor {
    /// Numeric field path.
    pub field: String,
    /// Scale applied to the field value.
    pub factor: f64,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// Hit ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum SortClause {
    /// Descending combined score.
    Score,
    /// A root-level field.
    Field {
        /// Field path.
        field: String,
        /// Direction.
        order: SortOrder,
    },
    /// A field of a nested collection, read from the first nested entry.
    Nested {
        /// Nested collection path.
        path: String,
        /// Field path inside the collection.
        field: String,
        /// Direction.
        order: SortOrder,
    },
}

/// Terms counts over a field of a nested collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedTermsAggregation {
    /// Name of the nested aggregation (response key).
    pub name: String,
    /// Nested collection path.
    pub path: String,
    /// Name of the inner terms aggregation.
    pub terms_name: String,
    /// Aggregatable field inside the collection.
    pub field: String,
    /// Maximum number of buckets.
    pub size: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn function_score(factor: f64, max_boost: f64) -> FunctionScoreQuery {
        FunctionScoreQuery {
            query: MultiMatchQuery {
                text: "json".into(),
                fields: vec![FieldWeight::new("summary", 0.8)],
                operator: Operator::And,
            },
            popularity: FieldValueFactor {
                field: "downloadCount".into(),
                factor,
            },
            max_boost,
        }
    }

    #[test]
    fn test_multiplier_grows_with_value() {
        let fs = function_score(0.0001, 50.0);
        assert_eq!(fs.multiplier(0), 1.0);
        assert!((fs.multiplier(10_000) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_multiplier_is_capped() {
        let fs = function_score(0.0001, 50.0);
        assert_eq!(fs.multiplier(490_000), 50.0);
        assert_eq!(fs.multiplier(100_000_000), 50.0);
    }

    #[test]
    fn test_sort_clause_serialization() {
        let sort = SortClause::Nested {
            path: "versions".into(),
            field: "versions.lastUpdated".into(),
            order: SortOrder::Desc,
        };
        let json = serde_json::to_value(&sort).unwrap();
        assert_eq!(json["by"], "nested");
        assert_eq!(json["order"], "desc");

        let back: SortClause = serde_json::from_value(json).unwrap();
        assert_eq!(back, sort);
    }
}
