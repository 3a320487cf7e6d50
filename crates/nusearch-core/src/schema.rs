//! Index settings and mappings for the package index.
//!
//! The schema is expressed in the search engine's own JSON vocabulary so it
//! can be sent verbatim on index creation. The names of the custom analysis
//! components are exported for stores that implement analysis themselves.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Pattern tokenizer splitting identifiers on non-word characters.
pub const ID_TOKENIZER: &str = "nuget-id-tokenizer";
/// Regex used by [`ID_TOKENIZER`].
pub const ID_TOKENIZER_PATTERN: &str = r"\W+";
/// Word-delimiter filter applied to identifier tokens.
pub const ID_WORD_FILTER: &str = "nuget-id-words";
/// Full-text identifier analyzer.
pub const ID_ANALYZER: &str = "nuget-id-analyzer";
/// Whole-identifier lowercase analyzer.
pub const ID_KEYWORD_ANALYZER: &str = "nuget-id-keyword";

/// Default maximum nested sub-documents per package.
pub const NESTED_OBJECTS_LIMIT: u64 = 12_000;

/// Settings and mappings for one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSchema {
    /// Index settings, including analysis.
    pub settings: Value,
    /// Field mappings.
    pub mappings: Value,
}

impl IndexSchema {
    /// The package index schema.
    pub fn packages() -> Self {
        let settings = json!({
            "number_of_shards": 2,
            "number_of_replicas": 0,
            "mapping.nested_objects.limit": NESTED_OBJECTS_LIMIT,
            "analysis": {
                "tokenizer": {
                    ID_TOKENIZER: { "type": "pattern", "pattern": ID_TOKENIZER_PATTERN }
                },
                "filter": {
                    ID_WORD_FILTER: {
                        "type": "word_delimiter",
                        "split_on_case_change": true,
                        "preserve_original": true,
                        "split_on_numerics": true,
                        "generate_number_parts": false,
                        "generate_word_parts": true
                    }
                },
                "analyzer": {
                    ID_ANALYZER: {
                        "type": "custom",
                        "tokenizer": ID_TOKENIZER,
                        "filter": [ID_WORD_FILTER, "lowercase"]
                    },
                    ID_KEYWORD_ANALYZER: {
                        "type": "custom",
                        "tokenizer": "keyword",
                        "filter": ["lowercase"]
                    }
                }
            }
        });

        let mappings = json!({
            "properties": {
                "id": {
                    "type": "text",
                    "analyzer": ID_ANALYZER,
                    "fields": {
                        "keyword": { "type": "text", "analyzer": ID_KEYWORD_ANALYZER }
                    }
                },
                "summary": { "type": "text" },
                "downloadCount": { "type": "long" },
                "suggest": { "type": "completion" },
                "versions": {
                    "type": "nested",
                    "properties": {
                        "version": { "type": "keyword" },
                        "lastUpdated": { "type": "date" },
                        "dependencies": {
                            "type": "nested",
                            "properties": {
                                "id": { "type": "keyword" },
                                "version": { "type": "keyword" }
                            }
                        }
                    }
                },
                "authors": {
                    "type": "nested",
                    "properties": {
                        "name": {
                            "type": "text",
                            "fields": {
                                "raw": { "type": "keyword" }
                            }
                        }
                    }
                }
            }
        });

        Self { settings, mappings }
    }

    /// Request body for index creation.
    pub fn to_body(&self) -> Value {
        json!({ "settings": self.settings, "mappings": self.mappings })
    }

    /// Nested sub-document limit declared in the settings.
    pub fn nested_objects_limit(&self) -> u64 {
        self.settings
            .get("mapping.nested_objects.limit")
            .and_then(Value::as_u64)
            .unwrap_or(NESTED_OBJECTS_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_components() {
        let schema = IndexSchema::packages();
        let analysis = &schema.settings["analysis"];

        assert_eq!(analysis["tokenizer"][ID_TOKENIZER]["pattern"], r"\W+");
        let filter = &analysis["filter"][ID_WORD_FILTER];
        assert_eq!(filter["split_on_case_change"], true);
        assert_eq!(filter["generate_number_parts"], false);
        assert_eq!(analysis["analyzer"][ID_KEYWORD_ANALYZER]["tokenizer"], "keyword");
    }

    #[test]
    fn test_nested_collections() {
        let schema = IndexSchema::packages();
        let props = &schema.mappings["properties"];

        assert_eq!(props["versions"]["type"], "nested");
        assert_eq!(
            props["versions"]["properties"]["dependencies"]["type"],
            "nested"
        );
        assert_eq!(props["authors"]["type"], "nested");
        assert_eq!(
            props["authors"]["properties"]["name"]["fields"]["raw"]["type"],
            "keyword"
        );
        assert_eq!(props["suggest"]["type"], "completion");
    }

    #[test]
    fn test_body_and_limit() {
        let schema = IndexSchema::packages();
        let body = schema.to_body();
        assert!(body.get("settings").is_some());
        assert!(body.get("mappings").is_some());
        assert_eq!(schema.nested_objects_limit(), 12_000);
    }
}
