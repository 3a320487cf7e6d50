//! Query descriptor to Elasticsearch query DSL.

use nusearch_core::QueryDescriptor;
use nusearch_core::query::{
    FunctionScoreQuery, NestedTermsAggregation, Operator, SortClause, SortOrder,
};
use serde_json::{Map, Value, json};

/// Full `_search` request body for `query`.
pub fn search_body(query: &QueryDescriptor) -> Value {
    let mut body = json!({
        "from": query.from,
        "size": query.size,
        "track_total_hits": true,
        "query": function_score(&query.query),
        "sort": sort(&query.sort),
    });

    if !query.aggregations.is_empty() {
        let aggs: Map<String, Value> = query
            .aggregations
            .iter()
            .map(|agg| (agg.name.clone(), nested_terms(agg)))
            .collect();
        body["aggs"] = Value::Object(aggs);
    }
    body
}

fn function_score(fs: &FunctionScoreQuery) -> Value {
    let fields: Vec<String> = fs
        .query
        .fields
        .iter()
        .map(|f| format!("{}^{}", f.field, f.weight))
        .collect();
    let operator = match fs.query.operator {
        Operator::And => "and",
        Operator::Or => "or",
    };

    json!({
        "function_score": {
            "query": {
                "multi_match": {
                    "query": fs.query.text,
                    "type": "best_fields",
                    "fields": fields,
                    "operator": operator,
                }
            },
            // weight 1 + field value: the boost is 1 + value * factor.
            "functions": [
                { "weight": 1 },
                {
                    "field_value_factor": {
                        "field": fs.popularity.field,
                        "factor": fs.popularity.factor,
                        "missing": 0,
                    }
                }
            ],
            "score_mode": "sum",
            "boost_mode": "multiply",
            "max_boost": fs.max_boost,
        }
    })
}

fn order(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "asc",
        SortOrder::Desc => "desc",
    }
}

fn sort(clause: &SortClause) -> Value {
    match clause {
        SortClause::Score => json!(["_score"]),
        SortClause::Field { field, order: o } => json!([{ field.as_str(): { "order": order(*o) } }]),
        SortClause::Nested {
            path,
            field,
            order: o,
        } => json!([{
            field.as_str(): {
                "order": order(*o),
                "missing": "_last",
                "nested": { "path": path },
            }
        }]),
    }
}

fn nested_terms(agg: &NestedTermsAggregation) -> Value {
    json!({
        "nested": { "path": agg.path },
        "aggs": {
            agg.terms_name.as_str(): {
                "terms": {
                    "field": agg.field,
                    "size": agg.size,
                    "order": [{ "_count": "desc" }, { "_key": "asc" }],
                }
            }
        }
    })
}
