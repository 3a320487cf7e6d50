//! Elasticsearch HTTP store.
//!
//! Talks to a single Elasticsearch endpoint over its REST API and classifies
//! failures for the indexing pipeline:
//!
//! - connection failures, timeouts, I/O errors on an open connection and
//!   HTTP 429/502/503/504 are transient
//! - any other unsuccessful status, and requests that could not be built,
//!   are fatal
//! - inside a bulk response, an item rejected with 429 is reported as
//!   throttled so it alone can be resent; any other item error is a
//!   per-document rejection

pub mod dsl;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use nusearch_core::store::BulkItem;
use nusearch_core::{
    BulkResponse, DocumentStore, Error, IndexSchema, Package, QueryDescriptor, Result, SearchHit,
    SearchResponse, TermsBucket,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Elasticsearch-backed [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct ElasticStore {
    base_url: Url,
    client: Client,
}

impl ElasticStore {
    /// Creates a store for the cluster at `url` with the default timeout.
    pub fn new(url: &str) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Creates a store whose requests give up after `timeout`.
    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(url).map_err(|e| Error::config(format!("invalid store URL '{url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!("invalid store URL '{url}'")));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { base_url, client })
    }

    /// Cluster URL.
    pub fn url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config(format!("invalid store URL '{}'", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request.send().await.map_err(classify_transport)
    }

    /// Fail on any unsuccessful status, transient or not.
    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(classify_status(status, &body))
    }

    async fn json<T: serde::de::DeserializeOwned>(&self, response: Response) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| Error::malformed(format!("unexpected response body: {e}")))
    }
}

fn classify_transport(err: reqwest::Error) -> Error {
    let transient = err.is_connect()
        || err.is_timeout()
        || err.is_body()
        || (err.is_request() && caused_by_io(&err));
    if transient {
        Error::transient(format!("request failed: {err}"))
    } else {
        Error::store(format!("request failed: {err}"))
    }
}

/// Whether an I/O error (reset, broken pipe, ...) sits in the source chain.
fn caused_by_io(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if cause.is::<std::io::Error>() {
            return true;
        }
        source = cause.source();
    }
    false
}

fn classify_status(status: StatusCode, body: &str) -> Error {
    let message = format!("HTTP {status}: {body}");
    if is_transient_status(status) {
        Error::transient(message)
    } else {
        Error::store(message)
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// NDJSON body with one `index` action per document, so re-indexing an
/// identifier replaces it.
fn bulk_body(batch: &[&Package]) -> Result<String> {
    let mut body = String::new();
    for package in batch {
        let action = serde_json::json!({ "index": { "_id": package.id } });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(package)?);
        body.push('\n');
    }
    Ok(body)
}

#[derive(Deserialize)]
struct BulkReply {
    items: Vec<BTreeMap<String, BulkReplyItem>>,
}

#[derive(Deserialize)]
struct BulkReplyItem {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

impl BulkReplyItem {
    fn reason(&self) -> Option<String> {
        self.error.as_ref().map(|error| {
            let kind = error.get("type").and_then(Value::as_str);
            let reason = error.get("reason").and_then(Value::as_str);
            match (kind, reason) {
                (Some(kind), Some(reason)) => format!("{kind}: {reason}"),
                _ => error.to_string(),
            }
        })
    }
}

#[derive(Deserialize)]
struct CountReply {
    count: u64,
}

#[derive(Deserialize)]
struct GetReply {
    #[serde(rename = "_source")]
    source: Package,
}

#[derive(Deserialize)]
struct SearchReply {
    hits: HitsReply,
    #[serde(default)]
    aggregations: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct HitsReply {
    total: TotalReply,
    hits: Vec<HitReply>,
}

#[derive(Deserialize)]
struct TotalReply {
    value: u64,
}

#[derive(Deserialize)]
struct HitReply {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: Package,
}

#[derive(Deserialize)]
struct TermsReply {
    buckets: Vec<TermsBucket>,
}

#[async_trait]
impl DocumentStore for ElasticStore {
    async fn bulk_write(&self, index: &str, batch: &[Package]) -> Result<BulkResponse> {
        // Documents failing local validation are rejected without a round trip.
        let mut outcomes: Vec<Option<BulkItem>> = vec![None; batch.len()];
        let mut sent = Vec::with_capacity(batch.len());
        for (pos, package) in batch.iter().enumerate() {
            match package.validate() {
                Ok(()) => sent.push(pos),
                Err(e) => outcomes[pos] = Some(BulkItem::rejected(&package.id, e.to_string())),
            }
        }

        if !sent.is_empty() {
            let documents: Vec<&Package> = sent.iter().map(|&pos| &batch[pos]).collect();
            let request = self
                .client
                .post(self.url_for(&[index, "_bulk"])?)
                .header("content-type", "application/x-ndjson")
                .body(bulk_body(&documents)?);
            let response = self.check(self.send(request).await?).await?;
            let reply: BulkReply = self.json(response).await?;

            if reply.items.len() != sent.len() {
                return Err(Error::malformed(format!(
                    "bulk reply has {} items for {} documents",
                    reply.items.len(),
                    sent.len()
                )));
            }

            let mut throttled = 0usize;
            for (&pos, item) in sent.iter().zip(reply.items) {
                let item = item
                    .into_values()
                    .next()
                    .ok_or_else(|| Error::malformed("empty bulk reply item"))?;
                let id = &batch[pos].id;
                outcomes[pos] = Some(match item.reason() {
                    None => BulkItem::indexed(id),
                    Some(_) if item.status == StatusCode::TOO_MANY_REQUESTS.as_u16() => {
                        throttled += 1;
                        BulkItem::throttled(id)
                    }
                    Some(reason) => BulkItem::rejected(id, reason),
                });
            }

            if throttled > 0 {
                warn!(index, throttled, "bulk items throttled by the cluster");
            }
        }

        debug!(index, documents = batch.len(), "bulk request completed");
        Ok(BulkResponse {
            items: outcomes.into_iter().flatten().collect(),
        })
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        let request = self.client.post(self.url_for(&[index, "_refresh"])?);
        self.check(self.send(request).await?).await?;
        Ok(())
    }

    async fn exists(&self, index: &str) -> Result<bool> {
        let response = self.send(self.client.head(self.url_for(&[index])?)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        self.check(response).await?;
        Ok(true)
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let response = self
            .send(self.client.delete(self.url_for(&[index])?))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::not_found(format!("index '{index}'")));
        }
        self.check(response).await?;
        info!(index, "index deleted");
        Ok(())
    }

    async fn create_index(&self, index: &str, schema: &IndexSchema) -> Result<()> {
        let request = self
            .client
            .put(self.url_for(&[index])?)
            .json(&schema.to_body());
        self.check(self.send(request).await?).await?;
        info!(index, "index created");
        Ok(())
    }

    async fn count(&self, index: &str) -> Result<u64> {
        let response = self
            .send(self.client.get(self.url_for(&[index, "_count"])?))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::not_found(format!("index '{index}'")));
        }
        let reply: CountReply = self.json(self.check(response).await?).await?;
        Ok(reply.count)
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<Package>> {
        let response = self
            .send(self.client.get(self.url_for(&[index, "_doc", id])?))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let reply: GetReply = self.json(self.check(response).await?).await?;
        Ok(Some(reply.source))
    }

    async fn search(&self, index: &str, query: &QueryDescriptor) -> Result<SearchResponse> {
        let request = self
            .client
            .post(self.url_for(&[index, "_search"])?)
            .json(&dsl::search_body(query));
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::not_found(format!("index '{index}'")));
        }
        let reply: SearchReply = self.json(self.check(response).await?).await?;

        let mut aggregations = BTreeMap::new();
        for agg in &query.aggregations {
            let Some(outer) = reply.aggregations.get(&agg.name) else {
                continue;
            };
            let inner = outer.get(&agg.terms_name).cloned().ok_or_else(|| {
                Error::malformed(format!(
                    "aggregation '{}' lacks '{}'",
                    agg.name, agg.terms_name
                ))
            })?;
            let terms: TermsReply = serde_json::from_value(inner)
                .map_err(|e| Error::malformed(format!("aggregation '{}': {e}", agg.name)))?;
            aggregations.insert(agg.name.clone(), terms.buckets);
        }

        let hits = reply
            .hits
            .hits
            .into_iter()
            .map(|hit| SearchHit {
                id: hit.id,
                score: hit.score,
                package: hit.source,
            })
            .collect();

        Ok(SearchResponse {
            total: reply.hits.total.value,
            hits,
            aggregations,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let store = ElasticStore::new("http://localhost:9200/").unwrap();
        let url = store.url_for(&["pkgs", "_doc", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/pkgs/_doc/a%2Fb%20c");

        let store = ElasticStore::new("http://proxy/es").unwrap();
        let url = store.url_for(&["pkgs", "_bulk"]).unwrap();
        assert_eq!(url.as_str(), "http://proxy/es/pkgs/_bulk");
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(ElasticStore::new("not a url"), Err(Error::Config(_))));
        assert!(matches!(
            ElasticStore::new("mailto:ops@example.com"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_status_classification() {
        for status in [429u16, 502, 503, 504] {
            let status = StatusCode::from_u16(status).unwrap();
            assert!(classify_status(status, "").is_retryable());
        }
        for status in [400u16, 401, 403, 500] {
            let status = StatusCode::from_u16(status).unwrap();
            assert!(!classify_status(status, "").is_retryable());
        }
    }

    #[test]
    fn test_unbuildable_request_is_fatal() {
        let err = reqwest::Client::new().get("not a url").build().unwrap_err();
        assert!(err.is_builder());
        assert!(!classify_transport(err).is_retryable());
    }

    #[test]
    fn test_io_cause_is_found_in_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let wrapped = Error::io_with_path(io, std::path::Path::new("/x"));
        assert!(caused_by_io(&wrapped));

        let plain = Error::store("nope");
        assert!(!caused_by_io(&plain));
    }

    #[test]
    fn test_bulk_body_is_ndjson() {
        let a = Package::new("A");
        let b = Package::new("B").with_downloads(3);
        let body = bulk_body(&[&a, &b]).unwrap();

        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], r#"{"index":{"_id":"A"}}"#);
        let doc: Value = serde_json::from_str(lines[3]).unwrap();
        assert_eq!(doc["downloadCount"], 3);
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn test_bulk_item_reason() {
        let item: BulkReplyItem = serde_json::from_value(serde_json::json!({
            "status": 400,
            "error": { "type": "mapper_parsing_exception", "reason": "failed to parse" }
        }))
        .unwrap();
        assert_eq!(
            item.reason().unwrap(),
            "mapper_parsing_exception: failed to parse"
        );
    }
}
