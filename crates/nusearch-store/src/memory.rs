//! In-memory document store.
//!
//! [`MemoryStore`] implements the whole [`DocumentStore`] contract inside the
//! process: schema-driven analysis, AND/best-fields matching scored with
//! BM25, the popularity function score, sorts, nested terms aggregations and
//! pagination. Writes become searchable on [`DocumentStore::refresh`], while
//! [`DocumentStore::get`] sees them immediately, as with the real engine.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use nusearch_core::fields;
use nusearch_core::query::{Operator, SortClause, SortOrder};
use nusearch_core::store::BulkItem;
use nusearch_core::{
    BulkResponse, DocumentStore, Error, IndexSchema, Package, QueryDescriptor, Result, SearchHit,
    SearchResponse, TermsBucket,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::analysis::Analysis;

/// BM25 term-frequency saturation.
const BM25_K1: f64 = 1.2;
/// BM25 length normalization.
const BM25_B: f64 = 0.75;

/// Shared in-process store; clones see the same indices.
#[derive(Clone, Default)]
pub struct MemoryStore {
    indices: Arc<RwLock<HashMap<String, MemoryIndex>>>,
}

struct MemoryIndex {
    analysis: Analysis,
    nested_limit: u64,
    /// Documents visible to count and search.
    searchable: BTreeMap<String, IndexedPackage>,
    /// Writes since the last refresh.
    pending: BTreeMap<String, IndexedPackage>,
}

#[derive(Clone)]
struct IndexedPackage {
    package: Package,
    id_terms: Vec<String>,
    id_keyword_terms: Vec<String>,
    summary_terms: Vec<String>,
}

/// Analyzed text fields a query can match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    Id,
    IdKeyword,
    Summary,
}

impl TextField {
    fn from_path(path: &str) -> Result<Self> {
        match path {
            fields::ID => Ok(Self::Id),
            fields::ID_KEYWORD => Ok(Self::IdKeyword),
            fields::SUMMARY => Ok(Self::Summary),
            other => Err(Error::invalid_request(format!(
                "field '{other}' is not searchable"
            ))),
        }
    }
}

impl IndexedPackage {
    fn terms(&self, field: TextField) -> &[String] {
        match field {
            TextField::Id => &self.id_terms,
            TextField::IdKeyword => &self.id_keyword_terms,
            TextField::Summary => &self.summary_terms,
        }
    }
}

impl MemoryIndex {
    fn new(schema: &IndexSchema) -> Result<Self> {
        Ok(Self {
            analysis: Analysis::from_schema(schema)?,
            nested_limit: schema.nested_objects_limit(),
            searchable: BTreeMap::new(),
            pending: BTreeMap::new(),
        })
    }

    fn analyzer_terms(&self, field: TextField, text: &str) -> Vec<String> {
        match field {
            TextField::Id => self.analysis.id.analyze(text),
            TextField::IdKeyword => self.analysis.id_keyword.analyze(text),
            TextField::Summary => self.analysis.standard.analyze(text),
        }
    }

    fn index(&self, package: &Package) -> std::result::Result<IndexedPackage, String> {
        package.validate().map_err(|e| e.to_string())?;
        let nested = package.nested_count() as u64;
        if nested > self.nested_limit {
            return Err(format!(
                "the number of nested documents ({nested}) exceeds the limit of [{}]",
                self.nested_limit
            ));
        }
        Ok(IndexedPackage {
            id_terms: self.analyzer_terms(TextField::Id, &package.id),
            id_keyword_terms: self.analyzer_terms(TextField::IdKeyword, &package.id),
            summary_terms: self.analyzer_terms(TextField::Summary, &package.summary),
            package: package.clone(),
        })
    }

    fn refresh(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        self.searchable.extend(pending);
    }

    fn search(&self, query: &QueryDescriptor) -> Result<SearchResponse> {
        let function = &query.query;
        let matcher = Matcher::new(self, query)?;

        let mut matches: Vec<(f64, &IndexedPackage)> = self
            .searchable
            .values()
            .filter_map(|doc| {
                matcher.score(doc).map(|base| {
                    let popularity = match function.popularity.field.as_str() {
                        fields::DOWNLOAD_COUNT => doc.package.download_count,
                        _ => 0,
                    };
                    (base * function.multiplier(popularity), doc)
                })
            })
            .collect();

        let aggregations = query
            .aggregations
            .iter()
            .map(|agg| -> Result<(String, Vec<TermsBucket>)> {
                let mut counts: BTreeMap<String, u64> = BTreeMap::new();
                for (_, doc) in &matches {
                    for key in nested_terms(&doc.package, &agg.path, &agg.field)? {
                        *counts.entry(key).or_default() += 1;
                    }
                }
                let mut buckets: Vec<TermsBucket> = counts
                    .into_iter()
                    .map(|(key, doc_count)| TermsBucket { key, doc_count })
                    .collect();
                buckets.sort_by(|a, b| b.doc_count.cmp(&a.doc_count).then(a.key.cmp(&b.key)));
                buckets.truncate(agg.size);
                Ok((agg.name.clone(), buckets))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        sort_matches(&mut matches, &query.sort)?;

        let total = matches.len() as u64;
        let keep_score = matches!(query.sort, SortClause::Score);
        let hits = matches
            .into_iter()
            .skip(query.from)
            .take(query.size)
            .map(|(score, doc)| SearchHit {
                id: doc.package.id.clone(),
                score: keep_score.then_some(score),
                package: doc.package.clone(),
            })
            .collect();

        Ok(SearchResponse {
            total,
            hits,
            aggregations,
        })
    }
}

/// Per-search matching state: analyzed query terms and collection stats.
struct Matcher {
    operator: Operator,
    fields: Vec<FieldMatcher>,
}

struct FieldMatcher {
    field: TextField,
    weight: f64,
    terms: Vec<String>,
    doc_freq: HashMap<String, usize>,
    avg_len: f64,
    total_docs: usize,
}

impl Matcher {
    fn new(index: &MemoryIndex, query: &QueryDescriptor) -> Result<Self> {
        let text = &query.query.query;
        let total_docs = index.searchable.len();

        let fields = text
            .fields
            .iter()
            .map(|fw| -> Result<FieldMatcher> {
                let field = TextField::from_path(&fw.field)?;
                let terms = index.analyzer_terms(field, &text.text);

                let mut doc_freq: HashMap<String, usize> =
                    terms.iter().map(|t| (t.clone(), 0)).collect();
                let mut total_len = 0usize;
                for doc in index.searchable.values() {
                    let doc_terms = doc.terms(field);
                    total_len += doc_terms.len();
                    for (term, df) in doc_freq.iter_mut() {
                        if doc_terms.contains(term) {
                            *df += 1;
                        }
                    }
                }
                let avg_len = if total_docs == 0 {
                    0.0
                } else {
                    total_len as f64 / total_docs as f64
                };

                Ok(FieldMatcher {
                    field,
                    weight: fw.weight,
                    terms,
                    doc_freq,
                    avg_len,
                    total_docs,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            operator: text.operator,
            fields,
        })
    }

    /// Best weighted field score, or `None` when no field matches.
    fn score(&self, doc: &IndexedPackage) -> Option<f64> {
        self.fields
            .iter()
            .filter_map(|fm| fm.score(doc, self.operator))
            .max_by(f64::total_cmp)
    }
}

impl FieldMatcher {
    fn score(&self, doc: &IndexedPackage, operator: Operator) -> Option<f64> {
        if self.terms.is_empty() {
            return None;
        }
        let doc_terms = doc.terms(self.field);
        let present = |term: &String| doc_terms.contains(term);
        let matched = match operator {
            Operator::And => self.terms.iter().all(present),
            Operator::Or => self.terms.iter().any(present),
        };
        if !matched {
            return None;
        }

        let doc_len = doc_terms.len() as f64;
        let score: f64 = self
            .terms
            .iter()
            .filter(|t| present(t))
            .map(|term| {
                let tf = doc_terms.iter().filter(|t| *t == term).count() as f64;
                let df = self.doc_freq.get(term).copied().unwrap_or(0) as f64;
                bm25(tf, df, self.total_docs as f64, doc_len, self.avg_len)
            })
            .sum();
        Some(self.weight * score)
    }
}

fn bm25(tf: f64, df: f64, total_docs: f64, doc_len: f64, avg_len: f64) -> f64 {
    let idf = ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln();
    let norm = if avg_len > 0.0 {
        1.0 - BM25_B + BM25_B * (doc_len / avg_len)
    } else {
        1.0
    };
    idf * (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * norm)
}

fn sort_matches(matches: &mut [(f64, &IndexedPackage)], sort: &SortClause) -> Result<()> {
    let by_id = |a: &IndexedPackage, b: &IndexedPackage| a.package.id.cmp(&b.package.id);

    match sort {
        SortClause::Score => {
            matches.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then_with(|| by_id(a, b)));
        }
        SortClause::Field { field, order } => {
            if field != fields::DOWNLOAD_COUNT {
                return Err(Error::invalid_request(format!(
                    "field '{field}' is not sortable"
                )));
            }
            matches.sort_by(|(_, a), (_, b)| {
                directed(
                    a.package.download_count.cmp(&b.package.download_count),
                    *order,
                )
                .then_with(|| by_id(a, b))
            });
        }
        SortClause::Nested { path, field, order } => {
            if path != fields::VERSIONS || field != fields::VERSION_LAST_UPDATED {
                return Err(Error::invalid_request(format!(
                    "nested field '{field}' is not sortable"
                )));
            }
            // Reads the first version only; packages without versions go last.
            let first = |doc: &IndexedPackage| doc.package.versions.first().map(|v| v.last_updated);
            matches.sort_by(|(_, a), (_, b)| {
                match (first(a), first(b)) {
                    (Some(x), Some(y)) => directed(x.cmp(&y), *order),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
                .then_with(|| by_id(a, b))
            });
        }
    }
    Ok(())
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

/// Values of a keyword field inside a nested collection, one per nested entry.
fn nested_terms(package: &Package, path: &str, field: &str) -> Result<Vec<String>> {
    match (path, field) {
        (fields::AUTHORS, fields::AUTHOR_NAME) => {
            Ok(package.authors.iter().map(|a| a.name.clone()).collect())
        }
        (fields::VERSIONS, "versions.version") => {
            Ok(package.versions.iter().map(|v| v.version.clone()).collect())
        }
        (fields::DEPENDENCIES, "versions.dependencies.id") => Ok(package
            .versions
            .iter()
            .flat_map(|v| v.dependencies.iter().map(|d| d.id.clone()))
            .collect()),
        _ => Err(Error::invalid_request(format!(
            "cannot aggregate on '{field}' under '{path}'"
        ))),
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn bulk_write(&self, index: &str, batch: &[Package]) -> Result<BulkResponse> {
        let mut indices = self.indices.write().await;
        let target = match indices.entry(index.to_string()) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                debug!(index, "auto-creating index on first write");
                entry.insert(MemoryIndex::new(&IndexSchema::packages())?)
            }
        };

        let mut items = Vec::with_capacity(batch.len());
        for package in batch {
            match target.index(package) {
                Ok(doc) => {
                    target.pending.insert(package.id.clone(), doc);
                    items.push(BulkItem::indexed(&package.id));
                }
                Err(reason) => items.push(BulkItem::rejected(&package.id, reason)),
            }
        }
        Ok(BulkResponse { items })
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        let mut indices = self.indices.write().await;
        let target = indices
            .get_mut(index)
            .ok_or_else(|| Error::not_found(format!("index '{index}'")))?;
        target.refresh();
        Ok(())
    }

    async fn exists(&self, index: &str) -> Result<bool> {
        Ok(self.indices.read().await.contains_key(index))
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        self.indices
            .write()
            .await
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("index '{index}'")))
    }

    async fn create_index(&self, index: &str, schema: &IndexSchema) -> Result<()> {
        let mut indices = self.indices.write().await;
        if indices.contains_key(index) {
            return Err(Error::store(format!("index '{index}' already exists")));
        }
        indices.insert(index.to_string(), MemoryIndex::new(schema)?);
        Ok(())
    }

    async fn count(&self, index: &str) -> Result<u64> {
        let indices = self.indices.read().await;
        let target = indices
            .get(index)
            .ok_or_else(|| Error::not_found(format!("index '{index}'")))?;
        Ok(target.searchable.len() as u64)
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<Package>> {
        let indices = self.indices.read().await;
        let target = indices
            .get(index)
            .ok_or_else(|| Error::not_found(format!("index '{index}'")))?;
        Ok(target
            .pending
            .get(id)
            .or_else(|| target.searchable.get(id))
            .map(|doc| doc.package.clone()))
    }

    async fn search(&self, index: &str, query: &QueryDescriptor) -> Result<SearchResponse> {
        let indices = self.indices.read().await;
        let target = indices
            .get(index)
            .ok_or_else(|| Error::not_found(format!("index '{index}'")))?;
        let response = target.search(query)?;
        debug!(index, total = response.total, hits = response.hits.len(), "search executed");
        Ok(response)
    }
}
