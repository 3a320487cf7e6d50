//! Configuration for the `nusearch` command.
//!
//! [`NusearchConfig`] loads from TOML files, environment variables and
//! defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `NUSEARCH_CONFIG` environment variable
//! 3. XDG default: `~/.config/nusearch/config.toml`
//! 4. Built-in defaults
//!
//! Any value can then be overridden with `NUSEARCH_<SECTION>_<KEY>`, e.g.
//! `NUSEARCH_STORE_URL` or `NUSEARCH_INDEXING_BATCH_SIZE`.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use confyg::{Confygery, env};
use nusearch_core::{DEFAULT_INDEX, Error, Result};
use nusearch_index::IngestOptions;
use nusearch_query::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Deserializer, Serialize};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "NUSEARCH_CONFIG";

// ============================================================================
// Configuration structs
// ============================================================================

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NusearchConfig {
    /// Document store connection.
    pub store: StoreConfig,

    /// Bulk ingestion tuning.
    pub indexing: IndexingConfig,

    /// Search defaults.
    pub search: SearchConfig,

    /// Dump location.
    pub dump: DumpConfig,
}

/// Document store connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Cluster URL.
    pub url: String,

    /// Target index.
    pub index: String,

    /// Per-request timeout in seconds.
    #[serde(deserialize_with = "lenient")]
    pub timeout_secs: u64,
}

/// Bulk ingestion tuning, mirrored into [`IngestOptions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Documents per bulk request.
    #[serde(deserialize_with = "lenient")]
    pub batch_size: usize,

    /// Bulk requests in flight.
    #[serde(deserialize_with = "lenient")]
    pub max_parallel_batches: usize,

    /// Resubmissions after a transient failure.
    #[serde(deserialize_with = "lenient")]
    pub max_retries_per_batch: usize,

    /// Fixed wait before each resubmission, in seconds.
    #[serde(deserialize_with = "lenient")]
    pub retry_backoff_secs: u64,

    /// Refresh the index after ingestion.
    #[serde(deserialize_with = "lenient")]
    pub refresh_on_completion: bool,
}

/// Search defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Hits per page when `--page-size` is not given.
    #[serde(deserialize_with = "lenient")]
    pub page_size: u32,
}

/// Dump location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    /// Directory (or single file) of JSONL dumps; `~` is expanded.
    pub path: Option<String>,
}

// ============================================================================
// Default implementations
// ============================================================================

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: DEFAULT_INDEX.to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        let options = IngestOptions::default();
        Self {
            batch_size: options.batch_size,
            max_parallel_batches: options.max_parallel_batches,
            max_retries_per_batch: options.max_retries_per_batch,
            retry_backoff_secs: options.retry_backoff.as_secs(),
            refresh_on_completion: options.refresh_on_completion,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl StoreConfig {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl IndexingConfig {
    /// Pipeline options for these settings.
    pub fn to_options(&self) -> IngestOptions {
        IngestOptions::default()
            .with_batch_size(self.batch_size)
            .with_max_parallel_batches(self.max_parallel_batches)
            .with_max_retries_per_batch(self.max_retries_per_batch)
            .with_retry_backoff(Duration::from_secs(self.retry_backoff_secs))
            .with_refresh_on_completion(self.refresh_on_completion)
    }
}

impl DumpConfig {
    /// Configured dump path with `~` and variables expanded.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>> {
        self.path
            .as_deref()
            .map(|p| {
                shellexpand::full(p)
                    .map(|expanded| PathBuf::from(expanded.as_ref()))
                    .map_err(|e| Error::config(format!("dump.path: {e}")))
            })
            .transpose()
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl NusearchConfig {
    /// Load configuration from file, environment, and defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path) {
            if path.exists() {
                builder
                    .add_file(&path.to_string_lossy())
                    .map_err(|e| Error::config(format!("config file: {e}")))?;
            }
        }

        let mut env_opts = env::Options::with_top_level("NUSEARCH");
        env_opts.add_section("store");
        env_opts.add_section("indexing");
        env_opts.add_section("search");
        env_opts.add_section("dump");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))
    }

    /// Resolve the config file path from explicit flag, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(path));
        }
        Self::default_config_path()
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("nusearch").join("config.toml"))
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }
}

// ============================================================================
// Helper: accept numbers and booleans given as strings
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Value(T),
    Text(String),
}

/// Environment overrides arrive as strings; parse them into the field type.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    match Lenient::<T>::deserialize(deserializer)? {
        Lenient::Value(value) => Ok(value),
        Lenient::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NusearchConfig::default();
        assert_eq!(config.store.url, "http://localhost:9200");
        assert_eq!(config.store.index, "nusearch");
        assert_eq!(config.store.timeout(), Duration::from_secs(60));
        assert_eq!(config.indexing.batch_size, 1000);
        assert_eq!(config.indexing.max_parallel_batches, 4);
        assert_eq!(config.indexing.max_retries_per_batch, 2);
        assert_eq!(config.indexing.retry_backoff_secs, 30);
        assert!(config.indexing.refresh_on_completion);
        assert_eq!(config.search.page_size, 25);
        assert!(config.dump.path.is_none());
    }

    #[test]
    fn test_from_toml() {
        let config: NusearchConfig = toml::from_str(
            r#"
                [store]
                url = "http://es.internal:9200"
                index = "catalog"

                [indexing]
                batch_size = 250
                refresh_on_completion = false

                [dump]
                path = "/data/dumps"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.url, "http://es.internal:9200");
        assert_eq!(config.store.index, "catalog");
        assert_eq!(config.store.timeout_secs, 60);
        assert_eq!(config.indexing.batch_size, 250);
        assert_eq!(config.indexing.max_parallel_batches, 4);
        assert!(!config.indexing.refresh_on_completion);
        assert_eq!(config.dump.path.as_deref(), Some("/data/dumps"));
    }

    #[test]
    fn test_string_values_are_parsed() {
        let config: NusearchConfig = toml::from_str(
            r#"
                [indexing]
                batch_size = "500"
                refresh_on_completion = "false"
                [search]
                page_size = " 10 "
            "#,
        )
        .unwrap();
        assert_eq!(config.indexing.batch_size, 500);
        assert!(!config.indexing.refresh_on_completion);
        assert_eq!(config.search.page_size, 10);

        let bad = toml::from_str::<NusearchConfig>("[indexing]\nbatch_size = \"many\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_to_options() {
        let indexing = IndexingConfig {
            batch_size: 10,
            max_parallel_batches: 2,
            max_retries_per_batch: 5,
            retry_backoff_secs: 1,
            refresh_on_completion: false,
        };
        let options = indexing.to_options();
        assert_eq!(options.batch_size, 10);
        assert_eq!(options.max_parallel_batches, 2);
        assert_eq!(options.max_retries_per_batch, 5);
        assert_eq!(options.retry_backoff, Duration::from_secs(1));
        assert!(!options.refresh_on_completion);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = NusearchConfig::default();
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("[store]"));
        let parsed: NusearchConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
                [store]
                index = "from-file"
                [search]
                page_size = 50
            "#,
        )
        .unwrap();

        let config = NusearchConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.store.index, "from-file");
        assert_eq!(config.search.page_size, 50);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = NusearchConfig::load(Some("/nonexistent/nusearch.toml")).unwrap();
        assert_eq!(config.indexing.batch_size, 1000);
    }

    #[test]
    fn test_resolve_explicit_path() {
        let path = NusearchConfig::resolve_config_path(Some("/explicit/config.toml"));
        assert_eq!(path, Some(PathBuf::from("/explicit/config.toml")));
    }

    #[test]
    fn test_dump_path_expansion() {
        let dump = DumpConfig {
            path: Some("/plain/path".into()),
        };
        assert_eq!(
            dump.resolved_path().unwrap(),
            Some(PathBuf::from("/plain/path"))
        );
        assert_eq!(DumpConfig::default().resolved_path().unwrap(), None);
    }
}
