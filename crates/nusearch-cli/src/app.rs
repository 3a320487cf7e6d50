//! The `nusearch` application: wires config, store, indexer and search
//! service to the parsed command line.

use std::path::PathBuf;
use std::sync::Arc;

use nusearch_core::{DocumentStore, Error, Result};
use nusearch_index::{
    BootstrapAction, BootstrapMode, BulkIndexer, DumpReader, IndexBootstrap, IngestOutcome,
    IngestReport,
};
use nusearch_query::{SearchRequest, SearchResults, SearchService, SortMode};
use nusearch_store::ElasticStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{CliArgs, Command};
use crate::config::NusearchConfig;
use crate::config_handlers;

// ============================================================================
// NusearchApp
// ============================================================================

/// Command dispatcher bound to one configuration and one document store.
pub struct NusearchApp {
    config: NusearchConfig,
    store: Arc<dyn DocumentStore>,
}

/// Options of the `search` command.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Free-text query.
    pub text: String,
    /// 1-based page.
    pub page: u32,
    /// Hits per page; `None` uses the configured default.
    pub page_size: Option<u32>,
    /// Ordering.
    pub sort: SortMode,
    /// Emit JSON instead of a listing.
    pub json: bool,
}

impl NusearchApp {
    /// Load config from file/env and connect to the configured cluster.
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let config = NusearchConfig::load(args.config.as_deref())?;
        Self::new(config)
    }

    /// Build an app talking to the Elasticsearch cluster named by `config`.
    pub fn new(config: NusearchConfig) -> Result<Self> {
        let store = ElasticStore::with_timeout(&config.store.url, config.store.timeout())?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Build an app over an arbitrary store.
    pub fn with_store(config: NusearchConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self { config, store }
    }

    /// Effective configuration.
    pub fn config(&self) -> &NusearchConfig {
        &self.config
    }

    /// Initialise tracing-based logging.
    ///
    /// `RUST_LOG` wins; otherwise the verbosity flags pick the level.
    pub fn init_logging(verbose: bool, quiet: bool) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if quiet {
            EnvFilter::new("warn")
        } else if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        };

        // A subscriber may already be installed (e.g. in tests).
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Run one command.
    pub async fn run(&self, args: CliArgs) -> Result<()> {
        match args.command {
            Some(Command::Index {
                path,
                keep_existing,
            }) => {
                let mode = if keep_existing {
                    BootstrapMode::KeepExisting
                } else {
                    BootstrapMode::Recreate
                };
                let report = self.index(path, mode, interrupted()).await?;
                print_report(&report);
                Ok(())
            }
            Some(Command::Search {
                text,
                page,
                page_size,
                sort,
                json,
            }) => {
                let options = SearchOptions {
                    text,
                    page,
                    page_size,
                    sort,
                    json,
                };
                let results = self.search(&options).await?;
                if options.json {
                    println!("{}", serde_json::to_string_pretty(&results)?);
                } else {
                    print_results(&results);
                }
                Ok(())
            }
            Some(Command::Count) => {
                println!("{}", self.count().await?);
                Ok(())
            }
            Some(Command::Config(config_cmd)) => {
                config_handlers::handle_config_command(args.config.as_deref(), config_cmd.command)
            }
            Some(Command::Version) => {
                println!("nusearch {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
            None => {
                println!(
                    "nusearch {}: use --help for usage",
                    env!("CARGO_PKG_VERSION")
                );
                Ok(())
            }
        }
    }

    /// Bootstrap the index and load every dump under `path` (or the
    /// configured dump path). Stops drawing batches once `cancel` resolves.
    ///
    /// Partial failures and cancellation still return the report; only a
    /// fatal abort is an error.
    pub async fn index<C>(
        &self,
        path: Option<PathBuf>,
        mode: BootstrapMode,
        cancel: C,
    ) -> Result<IngestReport>
    where
        C: Future<Output = ()>,
    {
        let root = match path {
            Some(path) => path,
            None => self.config.dump.resolved_path()?.ok_or_else(|| {
                Error::config("no dump path given and dump.path is not configured")
            })?,
        };
        let index = &self.config.store.index;

        let action = IndexBootstrap::new(self.store.clone(), index.as_str())
            .prepare(mode)
            .await?;
        match action {
            BootstrapAction::Created => info!(index = %index, "created index"),
            BootstrapAction::Recreated => info!(index = %index, "recreated index"),
            BootstrapAction::Kept => info!(index = %index, "keeping existing index"),
        }

        let packages = DumpReader::new(root).packages().await?;
        let outcome = BulkIndexer::new(self.store.clone(), index.as_str())
            .with_options(self.config.indexing.to_options())
            .ingest_until(packages, cancel)
            .await;

        match &outcome {
            IngestOutcome::Success(_) => info!("ingestion complete"),
            IngestOutcome::PartialFailure(report) => warn!(
                failed = report.failed_documents(),
                "ingestion finished with failures"
            ),
            IngestOutcome::Cancelled(_) => warn!("ingestion cancelled"),
            IngestOutcome::Fatal { .. } => {}
        }
        outcome.into_result()
    }

    /// Run one search against the configured index.
    pub async fn search(&self, options: &SearchOptions) -> Result<SearchResults> {
        let request = SearchRequest::new(options.text.clone())
            .with_page(options.page)
            .with_page_size(options.page_size.unwrap_or(self.config.search.page_size))
            .with_sort(options.sort);
        SearchService::new(self.store.clone(), self.config.store.index.as_str())
            .search(request)
            .await
    }

    /// Searchable documents in the configured index.
    pub async fn count(&self) -> Result<u64> {
        self.store.count(&self.config.store.index).await
    }
}

/// Resolves on Ctrl-C. Never resolves if the signal handler cannot be
/// installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    warn!("interrupt received; finishing in-flight batches");
}

// ============================================================================
// Rendering
// ============================================================================

fn print_report(report: &IngestReport) {
    println!(
        "Indexed {} packages in {} batches ({} retries)",
        report.indexed, report.batches, report.retries
    );
    for item in &report.failed_items {
        println!("  rejected {} (batch {}): {}", item.id, item.batch, item.reason);
    }
    for batch in &report.failed_batches {
        println!(
            "  batch {} failed after {} attempts ({} packages): {}",
            batch.batch,
            batch.attempts,
            batch.ids.len(),
            batch.error
        );
    }
}

fn print_results(results: &SearchResults) {
    println!(
        "{} matches, page {} of {}",
        results.total_matches, results.request.page, results.total_pages
    );
    for package in &results.hits {
        let latest = package
            .versions
            .first()
            .map(|v| v.version.as_str())
            .unwrap_or("-");
        println!(
            "  {:<40} {:>12} downloads  {}",
            package.id, package.download_count, latest
        );
        if !package.summary.is_empty() {
            println!("      {}", package.summary);
        }
    }
    if !results.author_facets.is_empty() {
        println!("Authors:");
        for facet in &results.author_facets {
            println!("  {} ({})", facet.name, facet.count);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
