//! NuSearch indexing: bootstrap the package index and bulk-load package
//! dumps into it.
//!
//! # Modules
//!
//! - [`bootstrap`]: Create or recreate the target index
//! - [`options`]: Batch size, parallelism and retry policy
//! - [`outcome`]: Run reports and terminal outcomes
//! - [`pipeline`]: The bulk indexer
//! - [`source`]: Lazy JSONL dump reading

pub mod bootstrap;
pub mod options;
pub mod outcome;
pub mod pipeline;
pub mod source;

pub use bootstrap::{BootstrapAction, BootstrapMode, IndexBootstrap};
pub use options::IngestOptions;
pub use outcome::{FailedBatch, FailedItem, IngestOutcome, IngestReport};
pub use pipeline::BulkIndexer;
pub use source::DumpReader;
