//! Document store implementations for NuSearch.
//!
//! - [`MemoryStore`]: a complete in-process engine for tests and embedders
//!   that run without a cluster
//! - [`ElasticStore`]: an Elasticsearch client over HTTP

pub mod analysis;
pub mod elastic;
pub mod memory;

pub use elastic::ElasticStore;
pub use memory::MemoryStore;
