//! NuSearch Core: shared types, errors, query descriptors and the store
//! contract.
//!
//! This crate has no internal NuSearch dependencies. Everything that talks to
//! a search engine goes through [`DocumentStore`].
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`model`]: Package documents
//! - [`query`]: Store-independent query descriptors
//! - [`schema`]: Index settings and mappings
//! - [`store`]: The document store trait and its response types
//! - [`mock`]: A scriptable store for tests

pub mod error;
pub mod mock;
pub mod model;
pub mod query;
pub mod schema;
pub mod store;

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use model::{Package, PackageAuthor, PackageDependency, PackageVersion, fields};
pub use query::QueryDescriptor;
pub use schema::IndexSchema;
pub use store::{
    BulkItem, BulkResponse, DocumentStore, ItemStatus, SearchHit, SearchResponse, TermsBucket,
};

/// Default name of the package index.
pub const DEFAULT_INDEX: &str = "nusearch";
