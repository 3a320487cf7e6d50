//! Package documents as stored in the index.
//!
//! A [`Package`] is the root document; versions, their dependencies and the
//! authors are nested collections. Field names serialize in camelCase, which
//! is also how the query layer refers to them (see [`fields`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Index field paths referenced by queries, sorts and aggregations.
pub mod fields {
    /// Identifier, analyzed with the identifier analyzer.
    pub const ID: &str = "id";
    /// Identifier, lowercased as one token.
    pub const ID_KEYWORD: &str = "id.keyword";
    /// Free-text summary.
    pub const SUMMARY: &str = "summary";
    /// Total download count.
    pub const DOWNLOAD_COUNT: &str = "downloadCount";
    /// Completion suggester.
    pub const SUGGEST: &str = "suggest";
    /// Nested versions path.
    pub const VERSIONS: &str = "versions";
    /// Last-updated timestamp of a nested version.
    pub const VERSION_LAST_UPDATED: &str = "versions.lastUpdated";
    /// Nested dependencies path.
    pub const DEPENDENCIES: &str = "versions.dependencies";
    /// Nested authors path.
    pub const AUTHORS: &str = "authors";
    /// Aggregatable author display name.
    pub const AUTHOR_NAME: &str = "authors.name.raw";
}

/// A package in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Unique identifier, also the document id.
    pub id: String,

    /// Free-text summary.
    #[serde(default)]
    pub summary: String,

    /// Total downloads across all versions.
    #[serde(default)]
    pub download_count: u64,

    /// Completion input derived from the identifier.
    #[serde(default)]
    pub suggest: Suggest,

    /// Published versions, in dump order.
    #[serde(default)]
    pub versions: Vec<PackageVersion>,

    /// Package authors, in dump order.
    #[serde(default)]
    pub authors: Vec<PackageAuthor>,
}

/// Completion suggester input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggest {
    /// Strings the suggester completes on.
    pub input: Vec<String>,
    /// Ranking weight.
    #[serde(default)]
    pub weight: i32,
}

/// A single published version of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersion {
    /// Version label, e.g. `13.0.3`.
    pub version: String,
    /// When this version was last updated.
    pub last_updated: DateTime<Utc>,
    /// Declared dependencies.
    #[serde(default)]
    pub dependencies: Vec<PackageDependency>,
}

/// A dependency declared by a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDependency {
    /// Identifier of the depended-on package.
    pub id: String,
    /// Version constraint, e.g. `[4.3.0, )`.
    #[serde(default)]
    pub version: String,
}

/// A package author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageAuthor {
    /// Display name.
    pub name: String,
}

impl Package {
    /// Create a package with the given identifier and no other data.
    pub fn new(id: impl Into<String>) -> Self {
        let mut package = Self {
            id: id.into(),
            summary: String::new(),
            download_count: 0,
            suggest: Suggest::default(),
            versions: Vec::new(),
            authors: Vec::new(),
        };
        package.derive_suggest();
        package
    }

    /// Set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Set the download count (also reweights the suggester).
    pub fn with_downloads(mut self, downloads: u64) -> Self {
        self.download_count = downloads;
        self.derive_suggest();
        self
    }

    /// Append a version.
    pub fn with_version(mut self, version: PackageVersion) -> Self {
        self.versions.push(version);
        self
    }

    /// Append an author.
    pub fn with_author(mut self, name: impl Into<String>) -> Self {
        self.authors.push(PackageAuthor { name: name.into() });
        self
    }

    /// Recompute [`Package::suggest`] from the identifier and download count.
    ///
    /// The input is the identifier plus every dot-separated suffix, so
    /// `Microsoft.Extensions.Logging` completes on `Extensions.Logging` and
    /// `Logging` as well.
    pub fn derive_suggest(&mut self) {
        let id = self.id.trim();
        let mut input = Vec::new();
        if !id.is_empty() {
            input.push(id.to_string());
            let mut rest = id;
            while let Some(pos) = rest.find('.') {
                rest = &rest[pos + 1..];
                if !rest.is_empty() {
                    input.push(rest.to_string());
                }
            }
        }
        self.suggest = Suggest {
            input,
            weight: i32::try_from(self.download_count).unwrap_or(i32::MAX),
        };
    }

    /// Number of nested sub-documents this package produces in the index.
    pub fn nested_count(&self) -> usize {
        self.versions
            .iter()
            .map(|v| 1 + v.dependencies.len())
            .sum::<usize>()
            + self.authors.len()
    }

    /// Check the document is indexable.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::invalid_document(&self.id, "identifier is required"));
        }
        Ok(())
    }
}

impl PackageVersion {
    /// Create a version without dependencies.
    pub fn new(version: impl Into<String>, last_updated: DateTime<Utc>) -> Self {
        Self {
            version: version.into(),
            last_updated,
            dependencies: Vec::new(),
        }
    }

    /// Append a dependency.
    pub fn with_dependency(mut self, id: impl Into<String>, version: impl Into<String>) -> Self {
        self.dependencies.push(PackageDependency {
            id: id.into(),
            version: version.into(),
        });
        self
    }
}
