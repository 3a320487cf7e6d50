//! Search requests.

use std::fmt;
use std::str::FromStr;

use nusearch_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default number of hits per page.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Deepest hit a request may reach (`from + size`).
pub const MAX_RESULT_WINDOW: u64 = 10_000;

/// Hit ordering requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Combined text and popularity score.
    #[default]
    Relevance,
    /// Raw download count.
    Downloads,
    /// Last update of the first listed version.
    Recent,
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Relevance => "relevance",
            Self::Downloads => "downloads",
            Self::Recent => "recent",
        };
        f.write_str(name)
    }
}

impl FromStr for SortMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relevance" => Ok(Self::Relevance),
            "downloads" => Ok(Self::Downloads),
            "recent" => Ok(Self::Recent),
            other => Err(Error::invalid_request(format!(
                "unknown sort mode '{other}' (expected relevance, downloads or recent)"
            ))),
        }
    }
}

/// One page of a catalog search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free text matched against identifiers and summaries.
    pub text: String,
    /// 1-based page number.
    pub page: u32,
    /// Hits per page.
    pub page_size: u32,
    /// Ordering.
    pub sort: SortMode,
}

impl SearchRequest {
    /// First page of `text`, relevance-ordered, default page size.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: SortMode::default(),
        }
    }

    /// Sets the page.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the ordering.
    pub fn with_sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }

    /// Hits skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// Reject requests the store must never see. Nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::invalid_request("search text must not be blank"));
        }
        if self.page < 1 {
            return Err(Error::invalid_request("page must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(Error::invalid_request("page_size must be at least 1"));
        }
        let window = self.offset() + u64::from(self.page_size);
        if window > MAX_RESULT_WINDOW {
            return Err(Error::invalid_request(format!(
                "page {} of size {} reaches hit {window}, beyond the result window of {MAX_RESULT_WINDOW}",
                self.page, self.page_size
            )));
        }
        Ok(())
    }
}
