//! NuSearch query side: turn search requests into ranked, faceted store
//! queries and project the answers.
//!
//! # Modules
//!
//! - [`request`]: Search requests, sort modes and their validation
//! - [`builder`]: Ranked query construction
//! - [`results`]: Result projection and pagination math
//! - [`service`]: The search service composing the three

pub mod builder;
pub mod request;
pub mod results;
pub mod service;

pub use builder::RankedQueryBuilder;
pub use request::{DEFAULT_PAGE_SIZE, MAX_RESULT_WINDOW, SearchRequest, SortMode};
pub use results::{AuthorFacet, SearchResults, total_pages};
pub use service::SearchService;
