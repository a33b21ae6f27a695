pub mod client;
pub mod types;

pub use client::GitHubClient;
pub use types::{PrSummary, SearchItem, ShapeError};

use async_trait::async_trait;
use thiserror::Error;

/// Items requested per search page (the provider maximum).
pub const PER_PAGE: u32 = 100;
/// The search endpoint never serves more results than this for one query.
pub const MAX_SEARCH_RESULTS: u32 = 1000;
/// Last page number the search endpoint will answer at [`PER_PAGE`].
pub const MAX_SEARCH_PAGES: u32 = MAX_SEARCH_RESULTS / PER_PAGE;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GitHub API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("GitHub API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("GitHub API rate limit exceeded after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("Unexpected search response shape: {0}")]
    UnexpectedResponseShape(#[from] ShapeError),
}

/// One page of the issue/PR search endpoint.
///
/// The fetch loop only depends on this trait so it can run against a
/// scripted provider in tests.
#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Return the items of `page` (1-based) for the search string `query`.
    /// An empty vector means the result set is exhausted.
    async fn search_page(&self, query: &str, page: u32) -> Result<Vec<SearchItem>, FetchError>;
}
