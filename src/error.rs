use thiserror::Error;

use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::fetch::PageError;
use crate::github::{FetchError, ShapeError};
use crate::query::QueryKind;
use crate::report::ReportError;

/// Failure while processing one query kind, tagged with the stage it hit.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("aggregation failed: {0}")]
    Aggregate(#[from] ShapeError),

    #[error("report failed: {0}")]
    Report(#[from] ReportError),
}

impl From<PageError> for StageError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::Fetch(e) => StageError::Fetch(e),
            PageError::Cache(e) => StageError::Cache(e),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("http client: {0}")]
    Client(#[source] FetchError),

    #[error("{kind}: {source}")]
    Kind {
        kind: QueryKind,
        #[source]
        source: StageError,
    },
}

impl RunError {
    pub fn kind(kind: QueryKind) -> impl FnOnce(StageError) -> RunError {
        move |source| RunError::Kind { kind, source }
    }
}
