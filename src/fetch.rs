use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::cache::{CacheError, PageCache};
use crate::github::{FetchError, SearchApi, MAX_SEARCH_PAGES, MAX_SEARCH_RESULTS};
use crate::query::QueryDescriptor;

#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// What a fetch run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Pages requested from the provider and written to the cache.
    pub fetched: u32,
    /// Pages already present in the cache.
    pub skipped: u32,
    /// Search requests issued, including the one that came back empty.
    pub requests: u32,
    /// Page at which the result set ended, if the end was reached.
    pub terminal_page: Option<u32>,
}

/// Walk the search result pages for `query`, starting at page 1, until the
/// provider returns an empty page.
///
/// Cached pages are read back instead of fetched, which makes an
/// interrupted run resumable. A cached page that holds no items ends the
/// walk. Once the end is seen it is recorded in the cache, so a complete
/// cache costs no requests on the next run. The cursor never goes past
/// `max_pages`, nor past the last page the search endpoint will serve;
/// reaching that ceiling is recorded as the end of the result set.
#[instrument(skip_all, fields(user = %query.user(), kind = %query.kind()))]
pub async fn fetch<A: SearchApi + ?Sized>(
    api: &A,
    query: &QueryDescriptor,
    cache: &PageCache,
    max_pages: u32,
) -> Result<FetchSummary, PageError> {
    let search = query.search_query();
    let completion = cache.completion()?;
    let mut summary = FetchSummary::default();

    let last_page = max_pages.min(MAX_SEARCH_PAGES);
    for page in 1..=last_page {
        if cache.exists(page) {
            let items = cache.read(page)?;
            if items.is_empty() {
                warn!(page, "cached page is empty, treating it as the last page");
                summary.terminal_page = Some(page);
                return Ok(summary);
            }
            info!(page, items = items.len(), "skipping page, already cached");
            summary.skipped += 1;
            continue;
        }

        if completion.as_ref().is_some_and(|c| c.terminal_page == page) {
            info!(page, "result set already complete");
            summary.terminal_page = Some(page);
            return Ok(summary);
        }

        info!(page, "fetching page");
        let items = api.search_page(&search, page).await?;
        summary.requests += 1;

        if items.is_empty() {
            info!(page, "no more results");
            cache.mark_complete(page)?;
            summary.terminal_page = Some(page);
            return Ok(summary);
        }

        cache.write(page, &items)?;
        summary.fetched += 1;
    }

    if max_pages < MAX_SEARCH_PAGES {
        warn!(max_pages, "stopped at page limit before the end of the results");
        return Ok(summary);
    }

    let terminal = MAX_SEARCH_PAGES + 1;
    warn!(
        limit = MAX_SEARCH_RESULTS,
        "search result ceiling reached, later results are unavailable"
    );
    if completion.as_ref().map(|c| c.terminal_page) != Some(terminal) {
        cache.mark_complete(terminal)?;
    }
    summary.terminal_page = Some(terminal);
    Ok(summary)
}
