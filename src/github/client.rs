use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::types::{parse_search_items, SearchItem, ShapeError};
use super::{FetchError, SearchApi, PER_PAGE};
use crate::config::GitHubConfig;

const GITHUB_API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "pr-activity";
/// Upper bound for a server-requested wait (`retry-after` or quota reset).
const MAX_RETRY_AFTER: Duration = Duration::from_secs(120);
/// Message of the 422 the search endpoint returns past its result ceiling.
const RESULT_CEILING_MESSAGE: &str = "Only the first 1000 search results are available";

/// Authenticated client for the issue/PR search endpoint.
pub struct GitHubClient {
    client: Client,
    token: String,
    search_url: String,
    max_retries: u32,
    retry_base: Duration,
}

impl GitHubClient {
    pub fn new(token: &str, config: &GitHubConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            token: token.to_string(),
            search_url: format!("{}/search/issues", config.api_url.trim_end_matches('/')),
            max_retries: config.max_retries,
            retry_base: config.retry_base(),
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.retry_base.saturating_mul(factor)
    }
}

#[async_trait]
impl SearchApi for GitHubClient {
    #[instrument(skip(self), fields(url = %self.search_url))]
    async fn search_page(&self, query: &str, page: u32) -> Result<Vec<SearchItem>, FetchError> {
        let page_param = page.to_string();
        let per_page_param = PER_PAGE.to_string();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let sent = self
                .client
                .get(&self.search_url)
                .bearer_auth(&self.token)
                .header(ACCEPT, "application/vnd.github+json")
                .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
                .query(&[
                    ("q", query),
                    ("per_page", per_page_param.as_str()),
                    ("page", page_param.as_str()),
                ])
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) if is_transient(&e) && attempt <= self.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "request failed, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            if status.is_success() {
                let text = response.text().await?;
                let body: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|e| ShapeError::InvalidJson(e.to_string()))?;
                let items = parse_search_items(body)?;
                debug!(items = items.len(), attempt, "received search page");
                return Ok(items);
            }

            let rate_limited = is_rate_limited(status, response.headers());
            if (rate_limited || status.is_server_error()) && attempt <= self.max_retries {
                let delay = server_delay(response.headers(), chrono::Utc::now().timestamp())
                    .unwrap_or_else(|| self.backoff(attempt));
                warn!(attempt, %status, delay_ms = delay.as_millis() as u64, "transient response, retrying");
                tokio::time::sleep(delay).await;
                continue;
            }

            if rate_limited {
                return Err(FetchError::RateLimited { attempts: attempt });
            }

            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::UNPROCESSABLE_ENTITY && body.contains(RESULT_CEILING_MESSAGE) {
                warn!(page, "search result ceiling reached, treating page as the end");
                return Ok(Vec::new());
            }
            return Err(FetchError::Status { status, body });
        }
    }
}

fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn quota_exhausted(headers: &HeaderMap) -> bool {
    header_u64(headers, "x-ratelimit-remaining") == Some(0)
}

/// 429, a 403 with an exhausted quota (primary limit), or a 403 carrying
/// `retry-after` (secondary limit).
fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && (quota_exhausted(headers) || headers.contains_key(RETRY_AFTER))
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_u64(headers, RETRY_AFTER.as_str())
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

/// Time until `x-ratelimit-reset` (epoch seconds) when the quota is spent.
fn reset_delay(headers: &HeaderMap, now: i64) -> Option<Duration> {
    if !quota_exhausted(headers) {
        return None;
    }
    let reset = header_u64(headers, "x-ratelimit-reset")?;
    let now = u64::try_from(now).unwrap_or(0);
    // one extra second so the retry lands after the reset, not on it
    let secs = reset.saturating_sub(now) + 1;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

/// Wait the server asked for, if any: `retry-after` first, then the quota reset.
fn server_delay(headers: &HeaderMap, now: i64) -> Option<Duration> {
    retry_after(headers).or_else(|| reset_delay(headers, now))
}
