use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::github::MAX_SEARCH_PAGES;
use crate::query::{DateRange, QueryDescriptor, QueryKind};

/// Default config file looked up in the working directory.
const CONFIG_FILE: &str = ".pr-activity.toml";
/// Longest login GitHub accepts.
const MAX_USERNAME_LEN: usize = 39;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("GitHub token not found: set [github].token, GITHUB_TOKEN or GH_TOKEN")]
    MissingToken,

    #[error("GitHub username not found: pass --user_name or set GITHUB_USERNAME")]
    MissingUsername,

    #[error("Invalid GitHub username `{0}`: use letters, digits and hyphens")]
    InvalidUsername(String),

    #[error("Start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

/// Top-level configuration loaded from .pr-activity.toml.
/// All fields are optional, the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN / GH_TOKEN.
    pub token: Option<String>,
    /// Base URL of the REST API.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts for a page after a transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Root directory for cached pages and generated lists.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Hard stop for the page cursor; the search endpoint itself stops
    /// serving after page 10.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    1000
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_max_pages() -> u32 {
    MAX_SEARCH_PAGES
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_pages: default_max_pages(),
        }
    }
}

impl GitHubConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
}

impl Config {
    /// Load configuration from an explicit path, or from .pr-activity.toml
    /// in the current directory. Returns default config if neither exists.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Path::new(CONFIG_FILE);
                if path.exists() {
                    Self::load_from(path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// then GITHUB_TOKEN, then GH_TOKEN.
    pub fn github_token(&self) -> Result<String, ConfigError> {
        self.github_token_with(|key| std::env::var(key).ok())
    }

    fn github_token_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ConfigError> {
        self.github
            .token
            .clone()
            .or_else(|| lookup("GITHUB_TOKEN"))
            .or_else(|| lookup("GH_TOKEN"))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingToken)
    }
}

/// Resolve the target username: the CLI value wins over GITHUB_USERNAME.
/// The name ends up in the search string and in cache paths, so only
/// GitHub login characters are accepted.
pub fn resolve_user(cli_user: Option<String>) -> Result<String, ConfigError> {
    resolve_user_with(cli_user, |key| std::env::var(key).ok())
}

fn resolve_user_with(
    cli_user: Option<String>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let user = cli_user
        .or_else(|| lookup("GITHUB_USERNAME"))
        .map(|user| user.trim().to_string())
        .filter(|user| !user.is_empty())
        .ok_or(ConfigError::MissingUsername)?;

    let valid = user.len() <= MAX_USERNAME_LEN
        && user.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid {
        return Err(ConfigError::InvalidUsername(user));
    }
    Ok(user)
}

/// Fully resolved run settings, built once at startup and passed down.
#[derive(Debug, Clone)]
pub struct Settings {
    pub token: String,
    pub user: String,
    pub range: DateRange,
    pub kinds: Vec<QueryKind>,
    pub data_dir: PathBuf,
    pub max_pages: u32,
    pub refresh: bool,
    pub github: GitHubConfig,
}

impl Settings {
    pub fn query(&self, kind: QueryKind) -> QueryDescriptor {
        QueryDescriptor::new(self.user.clone(), kind, self.range)
    }

    /// Directory holding the cached pages and list for one query:
    /// `<data_dir>/<user>/<start>..<end>/<kind>`.
    pub fn kind_dir(&self, query: &QueryDescriptor) -> PathBuf {
        self.data_dir
            .join(query.user())
            .join(query.range().to_string())
            .join(query.kind().slug())
    }
}
