mod aggregate;
mod cache;
mod config;
mod error;
mod fetch;
mod github;
mod query;
mod report;

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing::{debug, info, instrument};
use tracing_subscriber::EnvFilter;

use crate::cache::PageCache;
use crate::config::{Config, Settings};
use crate::error::{RunError, StageError};
use crate::github::{GitHubClient, SearchApi};
use crate::query::{DateRange, QueryKind};

/// PR Activity — collects the merged pull requests a GitHub user authored
/// or reviewed over a date range, caches the raw search pages, and prints
/// per-repository counts plus a Markdown list.
#[derive(Parser, Debug)]
#[command(name = "pr-activity", version, about)]
struct Cli {
    /// GitHub username (falls back to GITHUB_USERNAME)
    #[arg(short = 'u', long = "user_name")]
    user_name: Option<String>,

    /// First creation date to include, YYYY-MM-DD
    #[arg(short = 's', long = "start_date")]
    start_date: NaiveDate,

    /// Last creation date to include, YYYY-MM-DD
    #[arg(short = 'e', long = "end_date")]
    end_date: NaiveDate,

    /// Which activity to collect
    #[arg(short, long, value_enum, default_value_t = KindArg::All)]
    kind: KindArg,

    /// Root directory for cached pages and lists (overrides config)
    #[arg(short, long = "data_dir")]
    data_dir: Option<PathBuf>,

    /// Config file path (default: ./.pr-activity.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Drop cached pages for the selected kinds before fetching
    #[arg(long)]
    refresh: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    /// Merged PRs the user authored
    Merged,
    /// Merged PRs the user commented on but did not author
    Reviewed,
    /// Both of the above
    All,
}

impl KindArg {
    fn kinds(self) -> Vec<QueryKind> {
        match self {
            KindArg::Merged => vec![QueryKind::Authored],
            KindArg::Reviewed => vec![QueryKind::Reviewed],
            KindArg::All => QueryKind::ALL.to_vec(),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pr_activity=info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("{} {err}", "error:".red().bold());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), RunError> {
    info!("loading configuration");
    let settings = resolve_settings(cli)?;
    debug!(user = %settings.user, range = %settings.range, kinds = settings.kinds.len(), "resolved settings");

    let client = GitHubClient::new(&settings.token, &settings.github).map_err(RunError::Client)?;

    for &kind in &settings.kinds {
        process_kind(&client, &settings, kind)
            .await
            .map_err(RunError::kind(kind))?;
    }

    info!("done");
    Ok(())
}

/// Turn CLI flags and the config file into one settings value. Every
/// configuration failure surfaces here, before any network call.
fn resolve_settings(cli: Cli) -> Result<Settings, RunError> {
    let config = Config::load(cli.config.as_deref())?;
    let token = config.github_token()?;
    let user = config::resolve_user(cli.user_name)?;
    let range = DateRange::new(cli.start_date, cli.end_date)?;

    Ok(Settings {
        token,
        user,
        range,
        kinds: cli.kind.kinds(),
        data_dir: cli.data_dir.unwrap_or(config.cache.data_dir),
        max_pages: config.cache.max_pages,
        refresh: cli.refresh,
        github: config.github,
    })
}

/// Fetch, aggregate and report one query kind.
#[instrument(skip(api, settings))]
async fn process_kind<A: SearchApi + ?Sized>(
    api: &A,
    settings: &Settings,
    kind: QueryKind,
) -> Result<(), StageError> {
    let query = settings.query(kind);
    let dir = settings.kind_dir(&query);
    let cache = PageCache::new(&dir, kind);
    cache.ensure_dir()?;

    if settings.refresh {
        info!(dir = %dir.display(), "clearing cached pages");
        cache.clear()?;
    }

    let summary = fetch::fetch(api, &query, &cache, settings.max_pages).await?;
    info!(
        fetched = summary.fetched,
        skipped = summary.skipped,
        requests = summary.requests,
        terminal_page = ?summary.terminal_page,
        "pages ready"
    );

    let pages = cache.read_all()?;
    let aggregate = aggregate::aggregate(&pages)?;
    if aggregate.is_empty() {
        info!("no pull requests found");
    } else {
        info!(repositories = aggregate.len(), prs = aggregate.total(), "aggregated");
    }

    let path = dir.join(kind.report_file_name());
    report::write_markdown(&path, &report::render(&aggregate))?;
    info!(path = %path.display(), "wrote PR list");

    report::print_summary(&report::summarize(&aggregate, &settings.user, kind));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{FetchError, SearchItem};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    struct TwoPages {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SearchApi for TwoPages {
        async fn search_page(&self, query: &str, page: u32) -> Result<Vec<SearchItem>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let repo = if query.contains("commenter:") { "reviewed-repo" } else { "own-repo" };
            Ok(match page {
                1 | 2 => vec![SearchItem::new(
                    &format!("PR {page}"),
                    &format!("https://github.com/org/{repo}/pull/{page}"),
                    &format!("https://api.github.com/repos/org/{repo}"),
                )],
                _ => Vec::new(),
            })
        }
    }

    fn settings(data_dir: PathBuf) -> Settings {
        Settings {
            token: "t".to_string(),
            user: "octocat".to_string(),
            range: DateRange::new(
                "2023-07-01".parse().unwrap(),
                "2023-12-31".parse().unwrap(),
            )
            .unwrap(),
            kinds: QueryKind::ALL.to_vec(),
            data_dir,
            max_pages: 10,
            refresh: false,
            github: Default::default(),
        }
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "pr-activity",
            "-u",
            "octocat",
            "-s",
            "2023-07-01",
            "--end_date",
            "2023-12-31",
            "--kind",
            "reviewed",
        ])
        .unwrap();
        assert_eq!(cli.user_name.as_deref(), Some("octocat"));
        assert_eq!(cli.start_date, NaiveDate::from_ymd_opt(2023, 7, 1).unwrap());
        assert_eq!(cli.kind.kinds(), vec![QueryKind::Reviewed]);
        assert!(!cli.refresh);
    }

    #[test]
    fn test_cli_rejects_bad_date() {
        assert!(Cli::try_parse_from(["pr-activity", "-s", "2023/07/01", "-e", "2023-12-31"]).is_err());
    }

    #[test]
    fn test_cli_requires_dates() {
        assert!(Cli::try_parse_from(["pr-activity", "-u", "octocat"]).is_err());
    }

    #[test]
    fn test_default_kind_is_all() {
        let cli = Cli::try_parse_from(["pr-activity", "-s", "2023-07-01", "-e", "2023-12-31"]).unwrap();
        assert_eq!(cli.kind.kinds(), QueryKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_process_kind_writes_pages_and_list() {
        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path().to_path_buf());
        let api = TwoPages { calls: AtomicU32::new(0) };

        process_kind(&api, &settings, QueryKind::Authored).await.unwrap();

        let kind_dir = dir.path().join("octocat/2023-07-01..2023-12-31/merged");
        assert!(kind_dir.join("merged_page_1.json").is_file());
        assert!(kind_dir.join("merged_page_2.json").is_file());
        let list = std::fs::read_to_string(kind_dir.join("merged_pr_list.md")).unwrap();
        assert_eq!(
            list,
            "## own-repo\n- [PR 1](https://github.com/org/own-repo/pull/1)\n\
             - [PR 2](https://github.com/org/own-repo/pull/2)\n"
        );
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);

        process_kind(&api, &settings, QueryKind::Authored).await.unwrap();
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_refresh_refetches_cached_pages() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(dir.path().to_path_buf());
        let api = TwoPages { calls: AtomicU32::new(0) };
        process_kind(&api, &settings, QueryKind::Authored).await.unwrap();
        process_kind(&api, &settings, QueryKind::Reviewed).await.unwrap();
        assert_eq!(api.calls.load(Ordering::SeqCst), 6);

        // A page the provider no longer serves must not survive a refresh.
        let kind_dir = dir.path().join("octocat/2023-07-01..2023-12-31/merged");
        std::fs::write(
            kind_dir.join("merged_page_3.json"),
            r#"[{"title": "stale", "html_url": "https://github.com/org/old/pull/9",
                "repository_url": "https://api.github.com/repos/org/old"}]"#,
        )
        .unwrap();

        settings.refresh = true;
        process_kind(&api, &settings, QueryKind::Authored).await.unwrap();

        assert_eq!(api.calls.load(Ordering::SeqCst), 9);
        assert!(kind_dir.join("merged_page_1.json").is_file());
        assert!(kind_dir.join("merged_page_2.json").is_file());
        assert!(!kind_dir.join("merged_page_3.json").exists());
        let list = std::fs::read_to_string(kind_dir.join("merged_pr_list.md")).unwrap();
        assert!(!list.contains("stale"));
        assert!(list.contains("## own-repo"));

        let cache = PageCache::new(&kind_dir, QueryKind::Authored);
        assert_eq!(cache.completion().unwrap().unwrap().terminal_page, 3);
        let reviewed = dir.path().join("octocat/2023-07-01..2023-12-31/reviewed");
        assert!(reviewed.join("reviewed_page_2.json").is_file());
    }

    #[tokio::test]
    async fn test_process_kind_with_no_results_writes_empty_list() {
        struct Nothing;

        #[async_trait]
        impl SearchApi for Nothing {
            async fn search_page(&self, _: &str, _: u32) -> Result<Vec<SearchItem>, FetchError> {
                Ok(Vec::new())
            }
        }

        let dir = TempDir::new().unwrap();
        let settings = settings(dir.path().to_path_buf());
        process_kind(&Nothing, &settings, QueryKind::Reviewed).await.unwrap();

        let list = dir
            .path()
            .join("octocat/2023-07-01..2023-12-31/reviewed/reviewed_pr_list.md");
        assert_eq!(std::fs::read_to_string(list).unwrap(), "");
    }
}
