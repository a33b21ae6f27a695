use colored::Colorize;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::aggregate::Aggregate;
use crate::query::QueryKind;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file {path}: {source}")]
    FileWrite {
        path: String,
        source: std::io::Error,
    },
}

/// Render the aggregate as Markdown: one `## <repo>` heading per repository
/// followed by a `- [title](url)` bullet per PR.
pub fn render(aggregate: &Aggregate) -> String {
    let mut md = String::new();
    for repo in aggregate.repositories() {
        md.push_str(&format!("## {}\n", repo.name));
        for pr in &repo.prs {
            md.push_str(&format!("- [{}]({})\n", pr.title, pr.url));
        }
    }
    md
}

/// One `<repo> <count>` line per repository, then the total line.
pub fn summarize(aggregate: &Aggregate, user: &str, kind: QueryKind) -> Vec<String> {
    let mut lines: Vec<String> = aggregate
        .repositories()
        .iter()
        .map(|repo| format!("{} {}", repo.name, repo.count()))
        .collect();
    lines.push(format!(
        "{} Total {}: {}",
        user,
        kind.total_label(),
        aggregate.total()
    ));
    lines
}

#[instrument(skip(markdown), fields(bytes = markdown.len()))]
pub fn write_markdown(path: &Path, markdown: &str) -> Result<(), ReportError> {
    fs::write(path, markdown).map_err(|source| ReportError::FileWrite {
        path: path.display().to_string(),
        source,
    })?;
    debug!("wrote markdown list");
    Ok(())
}

/// Print summary lines to stdout, highlighting the total.
pub fn print_summary(lines: &[String]) {
    let Some((total, repos)) = lines.split_last() else {
        return;
    };
    for line in repos {
        println!("{line}");
    }
    println!("{}", total.bold());
}
