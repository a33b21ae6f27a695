use chrono::NaiveDate;
use std::fmt;

use crate::config::ConfigError;

/// Which role of the user a search targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Merged PRs the user authored.
    Authored,
    /// Merged PRs the user commented on without authoring them.
    Reviewed,
}

impl QueryKind {
    pub const ALL: [QueryKind; 2] = [QueryKind::Authored, QueryKind::Reviewed];

    /// Prefix used for the cache directory and page file names.
    pub fn slug(self) -> &'static str {
        match self {
            QueryKind::Authored => "merged",
            QueryKind::Reviewed => "reviewed",
        }
    }

    /// File name of the generated Markdown list.
    pub fn report_file_name(self) -> &'static str {
        match self {
            QueryKind::Authored => "merged_pr_list.md",
            QueryKind::Reviewed => "reviewed_pr_list.md",
        }
    }

    /// Label used on the summary total line.
    pub fn total_label(self) -> &'static str {
        match self {
            QueryKind::Authored => "Merged PRs",
            QueryKind::Reviewed => "PR Reviews",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Inclusive creation-date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Everything needed to build one search query. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    user: String,
    kind: QueryKind,
    range: DateRange,
}

impl QueryDescriptor {
    pub fn new(user: impl Into<String>, kind: QueryKind, range: DateRange) -> Self {
        Self {
            user: user.into(),
            kind,
            range,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Compose the provider search string for this descriptor.
    pub fn search_query(&self) -> String {
        let user = &self.user;
        let range = self.range;
        match self.kind {
            QueryKind::Authored => {
                format!("is:pr author:{user} is:merged created:{range}")
            }
            QueryKind::Reviewed => {
                format!("is:pr is:merged commenter:{user} -author:{user} created:{range}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn range() -> DateRange {
        DateRange::new(date("2023-07-01"), date("2023-12-31")).unwrap()
    }

    #[test]
    fn test_authored_query_string() {
        let query = QueryDescriptor::new("octocat", QueryKind::Authored, range());
        assert_eq!(
            query.search_query(),
            "is:pr author:octocat is:merged created:2023-07-01..2023-12-31"
        );
    }

    #[test]
    fn test_reviewed_query_excludes_own_prs() {
        let query = QueryDescriptor::new("octocat", QueryKind::Reviewed, range());
        assert_eq!(
            query.search_query(),
            "is:pr is:merged commenter:octocat -author:octocat created:2023-07-01..2023-12-31"
        );
    }

    #[test]
    fn test_single_day_range_is_valid() {
        let day = date("2024-02-29");
        let range = DateRange::new(day, day).unwrap();
        assert_eq!(range.to_string(), "2024-02-29..2024-02-29");
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        let err = DateRange::new(date("2024-01-02"), date("2024-01-01")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDateRange { .. }));
    }

    #[test]
    fn test_kind_file_names() {
        assert_eq!(QueryKind::Authored.report_file_name(), "merged_pr_list.md");
        assert_eq!(QueryKind::Reviewed.report_file_name(), "reviewed_pr_list.md");
        assert_eq!(QueryKind::Authored.total_label(), "Merged PRs");
        assert_eq!(QueryKind::Reviewed.total_label(), "PR Reviews");
    }
}
