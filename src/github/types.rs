use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A search result item the provider returned, or one that was cached.
///
/// Only the fields needed for a summary are typed; everything else the
/// provider sent is carried in `extra` so cached pages keep the raw item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub title: String,
    pub html_url: String,
    pub repository_url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One row of the report: a PR and the repository it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrSummary {
    pub repository: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("response body is not JSON: {0}")]
    InvalidJson(String),

    #[error("response has no `items` array")]
    MissingItems,

    #[error("search item {index} is malformed: {reason}")]
    MalformedItem { index: usize, reason: String },

    #[error("cannot derive repository name from `{0}`")]
    RepositoryUrl(String),
}

impl SearchItem {
    #[cfg(test)]
    pub fn new(title: &str, html_url: &str, repository_url: &str) -> Self {
        Self {
            title: title.to_string(),
            html_url: html_url.to_string(),
            repository_url: repository_url.to_string(),
            extra: Map::new(),
        }
    }
}

impl TryFrom<&SearchItem> for PrSummary {
    type Error = ShapeError;

    fn try_from(item: &SearchItem) -> Result<Self, Self::Error> {
        Ok(PrSummary {
            repository: repository_name(&item.repository_url)?.to_string(),
            title: item.title.clone(),
            url: item.html_url.clone(),
        })
    }
}

/// Last path segment of an API repository URL,
/// e.g. `https://api.github.com/repos/octo-org/octo-repo` → `octo-repo`.
pub fn repository_name(repository_url: &str) -> Result<&str, ShapeError> {
    repository_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .ok_or_else(|| ShapeError::RepositoryUrl(repository_url.to_string()))
}

/// Pull the `items` array out of a search response body and type each item.
pub fn parse_search_items(body: Value) -> Result<Vec<SearchItem>, ShapeError> {
    let items = match body {
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            _ => return Err(ShapeError::MissingItems),
        },
        _ => return Err(ShapeError::MissingItems),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).map_err(|e| ShapeError::MalformedItem {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_repository_name_from_api_url() {
        assert_eq!(
            repository_name("https://api.github.com/repos/octo-org/octo-repo").unwrap(),
            "octo-repo"
        );
        assert_eq!(
            repository_name("https://api.github.com/repos/octo-org/octo-repo/").unwrap(),
            "octo-repo"
        );
    }

    #[test]
    fn test_repository_name_rejects_empty() {
        assert!(repository_name("").is_err());
        assert!(repository_name("https://").is_err());
    }

    #[test]
    fn test_summary_from_item() {
        let item = SearchItem::new(
            "Fix flaky test",
            "https://github.com/octo-org/octo-repo/pull/7",
            "https://api.github.com/repos/octo-org/octo-repo",
        );
        let summary = PrSummary::try_from(&item).unwrap();
        assert_eq!(summary.repository, "octo-repo");
        assert_eq!(summary.title, "Fix flaky test");
        assert_eq!(summary.url, "https://github.com/octo-org/octo-repo/pull/7");
    }

    #[test]
    fn test_parse_items_keeps_extra_fields() {
        let body = json!({
            "total_count": 1,
            "items": [{
                "number": 7,
                "title": "Fix flaky test",
                "html_url": "https://github.com/o/r/pull/7",
                "repository_url": "https://api.github.com/repos/o/r",
                "state": "closed"
            }]
        });
        let items = parse_search_items(body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].extra["number"], json!(7));
        assert_eq!(items[0].extra["state"], json!("closed"));
    }

    #[test]
    fn test_parse_empty_items() {
        let items = parse_search_items(json!({ "items": [] })).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_parse_missing_items() {
        assert_eq!(
            parse_search_items(json!({ "message": "Bad credentials" })).unwrap_err(),
            ShapeError::MissingItems
        );
        assert_eq!(
            parse_search_items(json!({ "items": null })).unwrap_err(),
            ShapeError::MissingItems
        );
        assert_eq!(
            parse_search_items(json!([])).unwrap_err(),
            ShapeError::MissingItems
        );
    }

    #[test]
    fn test_parse_item_missing_field() {
        let body = json!({ "items": [{ "title": "no urls" }] });
        assert!(matches!(
            parse_search_items(body).unwrap_err(),
            ShapeError::MalformedItem { index: 0, .. }
        ));
    }
}
