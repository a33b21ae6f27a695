use std::collections::HashMap;

use crate::github::{PrSummary, SearchItem, ShapeError};

/// PRs of one repository, in the order they were seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoActivity {
    pub name: String,
    pub prs: Vec<PrSummary>,
}

impl RepoActivity {
    pub fn count(&self) -> usize {
        self.prs.len()
    }
}

/// Per-repository rollup of PR summaries.
///
/// Repositories keep first-seen order. Duplicates are not collapsed: a PR
/// that appears on two pages is counted twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    repos: Vec<RepoActivity>,
    index: HashMap<String, usize>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pr: PrSummary) {
        match self.index.get(&pr.repository) {
            Some(&slot) => self.repos[slot].prs.push(pr),
            None => {
                self.index.insert(pr.repository.clone(), self.repos.len());
                self.repos.push(RepoActivity {
                    name: pr.repository.clone(),
                    prs: vec![pr],
                });
            }
        }
    }

    pub fn repositories(&self) -> &[RepoActivity] {
        &self.repos
    }

    #[cfg(test)]
    pub fn get(&self, repository: &str) -> Option<&RepoActivity> {
        self.index.get(repository).map(|&slot| &self.repos[slot])
    }

    /// Number of PRs across all repositories.
    pub fn total(&self) -> usize {
        self.repos.iter().map(RepoActivity::count).sum()
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }
}

impl FromIterator<PrSummary> for Aggregate {
    fn from_iter<I: IntoIterator<Item = PrSummary>>(iter: I) -> Self {
        let mut aggregate = Aggregate::new();
        for pr in iter {
            aggregate.push(pr);
        }
        aggregate
    }
}

/// Fold cached pages, in the order given, into an [`Aggregate`].
pub fn aggregate(pages: &[Vec<SearchItem>]) -> Result<Aggregate, ShapeError> {
    pages
        .iter()
        .flatten()
        .map(PrSummary::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map(Aggregate::from_iter)
}
