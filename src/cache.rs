use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::github::SearchItem;
use crate::query::QueryKind;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read cache file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Corrupt cache file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize cache file {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Written once the provider has returned the empty page that ends a
/// result set, so later runs can stop without asking again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub terminal_page: u32,
    pub completed_at: DateTime<Utc>,
}

/// Flat-file cache of raw search pages for one query kind.
///
/// Page `n` lives in `<dir>/<kind>_page_<n>.json`. A page file is written
/// once and never rewritten; there is no eviction and no locking.
#[derive(Debug, Clone)]
pub struct PageCache {
    dir: PathBuf,
    kind: QueryKind,
}

impl PageCache {
    pub fn new(dir: impl Into<PathBuf>, kind: QueryKind) -> Self {
        Self {
            dir: dir.into(),
            kind,
        }
    }

    pub fn page_path(&self, page: u32) -> PathBuf {
        self.dir.join(format!("{}_page_{page}.json", self.kind.slug()))
    }

    fn completion_path(&self) -> PathBuf {
        self.dir.join(format!("{}_complete.json", self.kind.slug()))
    }

    pub fn ensure_dir(&self) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Write {
            path: self.dir.clone(),
            source,
        })
    }

    pub fn exists(&self, page: u32) -> bool {
        self.page_path(page).is_file()
    }

    #[instrument(skip(self, items), fields(kind = %self.kind, items = items.len()))]
    pub fn write(&self, page: u32, items: &[SearchItem]) -> Result<PathBuf, CacheError> {
        let path = self.page_path(page);
        let contents = to_json(&path, items)?;
        self.write_atomic(&path, &contents)?;
        debug!(path = %path.display(), "cached page");
        Ok(path)
    }

    pub fn read(&self, page: u32) -> Result<Vec<SearchItem>, CacheError> {
        read_json(&self.page_path(page))
    }

    /// Cached page numbers for this kind, in numeric order.
    pub fn pages(&self) -> Result<Vec<u32>, CacheError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CacheError::Read {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let prefix = format!("{}_page_", self.kind.slug());
        let mut pages = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CacheError::Read {
                path: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(page) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|n| n.parse::<u32>().ok())
            {
                pages.push(page);
            }
        }
        pages.sort_unstable();
        Ok(pages)
    }

    /// Every cached page, in page order.
    pub fn read_all(&self) -> Result<Vec<Vec<SearchItem>>, CacheError> {
        self.pages()?.into_iter().map(|page| self.read(page)).collect()
    }

    pub fn mark_complete(&self, terminal_page: u32) -> Result<(), CacheError> {
        let completion = Completion {
            terminal_page,
            completed_at: Utc::now(),
        };
        let path = self.completion_path();
        let contents = to_json(&path, &completion)?;
        self.write_atomic(&path, &contents)
    }

    pub fn completion(&self) -> Result<Option<Completion>, CacheError> {
        let path = self.completion_path();
        if !path.is_file() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    /// Remove every cached page and the completion marker for this kind.
    pub fn clear(&self) -> Result<(), CacheError> {
        let mut paths: Vec<PathBuf> = self
            .pages()?
            .into_iter()
            .map(|page| self.page_path(page))
            .collect();
        paths.push(self.completion_path());

        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed cache file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(CacheError::Write { path, source }),
            }
        }
        Ok(())
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> Result<(), CacheError> {
        let write_err = |source| CacheError::Write {
            path: path.to_path_buf(),
            source,
        };
        self.ensure_dir()?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(write_err)
    }
}

fn to_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<String, CacheError> {
    serde_json::to_string_pretty(value).map_err(|source| CacheError::Serialize {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, CacheError> {
    let contents = fs::read_to_string(path).map_err(|source| CacheError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| CacheError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}
