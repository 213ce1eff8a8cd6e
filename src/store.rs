//! Filesystem persistence for generated summaries.
//!
//! `SummaryStore` is the one capability exposed to the agent loop. It is a
//! trait so the orchestrator can be tested against an in-memory fake.

use crate::schema::SummaryFileInfo;
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to write summary file: {0}")]
    WriteError(#[from] std::io::Error),
    #[error("summaries directory is not readable: {0}")]
    ListError(std::io::Error),
}

/// Capability for saving and listing summaries.
///
/// Injected into the agent orchestrator rather than imported globally, so the
/// summarisation pipeline is deterministic under test.
pub trait SummaryStore: Send + Sync {
    /// Persist `text` under a timestamped filename derived from `title`,
    /// returning the path written.
    fn save(&self, text: &str, title: &str) -> Result<PathBuf, StoreError>;

    /// List persisted summaries, newest first.
    fn list(&self) -> Result<Vec<SummaryFileInfo>, StoreError>;
}

/// Stores summaries as plain UTF-8 text files in a single directory.
///
/// Files are named `<title>_<YYYYMMDD_HHMMSS>.txt`. There is no atomic-write
/// or fsync guarantee; a crash mid-write can leave a partial file.
pub struct FsSummaryStore {
    dir: PathBuf,
}

impl FsSummaryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reduce a title to a safe filename stem
    fn sanitize_title(title: &str) -> String {
        let stem: String = title
            .trim()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .take(60)
            .collect();
        if stem.is_empty() {
            "summary".to_string()
        } else {
            stem
        }
    }

    /// Pick a path that does not exist yet, suffixing a counter when two
    /// saves share a title within the same second.
    fn unique_path(&self, stem: &str, timestamp: &str) -> PathBuf {
        let candidate = self.dir.join(format!("{}_{}.txt", stem, timestamp));
        if !candidate.exists() {
            return candidate;
        }
        let mut counter = 1u32;
        loop {
            let candidate = self
                .dir
                .join(format!("{}_{}_{}.txt", stem, timestamp, counter));
            if !candidate.exists() {
                return candidate;
            }
            counter += 1;
        }
    }
}

impl SummaryStore for FsSummaryStore {
    fn save(&self, text: &str, title: &str) -> Result<PathBuf, StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let stem = Self::sanitize_title(title);
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let path = self.unique_path(&stem, &timestamp);
        std::fs::write(&path, text.trim())?;
        Ok(path)
    }

    fn list(&self) -> Result<Vec<SummaryFileInfo>, StoreError> {
        // A missing directory just means nothing has been saved yet
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut results = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(StoreError::ListError)? {
            let entry = entry.map_err(StoreError::ListError)?;
            let filename = entry.file_name().to_string_lossy().to_string();
            if !filename.ends_with(".txt") {
                continue;
            }
            let metadata = entry.metadata().map_err(StoreError::ListError)?;
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .map_err(StoreError::ListError)?;
            results.push(SummaryFileInfo {
                filename,
                created_at: DateTime::<Utc>::from(created),
                size: metadata.len(),
            });
        }
        // Newest first
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(results)
    }
}
