//! Flat-file startup store.
//!
//! One JSON array holds every record. Reads are whole-file and forgiving: a
//! missing file or one that is not a JSON array is an empty store, and rows
//! are read as loosely as candidates so one odd row never hides the rest. Every inserting `add` rewrites
//! the whole file, so a write costs O(total records).

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;

use crate::record::{CandidateRecord, StartupRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record store I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode records: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Name-deduplicated collection of startups backed by a JSON file.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    /// Open a store, creating the parent directory and an empty array file
    /// when nothing exists yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        if !store.path.exists() {
            if let Some(parent) = store.path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).map_err(|source| store.io_error(source))?;
            }
            store.save(&[])?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every stored record, in insertion order.
    pub fn load(&self) -> Vec<StartupRecord> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Unreadable record store, treating as empty");
                return Vec::new();
            }
        };
        let rows: Vec<Value> = match serde_json::from_str(&text) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Corrupt record store, treating as empty");
                return Vec::new();
            }
        };
        rows.into_iter()
            .enumerate()
            .filter_map(|(index, row)| {
                let record = serde_json::from_value::<CandidateRecord>(row)
                    .ok()
                    .and_then(|c| c.normalize(""));
                if record.is_none() {
                    tracing::warn!(path = %self.path.display(), index, "Skipping unreadable store row");
                }
                record
            })
            .collect()
    }

    /// Lowercase-trimmed names of every stored record.
    pub fn names(&self) -> HashSet<String> {
        self.load().iter().map(StartupRecord::key).collect()
    }

    /// Insert candidates whose names are new, returning how many were added.
    ///
    /// Names are compared case-insensitively against the store and against
    /// earlier candidates of the same call. The file is untouched when
    /// nothing is inserted.
    pub fn add(&self, candidates: &[CandidateRecord]) -> Result<usize, StoreError> {
        let mut records = self.load();
        let mut seen: HashSet<String> = records.iter().map(StartupRecord::key).collect();
        let now = Utc::now().to_rfc3339();

        let mut added = 0;
        for candidate in candidates {
            let key = candidate.key();
            if key.is_empty() || seen.contains(&key) {
                continue;
            }
            let Some(record) = candidate.normalize(&now) else {
                continue;
            };
            seen.insert(key);
            records.push(record);
            added += 1;
        }

        if added > 0 {
            self.save(&records)?;
            tracing::debug!(path = %self.path.display(), added, total = records.len(), "Record store rewritten");
        }
        Ok(added)
    }

    fn save(&self, records: &[StartupRecord]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(records)?;
        std::fs::write(&self.path, json).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
