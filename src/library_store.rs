//! Whole-file JSON persistence for the track library.
//!
//! The library is one JSON array of track records, rewritten in full after
//! every mutation. Saves go through a sibling temp file and an atomic rename
//! so a reader never observes a partially written document.

use std::path::{Path, PathBuf};

use log::warn;
use thiserror::Error;

use crate::protocol::Track;

/// Failure while persisting a library document.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to persist document: {0}")]
    Persist(#[from] std::io::Error),
}

/// Reads and rewrites the persisted track collection.
pub struct LibraryStore {
    path: PathBuf,
}

impl LibraryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted collection.
    ///
    /// An absent document yields an empty library. A malformed document also
    /// yields an empty library, with a warning; the broken file stays on
    /// disk until the next save overwrites it.
    pub fn load(&self) -> Vec<Track> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(
                    "Failed to read library document {}: {}. Starting empty.",
                    self.path.display(),
                    err
                );
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(tracks) => tracks,
            Err(err) => {
                warn!(
                    "Library document {} is malformed: {}. Starting empty.",
                    self.path.display(),
                    err
                );
                Vec::new()
            }
        }
    }

    /// Serializes the whole collection and replaces the document on disk.
    pub fn save(&self, tracks: &[Track]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(tracks)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let staging_path = self.path.with_extension("json.tmp");
        std::fs::write(&staging_path, json)?;
        std::fs::rename(&staging_path, &self.path)?;
        Ok(())
    }
}
