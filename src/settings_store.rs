//! Whole-file JSON persistence for the scanned-folder settings document.

use std::path::{Path, PathBuf};

use log::warn;

use crate::library_store::StoreError;

/// Persisted application settings: the folders registered for scanning.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub music_folders: Vec<String>,
}

/// Reads and rewrites the settings document, one JSON object per file.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absent or malformed documents yield default settings.
    pub fn load(&self) -> Settings {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Settings::default(),
            Err(err) => {
                warn!(
                    "Failed to read settings document {}: {}. Using defaults.",
                    self.path.display(),
                    err
                );
                return Settings::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(
                    "Settings document {} is malformed: {}. Using defaults.",
                    self.path.display(),
                    err
                );
                Settings::default()
            }
        }
    }

    /// Overwrites the document wholesale via a temp file and rename.
    pub fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(settings)?;
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
