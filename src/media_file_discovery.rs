//! Folder scanning for playable audio files.
//!
//! Walks the registered music folders and produces bare track candidates
//! for the library import merge.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use log::debug;

use crate::protocol::Track;

pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "wav", "ogg", "flac"];

pub fn is_supported_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_AUDIO_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

fn collect_audio_files(folder_path: &Path) -> BTreeSet<PathBuf> {
    let mut pending_directories = vec![folder_path.to_path_buf()];
    let mut files = BTreeSet::new();

    while let Some(directory) = pending_directories.pop() {
        let entries = match std::fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("Scan: failed to read {}: {}", directory.display(), err);
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(
                        "Scan: failed to read an entry in {}: {}",
                        directory.display(),
                        err
                    );
                    continue;
                }
            };

            let path = entry.path();
            match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => pending_directories.push(path),
                Ok(file_type) if file_type.is_file() && is_supported_audio_file(&path) => {
                    files.insert(path);
                }
                Ok(_) => {}
                Err(err) => debug!("Scan: failed to inspect {}: {}", path.display(), err),
            }
        }
    }

    files
}

/// Walks every registered folder and returns candidate tracks in stable
/// path order, one per discovered file.
pub fn discover_track_candidates(folders: &[String]) -> Vec<Track> {
    let mut discovered = BTreeSet::new();
    for folder in folders {
        discovered.extend(collect_audio_files(Path::new(folder)));
    }

    discovered
        .into_iter()
        .map(|path| Track::from_file_path(&path))
        .collect()
}
