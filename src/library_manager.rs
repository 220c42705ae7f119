//! Library runtime component.
//!
//! This manager owns the in-memory track collection and both persisted
//! documents, applies every mutation, and rewrites the documents in full
//! after each one.

use std::collections::HashSet;
use std::path::Path;

use log::{debug, info, warn};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::library_store::LibraryStore;
use crate::media_file_discovery;
use crate::protocol::{
    EnrichmentMessage, LibraryMessage, Message, PlaybackMessage, Track, TrackMetadata,
};
use crate::settings_store::SettingsStore;

/// Coordinates library mutations, folder imports, and track activation.
pub struct LibraryManager {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    library_store: LibraryStore,
    settings_store: SettingsStore,
    tracks: Vec<Track>,
    music_folders: Vec<String>,
}

impl LibraryManager {
    /// Creates a library manager bound to bus channels and both stores.
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        library_store: LibraryStore,
        settings_store: SettingsStore,
    ) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            library_store,
            settings_store,
            tracks: Vec::new(),
            music_folders: Vec::new(),
        }
    }

    fn publish(&self, message: LibraryMessage) {
        let _ = self.bus_producer.send(Message::Library(message));
    }

    fn persist_library(&self) {
        if let Err(err) = self.library_store.save(&self.tracks) {
            warn!(
                "Failed to persist library to {}: {}",
                self.library_store.path().display(),
                err
            );
        }
    }

    fn persist_settings(&self) {
        let settings = crate::settings_store::Settings {
            music_folders: self.music_folders.clone(),
        };
        if let Err(err) = self.settings_store.save(&settings) {
            warn!(
                "Failed to persist settings to {}: {}",
                self.settings_store.path().display(),
                err
            );
        }
    }

    fn restore(&mut self) {
        self.tracks = self.library_store.load();
        self.music_folders = self.settings_store.load().music_folders;
        info!(
            "Library restored: {} track(s), {} folder(s)",
            self.tracks.len(),
            self.music_folders.len()
        );
        self.publish(LibraryMessage::LibraryRestored(self.tracks.clone()));
        self.publish(LibraryMessage::FoldersRestored(self.music_folders.clone()));
    }

    fn contains_file_path(&self, file_path: &str) -> bool {
        self.tracks.iter().any(|track| track.file_path == file_path)
    }

    fn add_track(&mut self, path: &Path) {
        let track = Track::from_file_path(path);
        if self.contains_file_path(&track.file_path) {
            debug!("Track already in library, skipping: {}", track.file_path);
            return;
        }
        self.tracks.push(track.clone());
        self.persist_library();
        self.publish(LibraryMessage::TrackAdded(track));
    }

    fn remove_track(&mut self, file_path: &str) {
        let before = self.tracks.len();
        self.tracks.retain(|track| track.file_path != file_path);
        if self.tracks.len() == before {
            debug!("Remove requested for unknown track: {}", file_path);
            return;
        }
        self.persist_library();
        self.publish(LibraryMessage::TrackRemoved {
            file_path: file_path.to_string(),
        });
    }

    fn edit_track(&mut self, file_path: &str, title: String, local_images: Vec<String>) {
        let Some(track) = self
            .tracks
            .iter_mut()
            .find(|track| track.file_path == file_path)
        else {
            warn!("Edit requested for unknown track: {}", file_path);
            return;
        };
        track.title = title;
        track.local_images = local_images;
        let updated = track.clone();
        self.persist_library();
        self.publish(LibraryMessage::TrackUpdated(updated));
    }

    /// Appends only candidates whose file path is not yet known; one save
    /// covers the whole batch.
    fn import_scanned(&mut self, candidates: Vec<Track>) -> (usize, usize) {
        let mut known: HashSet<String> = self
            .tracks
            .iter()
            .map(|track| track.file_path.clone())
            .collect();

        let mut added = 0;
        let mut skipped = 0;
        for candidate in candidates {
            if known.contains(&candidate.file_path) {
                skipped += 1;
                continue;
            }
            known.insert(candidate.file_path.clone());
            self.tracks.push(candidate);
            added += 1;
        }

        if added > 0 {
            self.persist_library();
        }
        self.publish(LibraryMessage::ImportCompleted { added, skipped });
        (added, skipped)
    }

    fn scan_folders(&mut self) {
        self.publish(LibraryMessage::ScanStarted);
        let candidates = media_file_discovery::discover_track_candidates(&self.music_folders);
        let discovered = candidates.len();
        let (added, _) = self.import_scanned(candidates);
        info!("Folder scan finished: {} discovered, {} added", discovered, added);
        self.publish(LibraryMessage::ScanCompleted { discovered, added });
    }

    fn add_music_folder(&mut self, folder: String) {
        if self.music_folders.contains(&folder) {
            debug!("Folder already registered: {}", folder);
            return;
        }
        self.music_folders.push(folder);
        self.persist_settings();
        self.publish(LibraryMessage::FoldersChanged(self.music_folders.clone()));
    }

    fn remove_music_folder(&mut self, folder: &str) {
        let before = self.music_folders.len();
        self.music_folders.retain(|known| known != folder);
        if self.music_folders.len() == before {
            return;
        }
        self.persist_settings();
        self.publish(LibraryMessage::FoldersChanged(self.music_folders.clone()));
    }

    /// Hands the activated track to playback and to the enrichment workflow.
    fn activate_track(&self, file_path: &str) {
        let Some(track) = self
            .tracks
            .iter()
            .find(|track| track.file_path == file_path)
        else {
            warn!("Activation requested for unknown track: {}", file_path);
            return;
        };
        let _ = self
            .bus_producer
            .send(Message::Playback(PlaybackMessage::OpenAndPlay(
                track.file_path.clone(),
            )));
        let _ = self
            .bus_producer
            .send(Message::Enrichment(EnrichmentMessage::TrackActivated(
                track.clone(),
            )));
    }

    /// Populates the lookup fields once, then persists. A track that already
    /// has an artist keeps its stored fields untouched.
    fn apply_enrichment(&mut self, file_path: &str, metadata: TrackMetadata) {
        let Some(track) = self
            .tracks
            .iter_mut()
            .find(|track| track.file_path == file_path)
        else {
            warn!("Enrichment arrived for unknown track: {}", file_path);
            return;
        };
        if track.has_artist() {
            debug!(
                "Track already has lookup fields, leaving untouched: {}",
                file_path
            );
            return;
        }

        track.artist = non_blank(metadata.artist_name);
        track.album = non_blank(metadata.album_name);
        track.artwork_url = metadata.artwork_url.and_then(non_blank);
        let updated = track.clone();
        self.persist_library();
        self.publish(LibraryMessage::TrackUpdated(updated));
    }

    pub fn run(&mut self) {
        self.restore();
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => match message {
                    Message::Library(LibraryMessage::AddTrack(path)) => {
                        self.add_track(&path);
                    }
                    Message::Library(LibraryMessage::RemoveTrack { file_path }) => {
                        self.remove_track(&file_path);
                    }
                    Message::Library(LibraryMessage::EditTrack {
                        file_path,
                        title,
                        local_images,
                    }) => {
                        self.edit_track(&file_path, title, local_images);
                    }
                    Message::Library(LibraryMessage::ImportScanned(candidates)) => {
                        self.import_scanned(candidates);
                    }
                    Message::Library(LibraryMessage::AddMusicFolder(folder)) => {
                        self.add_music_folder(folder);
                    }
                    Message::Library(LibraryMessage::RemoveMusicFolder(folder)) => {
                        self.remove_music_folder(&folder);
                    }
                    Message::Library(LibraryMessage::RequestScan) => {
                        self.scan_folders();
                    }
                    Message::Library(LibraryMessage::ActivateTrack { file_path }) => {
                        self.activate_track(&file_path);
                    }
                    Message::Library(LibraryMessage::ApplyEnrichment {
                        file_path,
                        metadata,
                    }) => {
                        self.apply_enrichment(&file_path, metadata);
                    }
                    _ => {}
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        "LibraryManager lagged on control bus, skipped {} message(s)",
                        skipped
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
