//! Event-bus protocol shared by all runtime components.
//!
//! This module defines all message payloads exchanged between library,
//! enrichment, and playback handlers, plus the persisted track record.

use std::path::Path;

use crate::metadata_client::LookupError;

/// One library entry, persisted as a camelCase JSON object.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Display title; defaults to the file stem when the track is added.
    pub title: String,
    /// Path to the playable audio file; unique import key.
    pub file_path: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    /// Local image paths, insertion order preserved for display.
    #[serde(default)]
    pub local_images: Vec<String>,
}

impl Track {
    /// Builds a bare track for a newly added file.
    pub fn from_file_path(path: &Path) -> Self {
        let title = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(|stem| stem.to_string())
            .filter(|stem| !stem.trim().is_empty())
            .unwrap_or_else(|| "Unknown Title".to_string());

        Self {
            title,
            file_path: path.to_string_lossy().to_string(),
            artist: None,
            album: None,
            artwork_url: None,
            local_images: Vec::new(),
        }
    }

    /// True once lookup fields were populated; enriched tracks are never
    /// looked up again.
    pub fn has_artist(&self) -> bool {
        self.artist
            .as_deref()
            .is_some_and(|artist| !artist.trim().is_empty())
    }
}

/// Single lookup result consumed from the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub track_name: String,
    pub artist_name: String,
    pub album_name: String,
    pub artwork_url: Option<String>,
}

/// User-visible outcome of one enrichment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentStatus {
    /// A lookup is in flight for the activated track.
    Searching,
    /// Metadata is available; `cached` distinguishes stored fields from a
    /// fresh lookup result.
    Ready { cached: bool },
    /// The lookup completed without a result; fields stay blank.
    NoInfoFound,
    /// The lookup failed; nothing was persisted.
    LookupFailed,
}

/// Transport-level playback state reported to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Library(LibraryMessage),
    Enrichment(EnrichmentMessage),
    Playback(PlaybackMessage),
}

/// Library-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum LibraryMessage {
    /// Add one picked file to the library.
    AddTrack(std::path::PathBuf),
    RemoveTrack {
        file_path: String,
    },
    /// Explicit edit of the user-editable fields.
    EditTrack {
        file_path: String,
        title: String,
        local_images: Vec<String>,
    },
    /// Merge a batch of discovered candidates, skipping known file paths.
    ImportScanned(Vec<Track>),
    AddMusicFolder(String),
    RemoveMusicFolder(String),
    /// Walk all registered folders and import what they contain.
    RequestScan,
    /// User selected a track for playback.
    ActivateTrack {
        file_path: String,
    },
    /// Persist lookup fields on a track that does not have them yet.
    ApplyEnrichment {
        file_path: String,
        metadata: TrackMetadata,
    },
    LibraryRestored(Vec<Track>),
    FoldersRestored(Vec<String>),
    FoldersChanged(Vec<String>),
    TrackAdded(Track),
    TrackRemoved {
        file_path: String,
    },
    TrackUpdated(Track),
    ImportCompleted {
        added: usize,
        skipped: usize,
    },
    ScanStarted,
    ScanCompleted {
        discovered: usize,
        added: usize,
    },
}

/// Enrichment-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum EnrichmentMessage {
    /// A track was activated; decide between cached fields and a lookup.
    TrackActivated(Track),
    /// Worker result posted back to the manager thread. Results carrying a
    /// stale generation belong to a superseded attempt and are discarded.
    LookupFinished {
        generation: u64,
        file_path: String,
        outcome: Result<Option<TrackMetadata>, LookupError>,
    },
    StatusChanged {
        file_path: String,
        status: EnrichmentStatus,
    },
}

/// Playback-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum PlaybackMessage {
    /// Open a file on the transport and start playing it.
    OpenAndPlay(String),
    Play,
    Pause,
    Stop,
    SeekTo(u64),
    SetVolume(f32),
    /// User grabbed the progress slider; position display is frozen until
    /// the matching `EndSeekDrag`.
    BeginSeekDrag,
    EndSeekDrag(u64),
    /// Periodic position poll; emitted by the ticker while playing.
    PollTick,
    PlaybackProgress {
        elapsed_ms: u64,
        total_ms: u64,
    },
    StateChanged(PlaybackState),
    TrackFinished,
}
