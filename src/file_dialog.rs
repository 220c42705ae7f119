//! Native file-picker seam used by presentation adapters.

use std::path::PathBuf;

use log::debug;
use tokio::sync::broadcast::Sender;

use crate::protocol::{LibraryMessage, Message};

pub const AUDIO_FILTER_EXTENSIONS: [&str; 4] = ["mp3", "wav", "ogg", "flac"];
pub const IMAGE_FILTER_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Interface for prompting the user to choose a file; `None` means the
/// dialog was cancelled.
pub trait FilePicker {
    fn pick_audio_file(&self) -> Option<PathBuf>;
    fn pick_image_file(&self) -> Option<PathBuf>;
}

/// `rfd`-backed picker used by desktop adapters.
#[derive(Debug, Default)]
pub struct NativeFilePicker;

impl FilePicker for NativeFilePicker {
    fn pick_audio_file(&self) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .add_filter("Audio Files", &AUDIO_FILTER_EXTENSIONS)
            .pick_file()
    }

    fn pick_image_file(&self) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .add_filter("Images", &IMAGE_FILTER_EXTENSIONS)
            .pick_file()
    }
}

/// Prompts for an audio file and forwards the choice to the library.
/// Returns false when the dialog was cancelled.
pub fn add_track_via_picker(picker: &dyn FilePicker, bus_sender: &Sender<Message>) -> bool {
    let Some(path) = picker.pick_audio_file() else {
        debug!("Add-track dialog cancelled");
        return false;
    };
    let _ = bus_sender.send(Message::Library(LibraryMessage::AddTrack(path)));
    true
}
