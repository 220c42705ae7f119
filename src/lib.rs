//! Headless core of a desktop music player.
//!
//! A JSON-backed track library, an iTunes-style metadata lookup with
//! cancel-and-replace enrichment, and a transport-agnostic playback
//! controller, wired as runtime components over one broadcast bus.
//! Presentation toolkits and the platform media engine plug in behind
//! the [`file_dialog::FilePicker`] and [`playback_manager::MediaTransport`]
//! seams; [`app_runtime::AppRuntime`] is the embedding point.

pub mod app_runtime;
pub mod cancellation;
pub mod config;
pub mod enrichment_manager;
pub mod file_dialog;
pub mod library_manager;
pub mod library_store;
pub mod media_file_discovery;
pub mod metadata_client;
pub mod playback_manager;
pub mod protocol;
pub mod settings_store;

pub use app_runtime::{AppRuntime, RuntimePaths};
pub use protocol::{Message, Track};
