//! Application runtime bootstrap and top-level orchestration.
//!
//! Loads configuration and the persisted documents, creates the control
//! bus, and spawns one thread per runtime component. A presentation
//! adapter talks to the running core exclusively through the bus handle
//! this module returns.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::info;
use tokio::sync::broadcast;

use crate::config::{self, Config};
use crate::enrichment_manager::EnrichmentManager;
use crate::library_manager::LibraryManager;
use crate::library_store::LibraryStore;
use crate::metadata_client::{SearchClient, TrackLookup};
use crate::playback_manager::{MediaTransport, PlaybackManager};
use crate::protocol::Message;
use crate::settings_store::SettingsStore;

const BUS_CAPACITY: usize = 1024;

/// On-disk locations for configuration and the persisted documents.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    pub config_file: PathBuf,
    pub library_file: PathBuf,
    pub settings_file: PathBuf,
}

impl RuntimePaths {
    /// Resolves the per-user default locations.
    pub fn default_locations() -> Result<Self, Box<dyn std::error::Error>> {
        let config_root = dirs::config_dir()
            .ok_or("Could not determine config directory")?
            .join("tunedeck");
        let data_root = dirs::data_dir()
            .ok_or("Could not determine data directory")?
            .join("tunedeck");
        std::fs::create_dir_all(&config_root)?;
        std::fs::create_dir_all(&data_root)?;

        Ok(Self {
            config_file: config_root.join("config.toml"),
            library_file: data_root.join("library.json"),
            settings_file: data_root.join("settings.json"),
        })
    }
}

/// Handle to the running core held by the presentation adapter.
pub struct AppRuntime {
    bus_sender: broadcast::Sender<Message>,
    config: Config,
}

impl AppRuntime {
    /// Boots the core at the default per-user locations.
    pub fn launch(
        transport: Box<dyn MediaTransport>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let paths = RuntimePaths::default_locations()?;
        Ok(Self::launch_at(paths, transport))
    }

    /// Boots the core against explicit paths; tests point this at
    /// throwaway directories.
    pub fn launch_at(paths: RuntimePaths, transport: Box<dyn MediaTransport>) -> Self {
        let config = config::load_or_create(&paths.config_file);
        let client: Arc<dyn TrackLookup> = Arc::new(SearchClient::new(&config.network));
        Self::launch_with(paths, transport, client, config)
    }

    /// Full wiring entry point with an explicit lookup source.
    pub fn launch_with(
        paths: RuntimePaths,
        transport: Box<dyn MediaTransport>,
        client: Arc<dyn TrackLookup>,
        config: Config,
    ) -> Self {
        let (bus_sender, _) = broadcast::channel(BUS_CAPACITY);

        let library_receiver = bus_sender.subscribe();
        let library_sender = bus_sender.clone();
        let library_store = LibraryStore::new(&paths.library_file);
        let settings_store = SettingsStore::new(&paths.settings_file);
        thread::spawn(move || {
            let mut manager = LibraryManager::new(
                library_receiver,
                library_sender,
                library_store,
                settings_store,
            );
            manager.run();
        });

        let enrichment_receiver = bus_sender.subscribe();
        let enrichment_sender = bus_sender.clone();
        thread::spawn(move || {
            let mut manager =
                EnrichmentManager::new(enrichment_receiver, enrichment_sender, client);
            manager.run();
        });

        let playback_receiver = bus_sender.subscribe();
        let playback_sender = bus_sender.clone();
        let poll_interval = Duration::from_millis(config.playback.progress_poll_interval_ms);
        thread::spawn(move || {
            let mut manager = PlaybackManager::new(
                playback_receiver,
                playback_sender,
                transport,
                poll_interval,
            );
            manager.run();
        });

        info!("Runtime components started");
        Self { bus_sender, config }
    }

    /// Command side of the adapter boundary.
    pub fn sender(&self) -> broadcast::Sender<Message> {
        self.bus_sender.clone()
    }

    /// Notification side of the adapter boundary.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.bus_sender.subscribe()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Installs the default terminal logger; call once from the embedding
/// binary before launching the runtime.
pub fn init_logging() {
    let mut builder = colog::default_builder();
    builder.filter(None, log::LevelFilter::Debug);
    builder.init();
}
