//! Session façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, network
//! monitor, audio engine, settings, media storage) into the shared core and
//! exposes [`AppSession`], the single handle a client app holds.

pub mod error;
pub mod session;

pub use error::{Result, ServiceError};
pub use session::{AppConfig, AppSession};

use bridge_traits::{
    http::HttpClient,
    network::NetworkMonitor,
    playback::AudioBackend,
    storage::{MediaStore, SettingsStore},
};
use std::sync::Arc;

/// Aggregated handle to all bridge dependencies the core requires.
///
/// Every field is mandatory; a host that cannot supply one of these has no
/// business constructing a session, so there is no partial form.
pub struct AppDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub network_monitor: Arc<dyn NetworkMonitor>,
    pub audio_backend: Arc<dyn AudioBackend>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub media_store: Arc<dyn MediaStore>,
}

impl AppDependencies {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        network_monitor: Arc<dyn NetworkMonitor>,
        audio_backend: Arc<dyn AudioBackend>,
        settings_store: Arc<dyn SettingsStore>,
        media_store: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            http_client,
            network_monitor,
            audio_backend,
            settings_store,
            media_store,
        }
    }
}
