//! # App Session
//!
//! The composition root for a running client: wires bridges into the core
//! managers, owns the connectivity watcher task, and exposes the single
//! action surface the UI talks to. All app state mutates through methods
//! here (or through the managers this hands out); reads come back as owned
//! snapshots.
//!
//! Startup is deliberately tolerant: a device that has never been online
//! still gets a working offline session over its cached snapshot, and every
//! remote-facing startup duty degrades to a log line instead of an error.

use bridge_traits::network::NetworkMonitor;
use chrono::Utc;
use core_catalog::models::{
    DownloadRecord, FavoriteEntry, Mood, Playlist, PlaylistId, Track, TrackId, UserProfile,
};
use core_catalog::store::LocalStore;
use core_download::manager::DownloadManager;
use core_playback::controller::PlayerController;
use core_runtime::events::{ConnectivityEvent, CoreEvent, EventBus, LibraryEvent, SyncTrigger};
use core_sync::api::ApiClient;
use core_sync::coordinator::{SyncConfig, SyncCoordinator, SyncReport};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, ServiceError};
use crate::AppDependencies;

/// Session configuration supplied by the host app.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server root without the `/api` prefix.
    pub api_base_url: String,
    /// Stable per-install identifier used for user registration.
    pub device_id: String,
    pub sync: SyncConfig,
}

impl AppConfig {
    pub fn new(api_base_url: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            device_id: device_id.into(),
            sync: SyncConfig::default(),
        }
    }
}

/// Root handle composing the playback, download and sync cores.
pub struct AppSession {
    store: LocalStore,
    network: Arc<dyn NetworkMonitor>,
    event_bus: EventBus,
    api: ApiClient,
    player: Arc<PlayerController>,
    downloads: Arc<DownloadManager>,
    sync: Arc<SyncCoordinator>,
    device_id: String,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl AppSession {
    pub fn new(deps: AppDependencies, config: AppConfig) -> Self {
        let event_bus = EventBus::default();
        let shared_bus = Arc::new(event_bus.clone());
        let store = LocalStore::new(Arc::clone(&deps.settings_store));
        let api = ApiClient::new(Arc::clone(&deps.http_client), config.api_base_url.clone());

        let player = Arc::new(
            PlayerController::new(
                Arc::clone(&deps.audio_backend),
                Arc::clone(&deps.network_monitor),
                store.clone(),
            )
            .with_event_bus(Arc::clone(&shared_bus)),
        );
        let downloads = Arc::new(
            DownloadManager::new(
                Arc::clone(&deps.http_client),
                Arc::clone(&deps.media_store),
                Arc::clone(&deps.network_monitor),
                store.clone(),
            )
            .with_event_bus(shared_bus),
        );
        let sync = Arc::new(
            SyncCoordinator::new(
                api.clone(),
                Arc::clone(&deps.network_monitor),
                store.clone(),
            )
            .with_event_bus(event_bus.clone())
            .with_config(config.sync),
        );

        Self {
            store,
            network: deps.network_monitor,
            event_bus,
            api,
            player,
            downloads,
            sync,
            device_id: config.device_id,
            watcher: Mutex::new(None),
        }
    }

    /// Bring the session up: restore preferences, apply the persisted
    /// subscription state, start watching connectivity, and — when online —
    /// register the device user and run a startup reconciliation pass.
    ///
    /// Remote failures here degrade to warnings; the cached snapshot keeps
    /// the app usable.
    #[instrument(skip(self))]
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        self.player.restore_prefs().await?;
        if let Some(profile) = self.store.load_profile().await? {
            self.player.set_subscribed(profile.is_subscribed).await;
        }

        let handle = self.spawn_connectivity_watcher();
        *self.watcher.lock().await = Some(handle);

        if self.network.is_online().await {
            match self.sync.ensure_user(&self.device_id).await {
                Ok(profile) => self.player.set_subscribed(profile.is_subscribed).await,
                Err(error) => warn!(%error, "device user registration failed"),
            }
            match self.sync.reconcile(SyncTrigger::Startup).await {
                Ok(report) => self.apply_report(&report).await,
                Err(error) => warn!(%error, "startup reconciliation failed"),
            }
        } else {
            info!("starting offline against cached snapshot");
        }
        Ok(())
    }

    /// Tear the session down: stop the connectivity watcher and playback.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.watcher.lock().await.take() {
            handle.abort();
        }
        if let Err(error) = self.player.stop().await {
            warn!(%error, "stop during shutdown failed");
        }
    }

    // -------------------------------------------------------------------------
    // Handles & events
    // -------------------------------------------------------------------------

    pub fn player(&self) -> &Arc<PlayerController> {
        &self.player
    }

    pub fn downloads(&self) -> &Arc<DownloadManager> {
        &self.downloads
    }

    /// Subscribe to all core events.
    pub fn events(&self) -> broadcast::Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    // -------------------------------------------------------------------------
    // Catalog reads (always served from the local snapshot)
    // -------------------------------------------------------------------------

    pub async fn catalog(&self) -> Result<Vec<Track>> {
        Ok(self.store.load_catalog().await?)
    }

    /// Featured tracks in banner order, resolved against the snapshot.
    /// Featured ids missing from the catalog are silently dropped.
    pub async fn featured(&self) -> Result<Vec<Track>> {
        let ids = self.store.load_featured().await?;
        let by_id: HashMap<TrackId, Track> = self
            .store
            .load_catalog()
            .await?
            .into_iter()
            .map(|track| (track.id, track))
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
    }

    /// Case-insensitive title search over the cached catalog.
    pub async fn search_catalog(&self, query: &str) -> Result<Vec<Track>> {
        let needle = query.to_lowercase();
        Ok(self
            .store
            .load_catalog()
            .await?
            .into_iter()
            .filter(|track| track.title.to_lowercase().contains(&needle))
            .collect())
    }

    /// Catalog filtered by mood; `None` lists everything, matching the
    /// server's `"All"` sentinel.
    pub async fn tracks_by_mood(&self, mood: Option<&Mood>) -> Result<Vec<Track>> {
        let catalog = self.store.load_catalog().await?;
        Ok(match mood {
            None => catalog,
            Some(mood) => catalog
                .into_iter()
                .filter(|track| &track.mood == mood)
                .collect(),
        })
    }

    /// Completed downloads, most recent first.
    pub async fn downloaded_tracks(&self) -> Result<Vec<DownloadRecord>> {
        let mut records: Vec<DownloadRecord> = self
            .store
            .load_download_index()
            .await?
            .into_values()
            .collect();
        records.sort_by(|a, b| b.downloaded_at.cmp(&a.downloaded_at));
        Ok(records)
    }

    // -------------------------------------------------------------------------
    // Favorites (locally authoritative, set semantics)
    // -------------------------------------------------------------------------

    pub async fn favorites(&self) -> Result<Vec<FavoriteEntry>> {
        Ok(self.store.load_favorites().await?)
    }

    pub async fn is_favorite(&self, track_id: TrackId) -> Result<bool> {
        Ok(self
            .store
            .load_favorites()
            .await?
            .iter()
            .any(|entry| entry.track_id == track_id))
    }

    /// Add a favorite with a denormalized track snapshot. Returns `false`
    /// when already favorited.
    pub async fn add_favorite(&self, track: &Track) -> Result<bool> {
        let mut favorites = self.store.load_favorites().await?;
        if favorites.iter().any(|entry| entry.track_id == track.id) {
            return Ok(false);
        }
        favorites.push(FavoriteEntry {
            track_id: track.id,
            favorited_at: Utc::now(),
            track: track.clone(),
        });
        self.store.save_favorites(&favorites).await?;
        self.emit_library(LibraryEvent::FavoriteAdded {
            track_id: track.id.to_string(),
        });
        Ok(true)
    }

    /// Remove a favorite. Returns `false` when it was not favorited.
    pub async fn remove_favorite(&self, track_id: TrackId) -> Result<bool> {
        let mut favorites = self.store.load_favorites().await?;
        let before = favorites.len();
        favorites.retain(|entry| entry.track_id != track_id);
        if favorites.len() == before {
            return Ok(false);
        }
        self.store.save_favorites(&favorites).await?;
        self.emit_library(LibraryEvent::FavoriteRemoved {
            track_id: track_id.to_string(),
        });
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Playlists (locally authoritative)
    // -------------------------------------------------------------------------

    pub async fn playlists(&self) -> Result<Vec<Playlist>> {
        Ok(self.store.load_playlists().await?)
    }

    pub async fn create_playlist(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        cover_color: impl Into<String>,
    ) -> Result<Playlist> {
        let playlist = Playlist::new(name, description, cover_color);
        let mut playlists = self.store.load_playlists().await?;
        playlists.push(playlist.clone());
        self.store.save_playlists(&playlists).await?;
        self.emit_library(LibraryEvent::PlaylistCreated {
            playlist_id: playlist.id.to_string(),
            name: playlist.name.clone(),
        });
        Ok(playlist)
    }

    /// Delete a playlist. Returns `false` when absent.
    pub async fn delete_playlist(&self, playlist_id: PlaylistId) -> Result<bool> {
        let mut playlists = self.store.load_playlists().await?;
        let before = playlists.len();
        playlists.retain(|playlist| playlist.id != playlist_id);
        if playlists.len() == before {
            return Ok(false);
        }
        self.store.save_playlists(&playlists).await?;
        self.emit_library(LibraryEvent::PlaylistDeleted {
            playlist_id: playlist_id.to_string(),
        });
        Ok(true)
    }

    /// Append a track to a playlist, dropping duplicates. Returns `true`
    /// when the playlist changed.
    pub async fn add_to_playlist(
        &self,
        playlist_id: PlaylistId,
        track_id: TrackId,
    ) -> Result<bool> {
        self.mutate_playlist(playlist_id, |playlist| playlist.add_track(track_id))
            .await
    }

    /// Remove a track from a playlist. Returns `true` when it was present.
    pub async fn remove_from_playlist(
        &self,
        playlist_id: PlaylistId,
        track_id: TrackId,
    ) -> Result<bool> {
        self.mutate_playlist(playlist_id, |playlist| playlist.remove_track(track_id))
            .await
    }

    async fn mutate_playlist(
        &self,
        playlist_id: PlaylistId,
        mutate: impl FnOnce(&mut Playlist) -> bool,
    ) -> Result<bool> {
        let mut playlists = self.store.load_playlists().await?;
        let Some(playlist) = playlists.iter_mut().find(|p| p.id == playlist_id) else {
            return Ok(false);
        };
        if !mutate(playlist) {
            return Ok(false);
        }
        self.store.save_playlists(&playlists).await?;
        self.emit_library(LibraryEvent::PlaylistUpdated {
            playlist_id: playlist_id.to_string(),
        });
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Subscription
    // -------------------------------------------------------------------------

    pub async fn profile(&self) -> Result<Option<UserProfile>> {
        Ok(self.store.load_profile().await?)
    }

    /// Subscribe the registered user. Requires connectivity and a profile.
    pub async fn subscribe(&self) -> Result<UserProfile> {
        let mut profile = self.store.load_profile().await?.ok_or(ServiceError::NoUser)?;
        self.api.subscribe(profile.id).await?;
        profile.is_subscribed = true;
        self.store.save_profile(&profile).await?;
        self.player.set_subscribed(true).await;
        info!("subscription activated");
        Ok(profile)
    }

    /// Restore a previous purchase. Returns whether one was found.
    pub async fn restore_purchase(&self) -> Result<bool> {
        let mut profile = self.store.load_profile().await?.ok_or(ServiceError::NoUser)?;
        let outcome = self.api.restore(profile.id).await?;
        profile.is_subscribed = outcome.restored;
        self.store.save_profile(&profile).await?;
        self.player.set_subscribed(outcome.restored).await;
        Ok(outcome.restored)
    }

    // -------------------------------------------------------------------------
    // Sync & play counts
    // -------------------------------------------------------------------------

    /// Run a manual reconciliation pass.
    pub async fn refresh(&self) -> Result<SyncReport> {
        let report = self.sync.reconcile(SyncTrigger::Manual).await?;
        self.apply_report(&report).await;
        Ok(report)
    }

    /// Best-effort play-count bump: spawned, never awaited by playback, and
    /// skipped entirely offline.
    pub fn note_played(&self, track_id: TrackId) {
        let api = self.api.clone();
        let network = Arc::clone(&self.network);
        tokio::spawn(async move {
            if !network.is_online().await {
                return;
            }
            if let Err(error) = api.increment_play_count(track_id).await {
                debug!(%track_id, %error, "play-count bump dropped");
            }
        });
    }

    /// Mood filter labels for the browse UI, `"All"` first. Served from the
    /// server when online, from the built-in vocabulary otherwise.
    pub async fn mood_filters(&self) -> Result<Vec<String>> {
        if self.network.is_online().await {
            if let Ok(moods) = self.api.moods().await {
                return Ok(moods);
            }
        }
        Ok(["All", "Calm", "Drums", "Spiritual", "Soft", "Energetic"]
            .iter()
            .map(|s| s.to_string())
            .collect())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn apply_report(&self, report: &SyncReport) {
        if let Some(active) = report.subscription_active {
            self.player.set_subscribed(active).await;
        }
    }

    fn emit_library(&self, event: LibraryEvent) {
        let _ = self.event_bus.emit(CoreEvent::Library(event));
    }

    /// Watch the host connectivity stream. Equal consecutive values are
    /// suppressed; an offline→online transition triggers a reconciliation
    /// pass (and a late user registration if the device never had one).
    fn spawn_connectivity_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let network = Arc::clone(&self.network);
        tokio::spawn(async move {
            let mut stream = match network.subscribe_changes().await {
                Ok(stream) => stream,
                Err(error) => {
                    warn!(%error, "connectivity stream unavailable");
                    return;
                }
            };
            let mut last_online = network.is_online().await;
            while let Some(status) = stream.next().await {
                let online = status.is_online();
                if online == last_online {
                    continue;
                }
                last_online = online;
                let Some(session) = weak.upgrade() else {
                    break;
                };
                session.handle_connectivity_change(online).await;
            }
        })
    }

    async fn handle_connectivity_change(&self, online: bool) {
        info!(online, "connectivity changed");
        let _ = self
            .event_bus
            .emit(CoreEvent::Connectivity(ConnectivityEvent::Changed { online }));
        if !online {
            return;
        }

        match self.store.load_profile().await {
            Ok(None) => {
                if let Err(error) = self.sync.ensure_user(&self.device_id).await {
                    warn!(%error, "late user registration failed");
                }
            }
            Ok(Some(_)) => {}
            Err(error) => warn!(%error, "profile read failed"),
        }

        match self.sync.reconcile(SyncTrigger::CameOnline).await {
            Ok(report) => self.apply_report(&report).await,
            Err(error) => warn!(%error, "came-online reconciliation failed"),
        }
    }
}
