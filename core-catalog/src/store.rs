//! Local persistence adapter.
//!
//! [`LocalStore`] is the only code that touches the host [`SettingsStore`];
//! everything above it works with typed collections. Each collection lives
//! under one well-known key as a JSON document. Absent keys read back as
//! empty defaults; corrupt documents surface as errors rather than being
//! silently dropped.

use crate::error::{CatalogError, Result};
use crate::models::{
    DownloadRecord, FavoriteEntry, PlayerPrefs, Playlist, Track, TrackId, UserProfile,
};
use bridge_traits::storage::SettingsStore;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Well-known persistence keys.
pub mod keys {
    pub const CATALOG_TRACKS: &str = "catalog.tracks";
    pub const CATALOG_FEATURED: &str = "catalog.featured";
    pub const FAVORITES: &str = "library.favorites";
    pub const PLAYLISTS: &str = "library.playlists";
    pub const DOWNLOAD_INDEX: &str = "downloads.index";
    pub const PLAYER_PREFS: &str = "player.prefs";
    pub const USER_PROFILE: &str = "user.profile";
}

/// Typed facade over the durable key-value store.
#[derive(Clone)]
pub struct LocalStore {
    settings: Arc<dyn SettingsStore>,
}

impl LocalStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.settings.get_string(key).await? {
            Some(raw) => {
                let value = serde_json::from_str(&raw).map_err(|source| {
                    CatalogError::CorruptValue {
                        key: key.to_string(),
                        source,
                    }
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.settings.set_string(key, &raw).await?;
        debug!(key, bytes = raw.len(), "persisted collection");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Catalog snapshot (remote-authoritative, replaced wholesale by sync)
    // -------------------------------------------------------------------------

    pub async fn load_catalog(&self) -> Result<Vec<Track>> {
        Ok(self.read(keys::CATALOG_TRACKS).await?.unwrap_or_default())
    }

    pub async fn save_catalog(&self, tracks: &[Track]) -> Result<()> {
        self.write(keys::CATALOG_TRACKS, &tracks).await
    }

    pub async fn load_featured(&self) -> Result<Vec<TrackId>> {
        Ok(self.read(keys::CATALOG_FEATURED).await?.unwrap_or_default())
    }

    pub async fn save_featured(&self, ids: &[TrackId]) -> Result<()> {
        self.write(keys::CATALOG_FEATURED, &ids).await
    }

    // -------------------------------------------------------------------------
    // Favorites / playlists (locally authoritative)
    // -------------------------------------------------------------------------

    pub async fn load_favorites(&self) -> Result<Vec<FavoriteEntry>> {
        Ok(self.read(keys::FAVORITES).await?.unwrap_or_default())
    }

    pub async fn save_favorites(&self, favorites: &[FavoriteEntry]) -> Result<()> {
        self.write(keys::FAVORITES, &favorites).await
    }

    pub async fn load_playlists(&self) -> Result<Vec<Playlist>> {
        Ok(self.read(keys::PLAYLISTS).await?.unwrap_or_default())
    }

    pub async fn save_playlists(&self, playlists: &[Playlist]) -> Result<()> {
        self.write(keys::PLAYLISTS, &playlists).await
    }

    // -------------------------------------------------------------------------
    // Download index (single source of truth for offline availability)
    // -------------------------------------------------------------------------

    pub async fn load_download_index(&self) -> Result<HashMap<TrackId, DownloadRecord>> {
        Ok(self.read(keys::DOWNLOAD_INDEX).await?.unwrap_or_default())
    }

    pub async fn download_record(&self, track_id: TrackId) -> Result<Option<DownloadRecord>> {
        Ok(self.load_download_index().await?.remove(&track_id))
    }

    pub async fn put_download_record(&self, record: DownloadRecord) -> Result<()> {
        let mut index = self.load_download_index().await?;
        index.insert(record.track_id, record);
        self.write(keys::DOWNLOAD_INDEX, &index).await
    }

    /// Remove a record. Removing an absent record is not an error.
    pub async fn remove_download_record(&self, track_id: TrackId) -> Result<bool> {
        let mut index = self.load_download_index().await?;
        let removed = index.remove(&track_id).is_some();
        if removed {
            self.write(keys::DOWNLOAD_INDEX, &index).await?;
        }
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Player prefs / user profile
    // -------------------------------------------------------------------------

    pub async fn load_prefs(&self) -> Result<PlayerPrefs> {
        Ok(self.read(keys::PLAYER_PREFS).await?.unwrap_or_default())
    }

    pub async fn save_prefs(&self, prefs: PlayerPrefs) -> Result<()> {
        self.write(keys::PLAYER_PREFS, &prefs).await
    }

    pub async fn load_profile(&self) -> Result<Option<UserProfile>> {
        self.read(keys::USER_PROFILE).await
    }

    pub async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        self.write(keys::USER_PROFILE, profile).await
    }
}
