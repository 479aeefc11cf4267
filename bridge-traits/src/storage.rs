//! Storage Abstractions
//!
//! Platform-agnostic traits for durable key-value persistence and for the
//! file-level media store backing offline downloads.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Key-value settings storage trait.
///
/// Abstracts platform-specific durable storage:
/// - iOS: UserDefaults / files in the app container
/// - Android: SharedPreferences / DataStore
/// - Desktop: config files
///
/// Values are opaque strings; the core serializes its collections to JSON
/// before storing them. Contents must survive process restarts.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value.
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value. Returns `Ok(None)` if the key is absent.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists.
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    /// List all stored keys.
    async fn list_keys(&self) -> Result<Vec<String>>;
}

/// A committed media file in durable local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    /// Local addressable URI for playback.
    pub local_uri: String,
    /// Total bytes committed.
    pub byte_size: u64,
}

/// File-level media store for downloaded audio.
///
/// Writes are staged: bytes handed to a [`MediaWriteHandle`] become visible
/// only on `commit`. An aborted or dropped handle leaves no trace, which is
/// what lets the download manager guarantee no partial file survives a
/// failed transfer.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Open a staged write for the given media key (typically the track id).
    async fn begin_write(&self, media_key: &str) -> Result<Box<dyn MediaWriteHandle>>;

    /// Remove committed media. Removing an absent key is not an error.
    async fn remove(&self, media_key: &str) -> Result<()>;

    /// Check whether committed media exists for the key.
    async fn contains(&self, media_key: &str) -> Result<bool>;
}

/// Staged write handle for one media file.
#[async_trait]
pub trait MediaWriteHandle: Send {
    /// Append a chunk to the staged file.
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<()>;

    /// Commit the staged bytes, returning the durable local URI.
    async fn commit(self: Box<Self>) -> Result<StoredMedia>;

    /// Discard the staged bytes.
    async fn abort(self: Box<Self>) -> Result<()>;
}
