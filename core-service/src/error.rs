//! Service-level error type: the union of everything an app action can fail
//! with.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The action needs a registered user and the device has never been
    /// online to register one.
    #[error("no registered user on this device")]
    NoUser,

    #[error(transparent)]
    Playback(#[from] core_playback::error::PlaybackError),

    #[error(transparent)]
    Download(#[from] core_download::error::DownloadError),

    #[error(transparent)]
    Sync(#[from] core_sync::error::SyncError),

    #[error(transparent)]
    Store(#[from] core_catalog::error::CatalogError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
