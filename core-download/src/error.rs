use thiserror::Error;

/// Errors from the download manager.
///
/// Rejections (`NoAudioUrl`, `Offline`, `AlreadyInProgress`) happen before
/// any side effect; transfer failures leave no partial record behind.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// The track carries no audio URL; there is nothing to transfer.
    #[error("Track {0} has no audio URL")]
    NoAudioUrl(String),

    /// Device is offline; downloads require connectivity.
    #[error("Cannot download while offline")]
    Offline,

    /// A transfer for this track is already running.
    #[error("Download already in progress for track {0}")]
    AlreadyInProgress(String),

    /// The transfer was cancelled mid-flight by a delete call.
    #[error("Download aborted")]
    Aborted,

    /// The transfer failed partway; staged data was discarded.
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Persistence error: {0}")]
    Store(#[from] core_catalog::CatalogError),
}

pub type Result<T> = std::result::Result<T, DownloadError>;
