//! Sync error types.

use thiserror::Error;

/// Errors produced by the remote API client and the sync coordinator.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Connectivity
    // =========================================================================
    /// The operation requires connectivity and the device is offline.
    #[error("device is offline")]
    Offline,

    // =========================================================================
    // Remote API
    // =========================================================================
    /// The server answered with a non-success status.
    #[error("API request failed: {status} {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure from the host HTTP client.
    #[error("HTTP transport error: {0}")]
    Http(#[from] bridge_traits::error::BridgeError),

    // =========================================================================
    // Local persistence
    // =========================================================================
    /// Reading or writing the local snapshot failed.
    #[error("local store error: {0}")]
    Store(#[from] core_catalog::error::CatalogError),
}

impl SyncError {
    /// Whether retrying later, once connectivity returns, is reasonable.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Offline | SyncError::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
