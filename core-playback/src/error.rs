//! # Playback Error Types

use crate::entitlement::DenyReason;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Entitlement Outcomes
    // ========================================================================
    /// Playback denied by the entitlement gate. Not a bug: a designed gate
    /// outcome carrying a user-facing reason.
    #[error("Playback not allowed: {0}")]
    EntitlementDenied(DenyReason),

    // ========================================================================
    // Source Errors
    // ========================================================================
    /// No playable URI could be resolved: the track is not downloaded and
    /// carries no audio URL.
    #[error("No playable media for track {0}")]
    MediaUnavailable(String),

    // ========================================================================
    // Control Errors
    // ========================================================================
    /// Attempted operation when no track is loaded.
    #[error("No track loaded")]
    NoTrackLoaded,

    // ========================================================================
    // Engine / Persistence Errors
    // ========================================================================
    /// The host audio engine failed (decode error, stream drop). The session
    /// resets to idle and the user must re-initiate.
    #[error("Audio engine error: {0}")]
    Engine(String),

    #[error("Persistence error: {0}")]
    Store(#[from] core_catalog::CatalogError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),
}

impl PlaybackError {
    /// Returns `true` for designed gate outcomes rather than faults.
    pub fn is_denial(&self) -> bool {
        matches!(self, PlaybackError::EntitlementDenied(_))
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
