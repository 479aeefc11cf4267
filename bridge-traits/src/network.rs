//! Network Monitoring Abstraction
//!
//! Provides network reachability information and change notifications to the
//! core. The core uses this to gate remote calls, filter the play queue when
//! offline, and trigger reconciliation when connectivity returns.

use crate::error::Result;
use async_trait::async_trait;

/// Network connection status as reported by the host reachability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Connected to a network.
    Connected,
    /// Not connected to any network.
    Disconnected,
    /// Connection status unknown or indeterminate.
    Indeterminate,
}

impl NetworkStatus {
    /// Collapse the status to a playable boolean.
    ///
    /// `Indeterminate` maps to offline: an unknown network is treated as
    /// unreachable so the core never attempts remote calls it cannot cancel.
    pub fn is_online(self) -> bool {
        matches!(self, NetworkStatus::Connected)
    }
}

/// Network reachability monitor trait.
///
/// # Platform Support
///
/// - **iOS**: Network framework, Reachability
/// - **Android**: ConnectivityManager
/// - **Desktop**: NetworkManager / SystemConfiguration / Network List Manager
///
/// # Failure semantics
///
/// If the underlying probe fails, implementations should report
/// `Disconnected` rather than error out; the default `is_online` helper
/// already fails closed when `current_status` returns an error.
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Query the current reachability status.
    async fn current_status(&self) -> Result<NetworkStatus>;

    /// Check if currently connected, failing closed on probe errors.
    async fn is_online(&self) -> bool {
        self.current_status()
            .await
            .map(NetworkStatus::is_online)
            .unwrap_or(false)
    }

    /// Subscribe to reachability changes.
    ///
    /// Implementations may deliver duplicate statuses; the core debounces
    /// consecutive equal values before acting on them.
    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
}

/// Stream of network status updates.
#[async_trait]
pub trait NetworkChangeStream: Send {
    /// Get the next status update. Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<NetworkStatus>;
}
