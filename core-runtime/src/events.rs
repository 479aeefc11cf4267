//! # Event Bus System
//!
//! Event-driven architecture for the offline playback core using
//! `tokio::sync::broadcast`. Core modules emit typed events; subscribers
//! (UI adapters, loggers, tests) consume them independently.
//!
//! ## Overview
//!
//! - **Event types**: strongly-typed enum hierarchies per domain
//! - **EventBus**: central broadcast channel
//! - **Subscription management**: multiple independent subscribers
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, ConnectivityEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Connectivity(ConnectivityEvent::Changed { online: true }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Connectivity(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! `RecvError::Lagged(n)` means the subscriber missed `n` events and may keep
//! receiving; `RecvError::Closed` signals shutdown. Emitting with no
//! subscribers is not treated as an error by callers (`emit(...).ok()`).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Connectivity transitions
    Connectivity(ConnectivityEvent),
    /// Download lifecycle events
    Download(DownloadEvent),
    /// Playback session events
    Playback(PlaybackEvent),
    /// Reconciliation events
    Sync(SyncEvent),
    /// Local library (favorites/playlists) events
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Connectivity(e) => e.description(),
            CoreEvent::Download(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Download(DownloadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::StepFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Connectivity(_) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Download(DownloadEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Connectivity Events
// ============================================================================

/// Events emitted on debounced reachability transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConnectivityEvent {
    /// Online state changed. Emitted at most once per actual transition.
    Changed { online: bool },
}

impl ConnectivityEvent {
    fn description(&self) -> &str {
        match self {
            ConnectivityEvent::Changed { online: true } => "Device came online",
            ConnectivityEvent::Changed { online: false } => "Device went offline",
        }
    }
}

// ============================================================================
// Download Events
// ============================================================================

/// Events related to per-track download lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    /// Transfer started for a track.
    Started { track_id: String },
    /// Monotonic progress update, fraction in `[0, 1]`.
    Progress { track_id: String, fraction: f32 },
    /// Download committed; track is now available offline.
    Completed { track_id: String, byte_size: u64 },
    /// Transfer failed or was aborted; no record persisted.
    Failed { track_id: String, message: String },
    /// Downloaded media and record were removed.
    Deleted { track_id: String },
}

impl DownloadEvent {
    fn description(&self) -> &str {
        match self {
            DownloadEvent::Started { .. } => "Download started",
            DownloadEvent::Progress { .. } => "Download progress",
            DownloadEvent::Completed { .. } => "Download completed",
            DownloadEvent::Failed { .. } => "Download failed",
            DownloadEvent::Deleted { .. } => "Download deleted",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to the playback session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A new track started loading.
    TrackStarted { track_id: String, preview: bool },
    /// Playback paused.
    Paused { track_id: String },
    /// Playback resumed.
    Resumed { track_id: String },
    /// Session stopped and reset to idle.
    Stopped,
    /// Track reached its natural end.
    Completed { track_id: String },
    /// Preview window boundary reached; preview stopped.
    PreviewEnded { track_id: String },
    /// Playback error surfaced to the user; session reset to idle.
    Error { track_id: Option<String>, message: String },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackStarted { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::PreviewEnded { .. } => "Preview ended",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events emitted by the reconciliation coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Reconciliation started.
    Started { trigger: SyncTrigger },
    /// One reconciliation step failed; remaining steps still run.
    StepFailed { step: String, message: String },
    /// Reconciliation finished. `steps_failed` counts degraded steps.
    Completed { steps_failed: u32 },
}

/// What caused a reconciliation pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncTrigger {
    /// App start.
    Startup,
    /// Offline→online transition.
    CameOnline,
    /// Explicit user refresh.
    Manual,
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Reconciliation started",
            SyncEvent::StepFailed { .. } => "Reconciliation step failed",
            SyncEvent::Completed { .. } => "Reconciliation completed",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Events for locally-authoritative collections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// Track added to favorites.
    FavoriteAdded { track_id: String },
    /// Track removed from favorites.
    FavoriteRemoved { track_id: String },
    /// New playlist created.
    PlaylistCreated { playlist_id: String, name: String },
    /// Playlist contents or metadata changed.
    PlaylistUpdated { playlist_id: String },
    /// Playlist deleted.
    PlaylistDeleted { playlist_id: String },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::FavoriteAdded { .. } => "Favorite added",
            LibraryEvent::FavoriteRemoved { .. } => "Favorite removed",
            LibraryEvent::PlaylistCreated { .. } => "Playlist created",
            LibraryEvent::PlaylistUpdated { .. } => "Playlist updated",
            LibraryEvent::PlaylistDeleted { .. } => "Playlist deleted",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for core events.
///
/// Cheap to clone; emitting with zero subscribers returns an error that
/// callers routinely ignore.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer size.
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Subscribe to all events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

// ============================================================================
// Tests
// ============================================================================
