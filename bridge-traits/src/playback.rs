//! Audio engine bridge traits.
//!
//! The core playback controller drives a host-provided audio engine through
//! [`AudioBackend`]. Hosts select one concrete backend at startup (native
//! player, web audio, test double) and the core never branches on which one
//! is active; the session-level strategy is fixed behind this trait.

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for audio sessions managed by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioSessionId(Uuid);

impl AudioSessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct an identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for AudioSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AudioSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolved playable source handed to the backend.
///
/// The core resolves this before loading: a downloaded track plays from its
/// local URI, everything else streams from its remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSourceUri {
    /// Local file URI produced by a completed download.
    Local(String),
    /// Remote HTTP(S) stream URL.
    Remote(String),
}

impl AudioSourceUri {
    /// Borrow the underlying URI string.
    pub fn as_str(&self) -> &str {
        match self {
            AudioSourceUri::Local(uri) | AudioSourceUri::Remote(uri) => uri,
        }
    }

    /// Whether the source requires network connectivity to play.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSourceUri::Remote(_))
    }
}

/// Snapshot of backend playback state, delivered on every status tick.
///
/// Backends must emit ticks at a bounded interval (at most one second apart)
/// while a session is loaded, and immediately on `did_just_finish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioStatus {
    pub is_loaded: bool,
    pub is_playing: bool,
    pub is_buffering: bool,
    pub position_millis: u64,
    pub duration_millis: u64,
    /// True exactly once, on the tick where the media reached its natural end.
    pub did_just_finish: bool,
}

/// Trait for host audio engines that decode and render audio.
///
/// The core guarantees it holds at most one loaded session at a time and
/// always calls `stop` followed by `unload` before loading a new source.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Load a source and allocate a session. The session starts paused at
    /// position zero.
    async fn load(&self, source: &AudioSourceUri) -> Result<AudioSessionId>;

    /// Begin or resume playback.
    async fn play(&self, session: AudioSessionId) -> Result<()>;

    /// Pause playback without releasing the session.
    async fn pause(&self, session: AudioSessionId) -> Result<()>;

    /// Seek to an absolute position in milliseconds.
    async fn seek(&self, session: AudioSessionId, position_millis: u64) -> Result<()>;

    /// Stop playback and reset position to the start.
    async fn stop(&self, session: AudioSessionId) -> Result<()>;

    /// Release all resources associated with the session. After this call
    /// the session id is invalid and its status stream ends.
    async fn unload(&self, session: AudioSessionId) -> Result<()>;

    /// Subscribe to status ticks for a loaded session.
    async fn status_stream(&self, session: AudioSessionId) -> Result<Box<dyn AudioStatusStream>>;
}

/// Stream of [`AudioStatus`] ticks for one session.
#[async_trait]
pub trait AudioStatusStream: Send {
    /// Get the next status tick. Returns `None` once the session is unloaded.
    async fn next(&mut self) -> Option<AudioStatus>;
}
