//! Domain models for the instrumental catalog and user-local collections.
//!
//! Catalog records (`Track`) are read-only to playback logic and replaced
//! wholesale by reconciliation. Favorites and playlists are locally
//! authoritative; remote mirroring never overwrites them. Download records
//! carry a denormalized track snapshot so offline listing and playback work
//! without the live catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a catalog track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user-created playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaylistId(pub Uuid);

impl PlaylistId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlaylistId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for the device-bound user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Catalog Models
// =============================================================================

/// Mood category tag for an instrumental.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mood {
    Calm,
    Drums,
    Spiritual,
    Soft,
    Energetic,
    /// Mood label not in the known vocabulary; preserved verbatim.
    Other(String),
}

impl From<String> for Mood {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Calm" => Mood::Calm,
            "Drums" => Mood::Drums,
            "Spiritual" => Mood::Spiritual,
            "Soft" => Mood::Soft,
            "Energetic" => Mood::Energetic,
            _ => Mood::Other(s),
        }
    }
}

impl From<Mood> for String {
    fn from(mood: Mood) -> Self {
        mood.as_str().to_string()
    }
}

impl Mood {
    pub fn as_str(&self) -> &str {
        match self {
            Mood::Calm => "Calm",
            Mood::Drums => "Drums",
            Mood::Spiritual => "Spiritual",
            Mood::Soft => "Soft",
            Mood::Energetic => "Energetic",
            Mood::Other(s) => s,
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preview sub-range of a premium track, in whole seconds.
///
/// Only meaningful on premium tracks; unsubscribed users may play this range
/// and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRange {
    pub start_secs: u32,
    pub end_secs: u32,
}

impl PreviewRange {
    /// Default preview window when a track carries no explicit metadata:
    /// the first 30 seconds, capped at the track duration.
    pub fn default_for(duration_secs: u32) -> Self {
        Self {
            start_secs: 0,
            end_secs: duration_secs.min(30),
        }
    }

    pub fn start_millis(&self) -> u64 {
        u64::from(self.start_secs) * 1000
    }

    pub fn end_millis(&self) -> u64 {
        u64::from(self.end_secs) * 1000
    }
}

/// Immutable catalog record.
///
/// Created and updated only by catalog reconciliation; read-only everywhere
/// else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub mood: Mood,
    /// Duration in seconds.
    pub duration: u32,
    pub is_premium: bool,
    pub is_featured: bool,
    /// Streamable URL; `None` means the media is not yet available.
    pub audio_url: Option<String>,
    /// Explicit preview window; only meaningful when `is_premium`.
    #[serde(default)]
    pub preview_range: Option<PreviewRange>,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub play_count: u64,
    /// Card gradient color, carried for offline display.
    #[serde(default)]
    pub thumbnail_color: Option<String>,
}

impl Track {
    pub fn duration_millis(&self) -> u64 {
        u64::from(self.duration) * 1000
    }

    /// `m:ss` display form, e.g. `"3:45"`.
    pub fn duration_formatted(&self) -> String {
        format!("{}:{:02}", self.duration / 60, self.duration % 60)
    }

    /// Preview window for this track: explicit metadata when present,
    /// otherwise the default first-30-seconds window.
    pub fn preview_window(&self) -> PreviewRange {
        self.preview_range
            .unwrap_or_else(|| PreviewRange::default_for(self.duration))
    }
}

// =============================================================================
// Download Models
// =============================================================================

/// Durable record of a completed download, keyed by track id.
///
/// Existence of this record is the single source of truth for "available
/// offline". It embeds a track snapshot so offline listing and playback do
/// not depend on the live catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub track_id: TrackId,
    pub local_uri: String,
    pub downloaded_at: DateTime<Utc>,
    pub byte_size: u64,
    /// Denormalized catalog snapshot taken at download time.
    pub track: Track,
}

// =============================================================================
// User-local Collections
// =============================================================================

/// A favorited track with its denormalized snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    pub track_id: TrackId,
    pub favorited_at: DateTime<Utc>,
    pub track: Track,
}

/// User-created playlist. Locally authoritative; never merged from remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub track_ids: Vec<TrackId>,
    pub cover_color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Playlist {
    pub fn new(name: impl Into<String>, description: impl Into<String>, cover_color: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PlaylistId::new(),
            name: name.into(),
            description: description.into(),
            track_ids: Vec::new(),
            cover_color: cover_color.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a track, dropping duplicates. Returns `true` if inserted.
    pub fn add_track(&mut self, track_id: TrackId) -> bool {
        if self.track_ids.contains(&track_id) {
            return false;
        }
        self.track_ids.push(track_id);
        self.updated_at = Utc::now();
        true
    }

    /// Remove a track. Returns `true` if it was present.
    pub fn remove_track(&mut self, track_id: TrackId) -> bool {
        let before = self.track_ids.len();
        self.track_ids.retain(|id| *id != track_id);
        let removed = self.track_ids.len() != before;
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }
}

/// Device-bound user profile mirrored from the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub device_id: String,
    pub is_subscribed: bool,
    pub created_at: DateTime<Utc>,
}

/// Persisted player preference flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPrefs {
    pub loop_enabled: bool,
    pub shuffle_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(duration: u32) -> Track {
        Track {
            id: TrackId::new(),
            title: "Morning Dhikr".to_string(),
            mood: Mood::Calm,
            duration,
            is_premium: false,
            is_featured: false,
            audio_url: Some("https://cdn.example/a.mp3".to_string()),
            preview_range: None,
            file_size: 0,
            play_count: 0,
            thumbnail_color: None,
        }
    }

    #[test]
    fn mood_round_trips_unknown_labels() {
        let mood: Mood = "Lofi".to_string().into();
        assert_eq!(mood, Mood::Other("Lofi".to_string()));
        let s: String = mood.into();
        assert_eq!(s, "Lofi");
    }

    #[test]
    fn default_preview_window_caps_at_duration() {
        assert_eq!(
            PreviewRange::default_for(18),
            PreviewRange { start_secs: 0, end_secs: 18 }
        );
        assert_eq!(
            PreviewRange::default_for(240),
            PreviewRange { start_secs: 0, end_secs: 30 }
        );
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(track(225).duration_formatted(), "3:45");
        assert_eq!(track(60).duration_formatted(), "1:00");
        assert_eq!(track(59).duration_formatted(), "0:59");
    }

    #[test]
    fn playlist_insert_deduplicates() {
        let mut playlist = Playlist::new("Focus", "", "#4A3463");
        let id = TrackId::new();
        assert!(playlist.add_track(id));
        assert!(!playlist.add_track(id));
        assert_eq!(playlist.track_ids.len(), 1);
        assert!(playlist.remove_track(id));
        assert!(!playlist.remove_track(id));
    }

    #[test]
    fn track_wire_format_matches_backend() {
        // The remote API serves snake_case fields; missing optional fields
        // must default rather than fail.
        let json = serde_json::json!({
            "id": TrackId::new(),
            "title": "Nasheed of Dawn",
            "mood": "Calm",
            "duration": 312,
            "is_premium": true,
            "is_featured": true,
            "audio_url": null,
            "duration_formatted": "5:12",
            "thumbnail_color": "#2D5A4A"
        });
        let parsed: Track = serde_json::from_value(json).unwrap();
        assert!(parsed.is_premium);
        assert!(parsed.audio_url.is_none());
        assert!(parsed.preview_range.is_none());
        assert_eq!(parsed.play_count, 0);
    }
}
