//! Catalog domain models and the local persistence adapter.

pub mod error;
pub mod models;
pub mod store;

pub use error::{CatalogError, Result};
pub use models::{
    DownloadRecord, FavoriteEntry, Mood, PlayerPrefs, Playlist, PlaylistId, PreviewRange, Track,
    TrackId, UserId, UserProfile,
};
pub use store::LocalStore;
