//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the core library and platform-specific
//! implementations. Each trait represents a capability that the core requires but
//! that must be implemented differently per platform (iOS, Android, desktop, web).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP for the catalog API and media transfers
//! - [`NetworkMonitor`](network::NetworkMonitor) - Reachability probe and change stream
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Durable key-value persistence
//! - [`MediaStore`](storage::MediaStore) - Staged file store for offline downloads
//!
//! ### Audio
//! - [`AudioBackend`](playback::AudioBackend) - Host audio engine (load/play/pause/seek/stop)
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with a descriptive error when a required capability is
//! missing, rather than limping along with a partial bridge set.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should convert platform-specific errors into it and keep the
//! messages actionable.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind `Arc`.

pub mod error;
pub mod http;
pub mod network;
pub mod playback;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use network::{NetworkChangeStream, NetworkMonitor, NetworkStatus};
pub use playback::{AudioBackend, AudioSessionId, AudioSourceUri, AudioStatus, AudioStatusStream};
pub use storage::{MediaStore, MediaWriteHandle, SettingsStore, StoredMedia};
