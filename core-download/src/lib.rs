//! Offline download management.

pub mod error;
pub mod manager;

pub use error::{DownloadError, Result};
pub use manager::{DownloadManager, DownloadProgress};
