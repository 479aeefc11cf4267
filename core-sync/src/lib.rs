//! Remote synchronization: the typed API client and the reconciliation
//! coordinator that keeps the local snapshot current whenever connectivity
//! allows.

pub mod api;
pub mod coordinator;
pub mod error;

pub use api::{ApiClient, CatalogQuery, RestoreOutcome, SubscriptionInfo, SubscriptionStatus};
pub use coordinator::{SyncConfig, SyncCoordinator, SyncReport};
pub use error::{Result, SyncError};
