//! Reconciliation coordinator.
//!
//! Runs a reconciliation pass against the remote API whenever the app starts,
//! connectivity returns, or the caller asks for one. A pass is a fixed
//! sequence of independent steps:
//!
//! 1. Replace the cached catalog snapshot wholesale with the server listing.
//! 2. Refresh the featured track ids.
//! 3. Refresh the subscription status into the local user profile.
//! 4. Push local favorites to the server (advisory mirror, local wins).
//! 5. Push local playlists to the server (advisory mirror, local wins).
//!
//! A failed step is recorded and the pass continues; partial success is
//! normal operation on a flaky mobile link. Nothing here ever mutates
//! favorites or playlists from remote data.

use bridge_traits::network::NetworkMonitor;
use core_catalog::models::{TrackId, UserProfile};
use core_catalog::store::LocalStore;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent, SyncTrigger};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiClient, CatalogQuery};
use crate::error::{Result, SyncError};

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Whether to mirror favorites and playlists to the server. The mirror is
    /// advisory either way; disabling it only skips the push steps.
    pub push_local_collections: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            push_local_collections: true,
        }
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub trigger: SyncTrigger,
    /// Names of steps that failed, in execution order.
    pub failed_steps: Vec<String>,
    /// Subscription state after the pass, when the subscription step ran.
    pub subscription_active: Option<bool>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed_steps.is_empty()
    }
}

/// Orchestrates reconciliation between the local snapshot and the remote API.
pub struct SyncCoordinator {
    api: ApiClient,
    network: Arc<dyn NetworkMonitor>,
    store: LocalStore,
    event_bus: Option<EventBus>,
    config: SyncConfig,
}

impl SyncCoordinator {
    pub fn new(api: ApiClient, network: Arc<dyn NetworkMonitor>, store: LocalStore) -> Self {
        Self {
            api,
            network,
            store,
            event_bus: None,
            config: SyncConfig::default(),
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Ensure a device-bound user exists: the persisted profile when present,
    /// otherwise a create-or-get round trip keyed by `device_id`.
    #[instrument(skip(self))]
    pub async fn ensure_user(&self, device_id: &str) -> Result<UserProfile> {
        if let Some(profile) = self.store.load_profile().await? {
            return Ok(profile);
        }
        if !self.network.is_online().await {
            return Err(SyncError::Offline);
        }
        let profile = self.api.create_or_get_user(device_id).await?;
        self.store.save_profile(&profile).await?;
        info!(user_id = %profile.id, "registered device user");
        Ok(profile)
    }

    /// Run one reconciliation pass. Offline, the pass is skipped entirely and
    /// the cached snapshot stays authoritative.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, trigger: SyncTrigger) -> Result<SyncReport> {
        if !self.network.is_online().await {
            debug!(?trigger, "skipping reconcile while offline");
            return Err(SyncError::Offline);
        }

        self.emit(SyncEvent::Started { trigger });
        let mut report = SyncReport {
            trigger,
            failed_steps: Vec::new(),
            subscription_active: None,
        };

        if let Err(error) = self.refresh_catalog().await {
            self.record_failure(&mut report, "catalog", error);
        }
        if let Err(error) = self.refresh_featured().await {
            self.record_failure(&mut report, "featured", error);
        }
        match self.refresh_subscription().await {
            Ok(active) => report.subscription_active = active,
            Err(error) => self.record_failure(&mut report, "subscription", error),
        }
        if self.config.push_local_collections {
            if let Err(error) = self.push_favorites().await {
                self.record_failure(&mut report, "favorites", error);
            }
            if let Err(error) = self.push_playlists().await {
                self.record_failure(&mut report, "playlists", error);
            }
        }

        self.emit(SyncEvent::Completed {
            steps_failed: report.failed_steps.len() as u32,
        });
        info!(
            ?trigger,
            failed = report.failed_steps.len(),
            "reconciliation pass finished"
        );
        Ok(report)
    }

    // -------------------------------------------------------------------------
    // Steps
    // -------------------------------------------------------------------------

    /// The server listing replaces the cached catalog wholesale. No merge:
    /// removed tracks disappear, though their download records survive.
    async fn refresh_catalog(&self) -> Result<()> {
        let tracks = self.api.list_instrumentals(&CatalogQuery::default()).await?;
        debug!(count = tracks.len(), "replacing catalog snapshot");
        self.store.save_catalog(&tracks).await?;
        Ok(())
    }

    async fn refresh_featured(&self) -> Result<()> {
        let featured = self.api.featured().await?;
        let ids: Vec<TrackId> = featured.iter().map(|track| track.id).collect();
        self.store.save_featured(&ids).await?;
        Ok(())
    }

    /// Refresh `is_subscribed` into the persisted profile. Without a profile
    /// the step is a no-op, not a failure.
    async fn refresh_subscription(&self) -> Result<Option<bool>> {
        let Some(mut profile) = self.store.load_profile().await? else {
            return Ok(None);
        };
        let status = self.api.subscription_status(profile.id).await?;
        if profile.is_subscribed != status.is_subscribed {
            info!(is_subscribed = status.is_subscribed, "subscription state changed");
        }
        profile.is_subscribed = status.is_subscribed;
        self.store.save_profile(&profile).await?;
        Ok(Some(status.is_subscribed))
    }

    async fn push_favorites(&self) -> Result<()> {
        let Some(profile) = self.store.load_profile().await? else {
            return Ok(());
        };
        let favorites = self.store.load_favorites().await?;
        let ids: Vec<TrackId> = favorites.iter().map(|entry| entry.track_id).collect();
        self.api.push_favorites(profile.id, &ids).await
    }

    async fn push_playlists(&self) -> Result<()> {
        let Some(profile) = self.store.load_profile().await? else {
            return Ok(());
        };
        let playlists = self.store.load_playlists().await?;
        self.api.push_playlists(profile.id, &playlists).await
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn record_failure(&self, report: &mut SyncReport, step: &str, error: SyncError) {
        warn!(step, %error, "reconciliation step failed");
        self.emit(SyncEvent::StepFailed {
            step: step.to_string(),
            message: error.to_string(),
        });
        report.failed_steps.push(step.to_string());
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Sync(event));
        }
    }
}
