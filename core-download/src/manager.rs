//! # Download Manager
//!
//! Per-track download lifecycle: start, progress, completion, deletion.
//!
//! Transfers are staged through the host [`MediaStore`] and committed only
//! when the byte stream ends cleanly, so a failed or aborted transfer never
//! leaves a partial file or a corrupt [`DownloadRecord`] behind. The durable
//! record index in [`LocalStore`] is the single source of truth for offline
//! availability; transient progress lives only in memory.

use crate::error::{DownloadError, Result};
use bridge_traits::{
    http::HttpClient,
    network::NetworkMonitor,
    storage::{MediaStore, MediaWriteHandle},
};
use core_catalog::{DownloadRecord, LocalStore, Track, TrackId};
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Transient per-track download state. Never persisted.
///
/// `is_downloading` and `is_downloaded` are mutually exclusive by
/// construction: the only constructors are the three states below.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// Progress fraction in `[0, 1]`. Monotonically non-decreasing while a
    /// transfer is running.
    pub fraction: f32,
    pub is_downloading: bool,
    pub is_downloaded: bool,
}

impl DownloadProgress {
    /// No transfer running, no media present.
    pub fn idle() -> Self {
        Self {
            fraction: 0.0,
            is_downloading: false,
            is_downloaded: false,
        }
    }

    /// Transfer in flight.
    pub fn downloading(fraction: f32) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
            is_downloading: true,
            is_downloaded: false,
        }
    }

    /// Media committed to durable storage.
    pub fn downloaded() -> Self {
        Self {
            fraction: 1.0,
            is_downloading: false,
            is_downloaded: true,
        }
    }
}

struct ActiveDownload {
    progress_tx: watch::Sender<DownloadProgress>,
    cancel: CancellationToken,
}

/// Orchestrates per-track media transfers.
pub struct DownloadManager {
    http: Arc<dyn HttpClient>,
    media: Arc<dyn MediaStore>,
    network: Arc<dyn NetworkMonitor>,
    store: LocalStore,
    event_bus: Option<Arc<EventBus>>,
    active: Mutex<HashMap<TrackId, ActiveDownload>>,
}

impl DownloadManager {
    pub fn new(
        http: Arc<dyn HttpClient>,
        media: Arc<dyn MediaStore>,
        network: Arc<dyn NetworkMonitor>,
        store: LocalStore,
    ) -> Self {
        Self {
            http,
            media,
            network,
            store,
            event_bus: None,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Attach an event bus for download lifecycle events.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Download(event)).ok();
        }
    }

    /// Whether durable media exists for the track.
    pub async fn is_downloaded(&self, track_id: TrackId) -> Result<bool> {
        Ok(self.store.download_record(track_id).await?.is_some())
    }

    /// Current transient progress for the track.
    pub async fn progress(&self, track_id: TrackId) -> Result<DownloadProgress> {
        if let Some(entry) = self.active.lock().await.get(&track_id) {
            return Ok(*entry.progress_tx.borrow());
        }
        if self.is_downloaded(track_id).await? {
            return Ok(DownloadProgress::downloaded());
        }
        Ok(DownloadProgress::idle())
    }

    /// Subscribe to progress updates for a running transfer.
    ///
    /// Returns `None` when no transfer is active for the track. Observers
    /// receive monotonically non-decreasing fractions followed by one
    /// terminal value (downloaded or idle).
    pub async fn progress_stream(
        &self,
        track_id: TrackId,
    ) -> Option<watch::Receiver<DownloadProgress>> {
        self.active
            .lock()
            .await
            .get(&track_id)
            .map(|entry| entry.progress_tx.subscribe())
    }

    /// Download a track for offline playback.
    ///
    /// Rejects before any side effect when the track has no audio URL, the
    /// device is offline, or a transfer for the track is already running.
    /// Returns the existing record unchanged if the track is already
    /// downloaded. On mid-transfer failure the staged data is discarded and
    /// progress resets to idle.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn download(&self, track: &Track) -> Result<DownloadRecord> {
        if let Some(existing) = self.store.download_record(track.id).await? {
            debug!("track already downloaded");
            return Ok(existing);
        }

        let url = track
            .audio_url
            .clone()
            .ok_or_else(|| DownloadError::NoAudioUrl(track.id.to_string()))?;

        if !self.network.is_online().await {
            return Err(DownloadError::Offline);
        }

        let cancel = CancellationToken::new();
        let (progress_tx, _) = watch::channel(DownloadProgress::downloading(0.0));
        {
            let mut active = self.active.lock().await;
            if active.contains_key(&track.id) {
                return Err(DownloadError::AlreadyInProgress(track.id.to_string()));
            }
            active.insert(
                track.id,
                ActiveDownload {
                    progress_tx: progress_tx.clone(),
                    cancel: cancel.clone(),
                },
            );
        }

        info!("download started");
        self.emit(DownloadEvent::Started {
            track_id: track.id.to_string(),
        });

        let outcome = self.run_transfer(track, &url, &cancel, &progress_tx).await;
        self.active.lock().await.remove(&track.id);

        match outcome {
            Ok(record) => {
                self.store.put_download_record(record.clone()).await?;
                progress_tx.send(DownloadProgress::downloaded()).ok();
                info!(byte_size = record.byte_size, "download completed");
                self.emit(DownloadEvent::Completed {
                    track_id: track.id.to_string(),
                    byte_size: record.byte_size,
                });
                Ok(record)
            }
            Err(err) => {
                progress_tx.send(DownloadProgress::idle()).ok();
                warn!(error = %err, "download failed");
                self.emit(DownloadEvent::Failed {
                    track_id: track.id.to_string(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn run_transfer(
        &self,
        track: &Track,
        url: &str,
        cancel: &CancellationToken,
        progress_tx: &watch::Sender<DownloadProgress>,
    ) -> Result<DownloadRecord> {
        let mut handle = self.media.begin_write(&track.id.to_string()).await?;

        let (reported_size, mut stream) = match self.http.download_stream(url).await {
            Ok(pair) => pair,
            Err(err) => {
                handle.abort().await.ok();
                return Err(DownloadError::TransferFailed(err.to_string()));
            }
        };

        // Server-reported size wins; catalog file size is the fallback for
        // progress estimation. Neither being known keeps the fraction at 0
        // until commit.
        let expected = reported_size
            .filter(|size| *size > 0)
            .or_else(|| (track.file_size > 0).then_some(track.file_size));

        let mut written: u64 = 0;
        let mut last_fraction: f32 = 0.0;

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => {
                    handle.abort().await.ok();
                    return Err(DownloadError::Aborted);
                }
                chunk = stream.next_chunk() => chunk,
            };

            let chunk = match chunk {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(err) => {
                    handle.abort().await.ok();
                    return Err(DownloadError::TransferFailed(err.to_string()));
                }
            };

            written += chunk.len() as u64;
            if let Err(err) = handle.write_chunk(chunk).await {
                handle.abort().await.ok();
                return Err(DownloadError::TransferFailed(err.to_string()));
            }

            if let Some(expected) = expected {
                let fraction = (written as f32 / expected as f32).clamp(0.0, 1.0);
                // Guard monotonicity even if the size estimate was low.
                if fraction > last_fraction {
                    last_fraction = fraction;
                    progress_tx.send(DownloadProgress::downloading(fraction)).ok();
                    self.emit(DownloadEvent::Progress {
                        track_id: track.id.to_string(),
                        fraction,
                    });
                }
            }
        }

        let stored = handle
            .commit()
            .await
            .map_err(|err| DownloadError::TransferFailed(err.to_string()))?;

        Ok(DownloadRecord {
            track_id: track.id,
            local_uri: stored.local_uri,
            downloaded_at: chrono::Utc::now(),
            byte_size: stored.byte_size,
            track: track.clone(),
        })
    }

    /// Delete downloaded media and its record.
    ///
    /// Aborts a running transfer for the track first. Idempotent: deleting a
    /// track that was never downloaded returns `Ok(false)`.
    #[instrument(skip(self), fields(track_id = %track_id))]
    pub async fn delete(&self, track_id: TrackId) -> Result<bool> {
        let aborted = {
            let active = self.active.lock().await;
            match active.get(&track_id) {
                Some(entry) => {
                    entry.cancel.cancel();
                    true
                }
                None => false,
            }
        };
        if aborted {
            debug!("aborted in-flight transfer");
        }

        self.media.remove(&track_id.to_string()).await?;
        let removed = self.store.remove_download_record(track_id).await?;

        if removed || aborted {
            self.emit(DownloadEvent::Deleted {
                track_id: track_id.to_string(),
            });
        }
        Ok(removed || aborted)
    }
}
