//! Integration tests for the download manager with scripted HTTP and media
//! bridges. The central claim under test: a transfer either commits a full
//! record or leaves no trace at all.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{ByteStream, HttpClient, HttpRequest, HttpResponse};
use bridge_traits::network::{NetworkChangeStream, NetworkMonitor, NetworkStatus};
use bridge_traits::storage::{MediaStore, MediaWriteHandle, SettingsStore, StoredMedia};
use bytes::Bytes;
use core_catalog::{LocalStore, Mood, Track, TrackId};
use core_download::{DownloadError, DownloadManager, DownloadProgress};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// =============================================================================
// Scripted bridges
// =============================================================================

#[derive(Default)]
struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.values.lock().unwrap().keys().cloned().collect())
    }
}

struct FakeNetwork {
    online: AtomicBool,
}

struct ClosedChangeStream;

#[async_trait]
impl NetworkChangeStream for ClosedChangeStream {
    async fn next(&mut self) -> Option<NetworkStatus> {
        None
    }
}

#[async_trait]
impl NetworkMonitor for FakeNetwork {
    async fn current_status(&self) -> BridgeResult<NetworkStatus> {
        Ok(if self.online.load(Ordering::SeqCst) {
            NetworkStatus::Connected
        } else {
            NetworkStatus::Disconnected
        })
    }

    async fn subscribe_changes(&self) -> BridgeResult<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(ClosedChangeStream))
    }
}

/// HTTP client serving a scripted chunk sequence, optionally failing after a
/// given number of chunks.
struct ScriptedHttp {
    chunks: Vec<Bytes>,
    reported_size: Option<u64>,
    fail_after: Option<usize>,
}

struct ScriptedStream {
    chunks: Vec<Bytes>,
    index: usize,
    fail_after: Option<usize>,
}

#[async_trait]
impl ByteStream for ScriptedStream {
    async fn next_chunk(&mut self) -> BridgeResult<Option<Bytes>> {
        if let Some(limit) = self.fail_after {
            if self.index >= limit {
                return Err(BridgeError::NetworkUnreachable(
                    "connection reset mid-transfer".to_string(),
                ));
            }
        }
        let chunk = self.chunks.get(self.index).cloned();
        self.index += 1;
        Ok(chunk)
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable("execute not scripted".to_string()))
    }

    async fn download_stream(
        &self,
        _url: &str,
    ) -> BridgeResult<(Option<u64>, Box<dyn ByteStream>)> {
        Ok((
            self.reported_size,
            Box::new(ScriptedStream {
                chunks: self.chunks.clone(),
                index: 0,
                fail_after: self.fail_after,
            }),
        ))
    }
}

/// HTTP client whose stream yields one chunk, signals the test, then blocks
/// until released. Lets a test act while a transfer is provably in flight.
struct GatedHttp {
    first_chunk_sent: Arc<Notify>,
    gate: Arc<Notify>,
}

struct GatedStream {
    yielded: bool,
    first_chunk_sent: Arc<Notify>,
    gate: Arc<Notify>,
}

#[async_trait]
impl ByteStream for GatedStream {
    async fn next_chunk(&mut self) -> BridgeResult<Option<Bytes>> {
        if !self.yielded {
            self.yielded = true;
            return Ok(Some(Bytes::from(vec![0u8; 512])));
        }
        self.first_chunk_sent.notify_one();
        self.gate.notified().await;
        Ok(None)
    }
}

#[async_trait]
impl HttpClient for GatedHttp {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable("execute not scripted".to_string()))
    }

    async fn download_stream(
        &self,
        _url: &str,
    ) -> BridgeResult<(Option<u64>, Box<dyn ByteStream>)> {
        Ok((
            Some(2048),
            Box::new(GatedStream {
                yielded: false,
                first_chunk_sent: Arc::clone(&self.first_chunk_sent),
                gate: Arc::clone(&self.gate),
            }),
        ))
    }
}

/// Media store that tracks staged and committed files.
#[derive(Default)]
struct MediaState {
    committed: Mutex<HashMap<String, u64>>,
    aborts: AtomicUsize,
}

#[derive(Default)]
struct FakeMedia {
    state: Arc<MediaState>,
}

impl FakeMedia {
    fn committed_bytes(&self, media_key: &str) -> Option<u64> {
        self.state.committed.lock().unwrap().get(media_key).copied()
    }

    fn abort_count(&self) -> usize {
        self.state.aborts.load(Ordering::SeqCst)
    }
}

struct FakeWriteHandle {
    media_key: String,
    written: u64,
    state: Arc<MediaState>,
}

#[async_trait]
impl MediaWriteHandle for FakeWriteHandle {
    async fn write_chunk(&mut self, chunk: Bytes) -> BridgeResult<()> {
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> BridgeResult<StoredMedia> {
        self.state
            .committed
            .lock()
            .unwrap()
            .insert(self.media_key.clone(), self.written);
        Ok(StoredMedia {
            local_uri: format!("file:///media/{}", self.media_key),
            byte_size: self.written,
        })
    }

    async fn abort(self: Box<Self>) -> BridgeResult<()> {
        self.state.aborts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl MediaStore for FakeMedia {
    async fn begin_write(&self, media_key: &str) -> BridgeResult<Box<dyn MediaWriteHandle>> {
        Ok(Box::new(FakeWriteHandle {
            media_key: media_key.to_string(),
            written: 0,
            state: Arc::clone(&self.state),
        }))
    }

    async fn remove(&self, media_key: &str) -> BridgeResult<()> {
        self.state.committed.lock().unwrap().remove(media_key);
        Ok(())
    }

    async fn contains(&self, media_key: &str) -> BridgeResult<bool> {
        Ok(self.state.committed.lock().unwrap().contains_key(media_key))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn track(file_size: u64) -> Track {
    Track {
        id: TrackId::new(),
        title: "Sacred Rhythm".to_string(),
        mood: Mood::Drums,
        duration: 330,
        is_premium: true,
        is_featured: false,
        audio_url: Some("https://cdn.example/sacred-rhythm.mp3".to_string()),
        preview_range: None,
        file_size,
        play_count: 0,
        thumbnail_color: None,
    }
}

fn chunks(sizes: &[usize]) -> Vec<Bytes> {
    sizes
        .iter()
        .map(|size| Bytes::from(vec![0u8; *size]))
        .collect()
}

struct Harness {
    media: Arc<FakeMedia>,
    store: LocalStore,
    bus: core_runtime::events::EventBus,
    manager: Arc<DownloadManager>,
}

fn harness(http: impl HttpClient + 'static, online: bool) -> Harness {
    let media = Arc::new(FakeMedia::default());
    let store = LocalStore::new(Arc::new(MemorySettings::default()));
    let bus = core_runtime::events::EventBus::default();
    let manager = Arc::new(
        DownloadManager::new(
            Arc::new(http),
            media.clone(),
            Arc::new(FakeNetwork {
                online: AtomicBool::new(online),
            }),
            store.clone(),
        )
        .with_event_bus(Arc::new(bus.clone())),
    );
    Harness {
        media,
        store,
        bus,
        manager,
    }
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn successful_download_commits_media_and_record() {
    let h = harness(
        ScriptedHttp {
            chunks: chunks(&[1000, 1000, 48]),
            reported_size: Some(2048),
            fail_after: None,
        },
        true,
    );
    let track = track(2048);

    let record = h.manager.download(&track).await.unwrap();

    assert_eq!(record.byte_size, 2048);
    assert_eq!(record.local_uri, format!("file:///media/{}", track.id));
    assert_eq!(h.media.committed_bytes(&track.id.to_string()), Some(2048));
    assert!(h.store.download_record(track.id).await.unwrap().is_some());
    assert_eq!(
        h.manager.progress(track.id).await.unwrap(),
        DownloadProgress::downloaded()
    );
}

#[tokio::test]
async fn repeated_download_returns_the_existing_record_unchanged() {
    let h = harness(
        ScriptedHttp {
            chunks: chunks(&[512]),
            reported_size: Some(512),
            fail_after: None,
        },
        true,
    );
    let track = track(512);

    let first = h.manager.download(&track).await.unwrap();
    let second = h.manager.download(&track).await.unwrap();

    assert_eq!(first.downloaded_at, second.downloaded_at);
    assert_eq!(h.media.abort_count(), 0);
}

// =============================================================================
// Atomicity
// =============================================================================

#[tokio::test]
async fn mid_transfer_failure_leaves_no_partial_state() {
    let h = harness(
        ScriptedHttp {
            chunks: chunks(&[1000, 1000, 48]),
            reported_size: Some(2048),
            fail_after: Some(2),
        },
        true,
    );
    let track = track(2048);

    let err = h.manager.download(&track).await.unwrap_err();

    assert!(matches!(err, DownloadError::TransferFailed(_)));
    assert_eq!(h.media.abort_count(), 1);
    assert!(h.media.committed_bytes(&track.id.to_string()).is_none());
    assert!(h.store.download_record(track.id).await.unwrap().is_none());
    assert_eq!(
        h.manager.progress(track.id).await.unwrap(),
        DownloadProgress::idle()
    );
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn offline_download_is_rejected_before_any_side_effect() {
    let h = harness(
        ScriptedHttp {
            chunks: chunks(&[512]),
            reported_size: Some(512),
            fail_after: None,
        },
        false,
    );
    let track = track(512);

    let err = h.manager.download(&track).await.unwrap_err();

    assert!(matches!(err, DownloadError::Offline));
    assert_eq!(h.media.abort_count(), 0);
    assert!(h.store.download_record(track.id).await.unwrap().is_none());
}

#[tokio::test]
async fn track_without_audio_url_is_rejected() {
    let h = harness(
        ScriptedHttp {
            chunks: vec![],
            reported_size: None,
            fail_after: None,
        },
        true,
    );
    let mut track = track(512);
    track.audio_url = None;

    let err = h.manager.download(&track).await.unwrap_err();
    assert!(matches!(err, DownloadError::NoAudioUrl(_)));
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn delete_removes_media_and_record_and_is_idempotent() {
    let h = harness(
        ScriptedHttp {
            chunks: chunks(&[512]),
            reported_size: Some(512),
            fail_after: None,
        },
        true,
    );
    let track = track(512);
    h.manager.download(&track).await.unwrap();

    assert!(h.manager.delete(track.id).await.unwrap());
    assert!(h.media.committed_bytes(&track.id.to_string()).is_none());
    assert!(h.store.download_record(track.id).await.unwrap().is_none());

    assert!(!h.manager.delete(track.id).await.unwrap());
}

#[tokio::test]
async fn delete_during_a_running_transfer_aborts_and_reverts() {
    let first_chunk_sent = Arc::new(Notify::new());
    let gate = Arc::new(Notify::new());
    let h = harness(
        GatedHttp {
            first_chunk_sent: Arc::clone(&first_chunk_sent),
            gate: Arc::clone(&gate),
        },
        true,
    );
    let track = track(2048);

    let transfer = tokio::spawn({
        let manager = Arc::clone(&h.manager);
        let track = track.clone();
        async move { manager.download(&track).await }
    });

    // Wait until the first chunk is staged and the stream is blocked.
    first_chunk_sent.notified().await;
    assert!(h.manager.progress(track.id).await.unwrap().is_downloading);

    assert!(h.manager.delete(track.id).await.unwrap());

    let err = transfer.await.unwrap().unwrap_err();
    assert!(matches!(err, DownloadError::Aborted));
    assert_eq!(h.media.abort_count(), 1);
    assert!(h.media.committed_bytes(&track.id.to_string()).is_none());
    assert!(h.store.download_record(track.id).await.unwrap().is_none());
    assert_eq!(
        h.manager.progress(track.id).await.unwrap(),
        DownloadProgress::idle()
    );
}

// =============================================================================
// Progress reporting
// =============================================================================

#[tokio::test]
async fn progress_events_are_monotonically_non_decreasing() {
    let h = harness(
        ScriptedHttp {
            chunks: chunks(&[500, 500, 500, 548]),
            reported_size: Some(2048),
            fail_after: None,
        },
        true,
    );
    let track = track(2048);
    let mut events = h.bus.subscribe();

    h.manager.download(&track).await.unwrap();

    let mut fractions = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let core_runtime::events::CoreEvent::Download(
            core_runtime::events::DownloadEvent::Progress { fraction, .. },
        ) = event
        {
            fractions.push(fraction);
        }
    }
    assert!(!fractions.is_empty());
    assert!(fractions.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!((fractions.last().unwrap() - 1.0).abs() < f32::EPSILON);
}

#[tokio::test]
async fn catalog_file_size_backs_progress_when_server_reports_none() {
    let h = harness(
        ScriptedHttp {
            chunks: chunks(&[1024, 1024]),
            reported_size: None,
            fail_after: None,
        },
        true,
    );
    let track = track(2048);
    let mut events = h.bus.subscribe();

    h.manager.download(&track).await.unwrap();

    let saw_progress = std::iter::from_fn(|| events.try_recv().ok()).any(|event| {
        matches!(
            event,
            core_runtime::events::CoreEvent::Download(
                core_runtime::events::DownloadEvent::Progress { .. }
            )
        )
    });
    assert!(saw_progress);
}
