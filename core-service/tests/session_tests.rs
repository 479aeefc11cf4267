//! End-to-end tests for the app session: startup duties, the connectivity
//! watcher, and the locally-authoritative collection actions.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::network::{NetworkChangeStream, NetworkMonitor, NetworkStatus};
use bridge_traits::playback::{
    AudioBackend, AudioSessionId, AudioSourceUri, AudioStatus, AudioStatusStream,
};
use bridge_traits::storage::{MediaStore, MediaWriteHandle, SettingsStore, StoredMedia};
use bytes::Bytes;
use chrono::Utc;
use core_catalog::{LocalStore, Mood, Track, TrackId, UserId, UserProfile};
use core_service::{AppConfig, AppDependencies, AppSession};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

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

/// Network monitor whose status the test flips and whose change stream the
/// test feeds by hand.
struct PushNetwork {
    online: AtomicBool,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<NetworkStatus>>>,
}

impl PushNetwork {
    fn new(online: bool) -> (Arc<Self>, mpsc::UnboundedSender<NetworkStatus>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                online: AtomicBool::new(online),
                receiver: Mutex::new(Some(rx)),
            }),
            tx,
        )
    }

    fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

struct PushedChangeStream(mpsc::UnboundedReceiver<NetworkStatus>);

#[async_trait]
impl NetworkChangeStream for PushedChangeStream {
    async fn next(&mut self) -> Option<NetworkStatus> {
        self.0.recv().await
    }
}

#[async_trait]
impl NetworkMonitor for PushNetwork {
    async fn current_status(&self) -> BridgeResult<NetworkStatus> {
        Ok(if self.online.load(Ordering::SeqCst) {
            NetworkStatus::Connected
        } else {
            NetworkStatus::Disconnected
        })
    }

    async fn subscribe_changes(&self) -> BridgeResult<Box<dyn NetworkChangeStream>> {
        let rx = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .expect("change stream already taken");
        Ok(Box::new(PushedChangeStream(rx)))
    }
}

/// Routed fake server, keyed by `"METHOD /path"`; unrouted paths answer 404.
#[derive(Default)]
struct RoutedHttp {
    routes: Mutex<HashMap<String, (u16, serde_json::Value)>>,
    requests: Mutex<Vec<String>>,
}

impl RoutedHttp {
    fn route(&self, method: &str, path: &str, status: u16, body: serde_json::Value) {
        self.routes
            .lock()
            .unwrap()
            .insert(format!("{} {}", method, path), (status, body));
    }

    fn count(&self, key: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.as_str() == key)
            .count()
    }
}

fn method_name(method: HttpMethod) -> &'static str {
    match method {
        HttpMethod::Get => "GET",
        HttpMethod::Post => "POST",
        HttpMethod::Put => "PUT",
        HttpMethod::Delete => "DELETE",
    }
}

#[async_trait]
impl HttpClient for RoutedHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let path = request
            .url
            .strip_prefix("https://sadaa.test")
            .unwrap_or(&request.url)
            .split('?')
            .next()
            .unwrap()
            .to_string();
        let key = format!("{} {}", method_name(request.method), path);
        self.requests.lock().unwrap().push(key.clone());

        let entry = self.routes.lock().unwrap().get(&key).cloned();
        let (status, body) = entry.unwrap_or((404, serde_json::json!({"detail": "Not Found"})));
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(serde_json::to_vec(&body).unwrap()),
        })
    }

    async fn download_stream(
        &self,
        _url: &str,
    ) -> BridgeResult<(Option<u64>, Box<dyn ByteStream>)> {
        Err(BridgeError::NotAvailable("no media in this fake".to_string()))
    }
}

/// Audio backend that accepts every call and produces no status ticks.
#[derive(Default)]
struct NullAudio;

struct EndedStream;

#[async_trait]
impl AudioStatusStream for EndedStream {
    async fn next(&mut self) -> Option<AudioStatus> {
        None
    }
}

#[async_trait]
impl AudioBackend for NullAudio {
    async fn load(&self, _source: &AudioSourceUri) -> BridgeResult<AudioSessionId> {
        Ok(AudioSessionId::new())
    }

    async fn play(&self, _session: AudioSessionId) -> BridgeResult<()> {
        Ok(())
    }

    async fn pause(&self, _session: AudioSessionId) -> BridgeResult<()> {
        Ok(())
    }

    async fn seek(&self, _session: AudioSessionId, _position_millis: u64) -> BridgeResult<()> {
        Ok(())
    }

    async fn stop(&self, _session: AudioSessionId) -> BridgeResult<()> {
        Ok(())
    }

    async fn unload(&self, _session: AudioSessionId) -> BridgeResult<()> {
        Ok(())
    }

    async fn status_stream(
        &self,
        _session: AudioSessionId,
    ) -> BridgeResult<Box<dyn AudioStatusStream>> {
        Ok(Box::new(EndedStream))
    }
}

#[derive(Default)]
struct NullMedia;

struct NullWriteHandle(u64);

#[async_trait]
impl MediaWriteHandle for NullWriteHandle {
    async fn write_chunk(&mut self, chunk: Bytes) -> BridgeResult<()> {
        self.0 += chunk.len() as u64;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> BridgeResult<StoredMedia> {
        Ok(StoredMedia {
            local_uri: "file:///media/null".to_string(),
            byte_size: self.0,
        })
    }

    async fn abort(self: Box<Self>) -> BridgeResult<()> {
        Ok(())
    }
}

#[async_trait]
impl MediaStore for NullMedia {
    async fn begin_write(&self, _media_key: &str) -> BridgeResult<Box<dyn MediaWriteHandle>> {
        Ok(Box::new(NullWriteHandle(0)))
    }

    async fn remove(&self, _media_key: &str) -> BridgeResult<()> {
        Ok(())
    }

    async fn contains(&self, _media_key: &str) -> BridgeResult<bool> {
        Ok(false)
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn track(title: &str, mood: Mood) -> Track {
    Track {
        id: TrackId::new(),
        title: title.to_string(),
        mood,
        duration: 200,
        is_premium: false,
        is_featured: false,
        audio_url: Some("https://cdn.example/a.mp3".to_string()),
        preview_range: None,
        file_size: 0,
        play_count: 0,
        thumbnail_color: None,
    }
}

fn profile_json() -> serde_json::Value {
    serde_json::to_value(UserProfile {
        id: UserId(Uuid::new_v4()),
        device_id: "device-123".to_string(),
        is_subscribed: false,
        created_at: Utc::now(),
    })
    .unwrap()
}

struct Harness {
    http: Arc<RoutedHttp>,
    network: Arc<PushNetwork>,
    status_tx: mpsc::UnboundedSender<NetworkStatus>,
    store: LocalStore,
    session: Arc<AppSession>,
}

fn harness(online: bool) -> Harness {
    let http = Arc::new(RoutedHttp::default());
    let (network, status_tx) = PushNetwork::new(online);
    let settings: Arc<MemorySettings> = Arc::new(MemorySettings::default());
    let store = LocalStore::new(settings.clone());

    let deps = AppDependencies::new(
        http.clone(),
        network.clone(),
        Arc::new(NullAudio),
        settings,
        Arc::new(NullMedia),
    );
    let session = Arc::new(AppSession::new(
        deps,
        AppConfig::new("https://sadaa.test", "device-123"),
    ));
    Harness {
        http,
        network,
        status_tx,
        store,
        session,
    }
}

fn route_empty_reconcile(http: &RoutedHttp) {
    http.route("GET", "/api/instrumentals", 200, serde_json::json!([]));
    http.route(
        "GET",
        "/api/instrumentals/featured",
        200,
        serde_json::json!([]),
    );
    http.route("POST", "/api/users", 200, profile_json());
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// =============================================================================
// Startup & connectivity
// =============================================================================

#[tokio::test]
async fn online_startup_registers_the_user_and_reconciles() {
    let h = harness(true);
    route_empty_reconcile(&h.http);
    let fresh = vec![track("Morning Dhikr", Mood::Calm)];
    h.http.route(
        "GET",
        "/api/instrumentals",
        200,
        serde_json::to_value(&fresh).unwrap(),
    );

    h.session.start().await.unwrap();

    assert!(h.store.load_profile().await.unwrap().is_some());
    assert_eq!(h.session.catalog().await.unwrap(), fresh);
    h.session.shutdown().await;
}

#[tokio::test]
async fn offline_startup_serves_the_cached_snapshot() {
    let h = harness(false);
    let cached = vec![track("Cached", Mood::Soft)];
    h.store.save_catalog(&cached).await.unwrap();

    h.session.start().await.unwrap();

    assert_eq!(h.session.catalog().await.unwrap(), cached);
    assert_eq!(h.http.count("GET /api/instrumentals"), 0);
    h.session.shutdown().await;
}

#[tokio::test]
async fn coming_online_triggers_a_reconciliation_pass() {
    let h = harness(false);
    route_empty_reconcile(&h.http);
    h.session.start().await.unwrap();
    assert_eq!(h.http.count("GET /api/instrumentals"), 0);

    h.network.set_online(true);
    h.status_tx.send(NetworkStatus::Connected).unwrap();
    settle().await;

    assert_eq!(h.http.count("GET /api/instrumentals"), 1);
    assert!(h.store.load_profile().await.unwrap().is_some());
    h.session.shutdown().await;
}

#[tokio::test]
async fn duplicate_connectivity_reports_are_debounced() {
    let h = harness(true);
    route_empty_reconcile(&h.http);
    h.session.start().await.unwrap();
    let after_startup = h.http.count("GET /api/instrumentals");

    // Same value again: suppressed.
    h.status_tx.send(NetworkStatus::Connected).unwrap();
    settle().await;
    assert_eq!(h.http.count("GET /api/instrumentals"), after_startup);

    // A real offline/online cycle reconciles once more.
    h.network.set_online(false);
    h.status_tx.send(NetworkStatus::Disconnected).unwrap();
    settle().await;
    h.network.set_online(true);
    h.status_tx.send(NetworkStatus::Connected).unwrap();
    settle().await;
    assert_eq!(h.http.count("GET /api/instrumentals"), after_startup + 1);
    h.session.shutdown().await;
}

// =============================================================================
// Local collections
// =============================================================================

#[tokio::test]
async fn favorites_behave_as_a_set() {
    let h = harness(false);
    h.session.start().await.unwrap();
    let a = track("Peaceful Heart", Mood::Soft);

    assert!(h.session.add_favorite(&a).await.unwrap());
    assert!(!h.session.add_favorite(&a).await.unwrap());
    assert!(h.session.is_favorite(a.id).await.unwrap());
    assert_eq!(h.session.favorites().await.unwrap().len(), 1);

    assert!(h.session.remove_favorite(a.id).await.unwrap());
    assert!(!h.session.remove_favorite(a.id).await.unwrap());
    h.session.shutdown().await;
}

#[tokio::test]
async fn playlist_actions_deduplicate_and_round_trip() {
    let h = harness(false);
    h.session.start().await.unwrap();
    let a = track("Gentle Breeze", Mood::Calm);

    let playlist = h
        .session
        .create_playlist("Focus", "deep work", "#4A3463")
        .await
        .unwrap();
    assert!(h.session.add_to_playlist(playlist.id, a.id).await.unwrap());
    assert!(!h.session.add_to_playlist(playlist.id, a.id).await.unwrap());

    let stored = h.session.playlists().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].track_ids, vec![a.id]);

    assert!(h
        .session
        .remove_from_playlist(playlist.id, a.id)
        .await
        .unwrap());
    assert!(h.session.delete_playlist(playlist.id).await.unwrap());
    assert!(!h.session.delete_playlist(playlist.id).await.unwrap());
    h.session.shutdown().await;
}

// =============================================================================
// Offline catalog queries
// =============================================================================

#[tokio::test]
async fn search_and_mood_filters_work_offline_over_the_snapshot() {
    let h = harness(false);
    let catalog = vec![
        track("Morning Dhikr", Mood::Calm),
        track("Drums of Devotion", Mood::Drums),
        track("Night of Peace", Mood::Calm),
    ];
    h.store.save_catalog(&catalog).await.unwrap();
    h.session.start().await.unwrap();

    let hits = h.session.search_catalog("dRuMs").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Drums of Devotion");

    let calm = h.session.tracks_by_mood(Some(&Mood::Calm)).await.unwrap();
    assert_eq!(calm.len(), 2);

    let all = h.session.tracks_by_mood(None).await.unwrap();
    assert_eq!(all.len(), 3);
    h.session.shutdown().await;
}

#[tokio::test]
async fn featured_resolves_ids_in_banner_order() {
    let h = harness(false);
    let catalog = vec![
        track("First", Mood::Calm),
        track("Second", Mood::Soft),
        track("Third", Mood::Calm),
    ];
    h.store.save_catalog(&catalog).await.unwrap();
    // Reversed order plus an id no longer in the catalog.
    h.store
        .save_featured(&[catalog[2].id, TrackId::new(), catalog[0].id])
        .await
        .unwrap();
    h.session.start().await.unwrap();

    let featured = h.session.featured().await.unwrap();
    let titles: Vec<&str> = featured.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Third", "First"]);
    h.session.shutdown().await;
}

#[tokio::test]
async fn mood_filters_fall_back_to_the_builtin_vocabulary_offline() {
    let h = harness(false);
    h.session.start().await.unwrap();

    let moods = h.session.mood_filters().await.unwrap();
    assert_eq!(moods[0], "All");
    assert!(moods.contains(&"Calm".to_string()));
    h.session.shutdown().await;
}
