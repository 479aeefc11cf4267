//! # Player Controller
//!
//! The playback state machine: owns the current track, the play queue,
//! shuffle/loop flags, preview windows, and the position reported by the
//! host audio engine.
//!
//! ## Invariants
//!
//! - At most one audio session is loaded at any time. Starting a new track
//!   always stops and unloads the previous session first.
//! - The session mutates only through the action methods here, behind one
//!   mutex; callers observe it through [`PlayerController::snapshot`].
//! - Entitlement is checked before any state changes; a denial leaves the
//!   session exactly as it was.
//!
//! Engine failures reset the session to idle with a surfaced error reason
//! and are never retried automatically.

use crate::entitlement::{DenyReason, EntitlementContext, EntitlementGate, PlayDecision};
use crate::error::{PlaybackError, Result};
use crate::queue::{Direction, PlaybackQueue};
use bridge_traits::{
    network::NetworkMonitor,
    playback::{AudioBackend, AudioSessionId, AudioSourceUri, AudioStatus},
};
use core_catalog::{LocalStore, PlayerPrefs, PreviewRange, Track, TrackId};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Position threshold for the "previous restarts the current track" rule.
/// Strictly greater than this restarts; at or below it moves the index.
const RESTART_THRESHOLD_MILLIS: u64 = 3000;

/// Lifecycle state of the playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Playing,
    Paused,
    Finished,
}

/// Preview window in milliseconds, set only while preview mode is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewWindow {
    pub start_millis: u64,
    pub end_millis: u64,
}

impl From<PreviewRange> for PreviewWindow {
    fn from(range: PreviewRange) -> Self {
        Self {
            start_millis: range.start_millis(),
            end_millis: range.end_millis(),
        }
    }
}

/// Read-only snapshot of the playback session.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub current_track: Option<Track>,
    pub state: SessionState,
    pub is_buffering: bool,
    pub position_millis: u64,
    pub duration_millis: u64,
    pub loop_enabled: bool,
    pub shuffle_enabled: bool,
    /// Present exactly when preview mode is active.
    pub preview: Option<PreviewWindow>,
    /// Surfaced playback error, cleared on the next successful action.
    pub error: Option<String>,
}

impl PlaybackSession {
    fn idle(prefs: PlayerPrefs) -> Self {
        Self {
            current_track: None,
            state: SessionState::Idle,
            is_buffering: false,
            position_millis: 0,
            duration_millis: 0,
            loop_enabled: prefs.loop_enabled,
            shuffle_enabled: prefs.shuffle_enabled,
            preview: None,
            error: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == SessionState::Playing
    }
}

struct Inner {
    session: PlaybackSession,
    queue: PlaybackQueue,
    audio: Option<AudioSessionId>,
    /// Bumped on every teardown; stale status-watcher ticks check it.
    generation: u64,
    subscribed: bool,
}

enum TickAction {
    None,
    StopPreview,
    Finished,
}

/// Drives the host audio engine and owns all playback state.
pub struct PlayerController {
    backend: Arc<dyn AudioBackend>,
    network: Arc<dyn NetworkMonitor>,
    store: LocalStore,
    event_bus: Option<Arc<EventBus>>,
    inner: Mutex<Inner>,
}

impl PlayerController {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        network: Arc<dyn NetworkMonitor>,
        store: LocalStore,
    ) -> Self {
        Self {
            backend,
            network,
            store,
            event_bus: None,
            inner: Mutex::new(Inner {
                session: PlaybackSession::idle(PlayerPrefs::default()),
                queue: PlaybackQueue::default(),
                audio: None,
                generation: 0,
                subscribed: false,
            }),
        }
    }

    /// Attach an event bus for playback events.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Playback(event)).ok();
        }
    }

    /// Restore persisted loop/shuffle flags. Called once at startup.
    pub async fn restore_prefs(&self) -> Result<()> {
        let prefs = self.store.load_prefs().await?;
        let mut inner = self.inner.lock().await;
        inner.session.loop_enabled = prefs.loop_enabled;
        inner.session.shuffle_enabled = prefs.shuffle_enabled;
        Ok(())
    }

    /// Update the subscription flag used for entitlement checks.
    pub async fn set_subscribed(&self, subscribed: bool) {
        self.inner.lock().await.subscribed = subscribed;
    }

    /// Read-only copy of the current session.
    pub async fn snapshot(&self) -> PlaybackSession {
        self.inner.lock().await.session.clone()
    }

    /// Current queue contents and index.
    pub async fn queue_snapshot(&self) -> (Vec<Track>, usize) {
        let inner = self.inner.lock().await;
        (inner.queue.tracks().to_vec(), inner.queue.index())
    }

    /// Entitlement decision for a track given current download, connectivity
    /// and subscription state.
    pub async fn can_play(&self, track: &Track) -> Result<PlayDecision> {
        let downloaded = self.store.download_record(track.id).await?.is_some();
        let online = self.network.is_online().await;
        let subscribed = self.inner.lock().await.subscribed;
        Ok(EntitlementGate::can_play(
            track,
            EntitlementContext {
                downloaded,
                online,
                subscribed,
            },
        ))
    }

    /// Start full playback of a track.
    ///
    /// Entitlement is checked first; on denial the session is untouched and
    /// the denial is returned. The queue resolves to `queue` when given,
    /// otherwise to the default catalog queue (all tracks when subscribed,
    /// non-premium only otherwise), positioned at `track`.
    #[instrument(skip(self, track, queue), fields(track_id = %track.id))]
    pub async fn play_track(self: &Arc<Self>, track: &Track, queue: Option<Vec<Track>>) -> Result<()> {
        match self.can_play(track).await? {
            PlayDecision::Allowed => {}
            PlayDecision::PreviewOnly(_) => {
                return Err(PlaybackError::EntitlementDenied(
                    DenyReason::SubscriptionRequired,
                ))
            }
            PlayDecision::Denied(reason) => {
                return Err(PlaybackError::EntitlementDenied(reason))
            }
        }

        let tracks = match queue {
            Some(tracks) => tracks,
            None => self.default_queue().await?,
        };
        let queue = PlaybackQueue::positioned_at(tracks, track.id);
        self.start_resolved(track.clone(), Some(queue), None).await
    }

    /// Start preview playback of a track.
    ///
    /// Uses the explicit preview range when present, else the default
    /// first-30-seconds window. Playback starts at the window start and a
    /// watchdog stops it the moment the reported position reaches the window
    /// end or the media naturally finishes, whichever comes first.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn play_preview(self: &Arc<Self>, track: &Track) -> Result<()> {
        match self.can_play(track).await? {
            PlayDecision::Allowed | PlayDecision::PreviewOnly(_) => {}
            PlayDecision::Denied(reason) => {
                return Err(PlaybackError::EntitlementDenied(reason))
            }
        }

        let window = PreviewWindow::from(track.preview_window());
        let queue = PlaybackQueue::new(vec![track.clone()], 0);
        self.start_resolved(track.clone(), Some(queue), Some(window))
            .await
    }

    /// Pause playback. No-op when nothing is loaded.
    pub async fn pause(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.session.current_track.is_none() {
            return Ok(());
        }
        let Some(audio) = inner.audio else {
            return Ok(());
        };
        if inner.session.state != SessionState::Playing {
            return Ok(());
        }
        self.backend
            .pause(audio)
            .await
            .map_err(|e| PlaybackError::Engine(e.to_string()))?;
        inner.session.state = SessionState::Paused;
        if let Some(track) = &inner.session.current_track {
            self.emit(PlaybackEvent::Paused {
                track_id: track.id.to_string(),
            });
        }
        Ok(())
    }

    /// Resume playback. No-op when nothing is loaded.
    pub async fn resume(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.session.current_track.is_none() {
            return Ok(());
        }
        let Some(audio) = inner.audio else {
            return Ok(());
        };
        if inner.session.state != SessionState::Paused {
            return Ok(());
        }
        self.backend
            .play(audio)
            .await
            .map_err(|e| PlaybackError::Engine(e.to_string()))?;
        inner.session.state = SessionState::Playing;
        if let Some(track) = &inner.session.current_track {
            self.emit(PlaybackEvent::Resumed {
                track_id: track.id.to_string(),
            });
        }
        Ok(())
    }

    /// Seek to an absolute position, clamped to the track duration and, in
    /// preview mode, to the preview window.
    pub async fn seek_to(&self, position_millis: u64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.session.current_track.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        let Some(audio) = inner.audio else {
            return Err(PlaybackError::NoTrackLoaded);
        };
        let clamped = clamp_position(&inner.session, position_millis);
        self.backend
            .seek(audio, clamped)
            .await
            .map_err(|e| PlaybackError::Engine(e.to_string()))?;
        inner.session.position_millis = clamped;
        Ok(())
    }

    /// Advance to the next playable track in the queue.
    ///
    /// Returns the track now playing, or `None` when no playable candidate
    /// was found within one full pass over the queue (the session then drops
    /// to idle).
    #[instrument(skip(self))]
    pub async fn play_next(self: &Arc<Self>) -> Result<Option<Track>> {
        self.advance(Direction::Forward).await
    }

    /// Move to the previous track — or restart the current one when more
    /// than three seconds in. Restart-instead-of-retreat is deliberate UX.
    #[instrument(skip(self))]
    pub async fn play_previous(self: &Arc<Self>) -> Result<Option<Track>> {
        {
            let mut inner = self.inner.lock().await;
            if inner.session.position_millis > RESTART_THRESHOLD_MILLIS {
                if let Some(audio) = inner.audio {
                    self.backend
                        .seek(audio, 0)
                        .await
                        .map_err(|e| PlaybackError::Engine(e.to_string()))?;
                    inner.session.position_millis = 0;
                    debug!("restarted current track");
                    return Ok(inner.session.current_track.clone());
                }
            }
        }
        self.advance(Direction::Backward).await
    }

    async fn advance(self: &Arc<Self>, direction: Direction) -> Result<Option<Track>> {
        let online = self.network.is_online().await;
        let subscribed = self.inner.lock().await.subscribed;
        let downloaded: HashSet<TrackId> = self
            .store
            .load_download_index()
            .await?
            .into_keys()
            .collect();

        let next = {
            let mut inner = self.inner.lock().await;
            let shuffle = inner.session.shuffle_enabled;
            let mut rng = rand::thread_rng();
            inner
                .queue
                .advance_filtered(direction, shuffle, &mut rng, |track| {
                    EntitlementGate::can_play(
                        track,
                        EntitlementContext {
                            downloaded: downloaded.contains(&track.id),
                            online,
                            subscribed,
                        },
                    )
                    .allows_full_play()
                })
                .cloned()
        };

        match next {
            Some(track) => {
                self.start_resolved(track.clone(), None, None).await?;
                Ok(Some(track))
            }
            None => {
                debug!("no playable track in queue; going idle");
                self.go_idle(false).await;
                Ok(None)
            }
        }
    }

    /// Stop playback: tear down the audio session, clear the queue, reset to
    /// idle.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        self.go_idle(true).await;
        self.emit(PlaybackEvent::Stopped);
        Ok(())
    }

    /// Set the loop flag and persist it.
    pub async fn set_loop_enabled(&self, enabled: bool) -> Result<()> {
        let prefs = {
            let mut inner = self.inner.lock().await;
            inner.session.loop_enabled = enabled;
            PlayerPrefs {
                loop_enabled: inner.session.loop_enabled,
                shuffle_enabled: inner.session.shuffle_enabled,
            }
        };
        self.store.save_prefs(prefs).await?;
        Ok(())
    }

    /// Set the shuffle flag and persist it.
    pub async fn set_shuffle_enabled(&self, enabled: bool) -> Result<()> {
        let prefs = {
            let mut inner = self.inner.lock().await;
            inner.session.shuffle_enabled = enabled;
            PlayerPrefs {
                loop_enabled: inner.session.loop_enabled,
                shuffle_enabled: inner.session.shuffle_enabled,
            }
        };
        self.store.save_prefs(prefs).await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Default queue: the whole catalog for subscribers, non-premium tracks
    /// only for everyone else.
    async fn default_queue(&self) -> Result<Vec<Track>> {
        let subscribed = self.inner.lock().await.subscribed;
        let catalog = self.store.load_catalog().await?;
        Ok(if subscribed {
            catalog
        } else {
            catalog.into_iter().filter(|t| !t.is_premium).collect()
        })
    }

    /// Resolve the playable URI for a track: downloaded media wins over the
    /// streamable URL.
    async fn resolve_uri(&self, track: &Track) -> Result<AudioSourceUri> {
        if let Some(record) = self.store.download_record(track.id).await? {
            return Ok(AudioSourceUri::Local(record.local_uri));
        }
        if let Some(url) = &track.audio_url {
            return Ok(AudioSourceUri::Remote(url.clone()));
        }
        Err(PlaybackError::MediaUnavailable(track.id.to_string()))
    }

    async fn start_resolved(
        self: &Arc<Self>,
        track: Track,
        new_queue: Option<PlaybackQueue>,
        preview: Option<PreviewWindow>,
    ) -> Result<()> {
        // Resolve before touching any state so an unresolvable track leaves
        // the session untouched.
        let uri = self.resolve_uri(&track).await?;

        let mut inner = self.inner.lock().await;
        self.teardown_locked(&mut inner).await;
        let generation = inner.generation;

        if let Some(queue) = new_queue {
            inner.queue = queue;
        }

        let start_position = preview.map(|w| w.start_millis).unwrap_or(0);
        inner.session.current_track = Some(track.clone());
        inner.session.state = SessionState::Loading;
        inner.session.is_buffering = true;
        inner.session.position_millis = start_position;
        inner.session.duration_millis = track.duration_millis();
        inner.session.preview = preview;
        inner.session.error = None;

        let audio = match self.backend.load(&uri).await {
            Ok(audio) => audio,
            Err(e) => {
                let message = e.to_string();
                self.fail_locked(&mut inner, &message);
                return Err(PlaybackError::Engine(message));
            }
        };
        inner.audio = Some(audio);

        if start_position > 0 {
            if let Err(e) = self.backend.seek(audio, start_position).await {
                let message = e.to_string();
                self.backend.unload(audio).await.ok();
                inner.audio = None;
                self.fail_locked(&mut inner, &message);
                return Err(PlaybackError::Engine(message));
            }
        }

        if let Err(e) = self.backend.play(audio).await {
            let message = e.to_string();
            self.backend.unload(audio).await.ok();
            inner.audio = None;
            self.fail_locked(&mut inner, &message);
            return Err(PlaybackError::Engine(message));
        }

        inner.session.state = SessionState::Playing;
        inner.session.is_buffering = false;
        drop(inner);

        self.spawn_status_watcher(generation, audio);

        info!(preview = preview.is_some(), "playback started");
        self.emit(PlaybackEvent::TrackStarted {
            track_id: track.id.to_string(),
            preview: preview.is_some(),
        });
        Ok(())
    }

    /// Stop and unload any loaded audio session. Bumps the generation so
    /// in-flight status ticks for the old session are discarded.
    async fn teardown_locked(&self, inner: &mut Inner) {
        inner.generation += 1;
        if let Some(audio) = inner.audio.take() {
            if let Err(e) = self.backend.stop(audio).await {
                warn!(error = %e, "stop failed during teardown");
            }
            if let Err(e) = self.backend.unload(audio).await {
                warn!(error = %e, "unload failed during teardown");
            }
        }
    }

    fn fail_locked(&self, inner: &mut Inner, message: &str) {
        warn!(error = message, "playback failure; resetting to idle");
        let track_id = inner
            .session
            .current_track
            .as_ref()
            .map(|t| t.id.to_string());
        let prefs = PlayerPrefs {
            loop_enabled: inner.session.loop_enabled,
            shuffle_enabled: inner.session.shuffle_enabled,
        };
        inner.session = PlaybackSession::idle(prefs);
        inner.session.error = Some(message.to_string());
        self.emit(PlaybackEvent::Error {
            track_id,
            message: message.to_string(),
        });
    }

    async fn go_idle(&self, clear_queue: bool) {
        let mut inner = self.inner.lock().await;
        self.teardown_locked(&mut inner).await;
        let prefs = PlayerPrefs {
            loop_enabled: inner.session.loop_enabled,
            shuffle_enabled: inner.session.shuffle_enabled,
        };
        inner.session = PlaybackSession::idle(prefs);
        if clear_queue {
            inner.queue.clear();
        }
    }

    fn spawn_status_watcher(self: &Arc<Self>, generation: u64, audio: AudioSessionId) {
        let weak = Arc::downgrade(self);
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            let mut stream = match backend.status_stream(audio).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "failed to open status stream");
                    return;
                }
            };
            while let Some(status) = stream.next().await {
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                controller.handle_status(generation, status).await;
            }
        });
    }

    async fn handle_status(self: Arc<Self>, generation: u64, status: AudioStatus) {
        let action = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return; // stale tick from a torn-down session
            }

            if status.duration_millis > 0 {
                inner.session.duration_millis = status.duration_millis;
            }
            inner.session.is_buffering = status.is_buffering;
            inner.session.position_millis = clamp_position(&inner.session, status.position_millis);

            match inner.session.preview {
                Some(window)
                    if status.position_millis >= window.end_millis || status.did_just_finish =>
                {
                    TickAction::StopPreview
                }
                None if status.did_just_finish => TickAction::Finished,
                _ => TickAction::None,
            }
        };

        match action {
            TickAction::None => {}
            TickAction::StopPreview => self.stop_preview(generation).await,
            TickAction::Finished => self.finish_track(generation).await,
        }
    }

    /// Watchdog: halt preview playback at the window boundary.
    async fn stop_preview(self: &Arc<Self>, generation: u64) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return;
        }
        let Some(audio) = inner.audio else {
            return;
        };
        let Some(window) = inner.session.preview else {
            return;
        };
        if let Err(e) = self.backend.pause(audio).await {
            warn!(error = %e, "pause failed at preview boundary");
        }
        inner.session.state = SessionState::Paused;
        inner.session.position_millis = window.end_millis;
        if let Some(track) = &inner.session.current_track {
            info!("preview window reached its end");
            self.emit(PlaybackEvent::PreviewEnded {
                track_id: track.id.to_string(),
            });
        }
    }

    /// Natural end of media: loop the same track or auto-advance.
    ///
    /// A failed loop restart is an engine fault, not a cue to advance: the
    /// session resets to idle with the error surfaced.
    async fn finish_track(self: &Arc<Self>, generation: u64) {
        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return;
            }
            if let Some(track) = &inner.session.current_track {
                self.emit(PlaybackEvent::Completed {
                    track_id: track.id.to_string(),
                });
            }
            inner.session.state = SessionState::Finished;

            if inner.session.loop_enabled {
                let Some(audio) = inner.audio else {
                    self.fail_locked(&mut inner, "audio session lost before loop restart");
                    return;
                };
                let restart = match self.backend.seek(audio, 0).await {
                    Ok(()) => self.backend.play(audio).await,
                    Err(e) => Err(e),
                };
                match restart {
                    Ok(()) => {
                        inner.session.position_millis = 0;
                        inner.session.state = SessionState::Playing;
                    }
                    Err(e) => {
                        let message = e.to_string();
                        self.backend.unload(audio).await.ok();
                        inner.audio = None;
                        self.fail_locked(&mut inner, &message);
                    }
                }
                return;
            }
        }

        if let Err(e) = self.play_next().await {
            warn!(error = %e, "auto-advance failed");
        }
    }
}

fn clamp_position(session: &PlaybackSession, position_millis: u64) -> u64 {
    let mut clamped = position_millis.min(session.duration_millis);
    if let Some(window) = session.preview {
        clamped = clamped.clamp(window.start_millis, window.end_millis);
    }
    clamped
}
