//! Client-side narration session: remote backend lifecycle plus a single audio handle.

mod audio;
mod transitions;

pub use audio::{AudioHandle, AudioOutput, PlaybackEvent, PlaybackListener};
pub use transitions::NarrationPhase;

use crate::backend::{AudioPayload, NarrationBackend};
use crate::cancellation::CancellationToken;
use crate::config::{EngineConfig, NarrationEngine};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};
use transitions::{PhaseAction, PhaseEvent, transition};
use ts_rs::TS;

pub const PLAYBACK_FAILED_MESSAGE: &str = "Audio playback failed - invalid audio format";

/// Everything a host needs to render narration controls.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct NarrationSnapshot {
    pub phase: NarrationPhase,
    pub error_message: Option<String>,
    pub is_request_pending: bool,
    pub is_audio_playing: bool,
    pub has_audio: bool,
    pub engine: NarrationEngine,
}

struct ActiveHandle {
    id: u64,
    handle: Arc<dyn AudioHandle>,
}

#[derive(Default)]
struct State {
    phase: NarrationPhase,
    error_message: Option<String>,
    /// Identifies the current start attempt; bumped by start and stop.
    request_id: u64,
    /// Identifies the session lifetime; bumped by stop and dispose so late
    /// synthesis results are dropped.
    epoch: u64,
    pending_requests: usize,
    /// Bumped by every speak; only the latest one may replace the audio.
    speak_seq: u64,
    is_playing: bool,
    handle: Option<ActiveHandle>,
    /// Handle being created. Its events count before it is installed.
    pending_handle: Option<u64>,
    next_handle_id: u64,
    last_audio: Option<AudioPayload>,
    engine: NarrationEngine,
    poll: Option<CancellationToken>,
    disposed: bool,
}

impl State {
    fn snapshot(&self) -> NarrationSnapshot {
        NarrationSnapshot {
            phase: self.phase,
            error_message: self.error_message.clone(),
            is_request_pending: self.pending_requests > 0,
            is_audio_playing: self.is_playing && self.handle.is_some(),
            has_audio: self.last_audio.is_some(),
            engine: self.engine,
        }
    }
}

/// Work left over after a transition was applied under the lock.
#[derive(Default)]
struct Deferred {
    request_start: Option<u64>,
    begin_polling: Option<u64>,
    shutdown: bool,
    released: Option<Arc<dyn AudioHandle>>,
}

struct Inner {
    backend: Arc<dyn NarrationBackend>,
    output: Arc<dyn AudioOutput>,
    poll_interval: Duration,
    state: Mutex<State>,
    revision: watch::Sender<u64>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision
            .send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    fn dispatch(&self, event: PhaseEvent) -> Deferred {
        let mut deferred = Deferred::default();
        {
            let mut state = self.lock();
            for action in transition(&mut state, event) {
                match action {
                    PhaseAction::RequestStart { request_id } => {
                        deferred.request_start = Some(request_id)
                    }
                    PhaseAction::BeginPolling { request_id } => {
                        deferred.begin_polling = Some(request_id)
                    }
                    PhaseAction::CancelPolling => {
                        if let Some(token) = state.poll.take() {
                            token.cancel();
                        }
                    }
                    PhaseAction::ReleaseAudio => {
                        state.is_playing = false;
                        state.pending_handle = None;
                        deferred.released = state.handle.take().map(|active| active.handle);
                    }
                    PhaseAction::ShutdownBackend => deferred.shutdown = true,
                }
            }
        }
        self.bump();
        deferred
    }

    async fn perform(self: &Arc<Self>, mut deferred: Deferred) {
        loop {
            if let Some(handle) = deferred.released.take() {
                handle.pause();
            }
            if deferred.shutdown {
                deferred.shutdown = false;
                if let Err(err) = self.backend.stop().await {
                    warn!(error = %err, "Ignoring narration backend shutdown failure");
                }
            }
            if let Some(request_id) = deferred.begin_polling.take() {
                self.spawn_poll(request_id);
            }
            let Some(request_id) = deferred.request_start.take() else {
                break;
            };
            let event = match self.backend.start().await {
                Ok(()) => PhaseEvent::StartAcknowledged { request_id },
                Err(err) => PhaseEvent::StartFailed {
                    request_id,
                    message: err.to_string(),
                },
            };
            deferred = self.dispatch(event);
        }
    }

    fn spawn_poll(self: &Arc<Self>, request_id: u64) {
        let token = CancellationToken::new();
        {
            let mut state = self.lock();
            if state.disposed || state.request_id != request_id {
                return;
            }
            if let Some(previous) = state.poll.replace(token.clone()) {
                previous.cancel();
            }
        }
        debug!(
            request_id,
            interval_ms = self.poll_interval.as_millis() as u64,
            "Polling narration backend status"
        );
        let inner = Arc::downgrade(self);
        let backend = self.backend.clone();
        let period = self.poll_interval;
        tokio::spawn(poll_status(inner, backend, token, request_id, period));
    }

    fn on_playback(&self, handle_id: u64, event: PlaybackEvent) {
        {
            let mut state = self.lock();
            let installed = state.handle.as_ref().map(|active| active.id) == Some(handle_id);
            let pending = state.pending_handle == Some(handle_id);
            if !installed && !pending {
                return;
            }
            match event {
                PlaybackEvent::Playing => state.is_playing = true,
                PlaybackEvent::Paused | PlaybackEvent::Ended => state.is_playing = false,
                PlaybackEvent::Failed => {
                    warn!(handle_id, "Audio playback failed");
                    state.is_playing = false;
                    state.error_message = Some(PLAYBACK_FAILED_MESSAGE.to_string());
                    if pending {
                        state.pending_handle = None;
                    }
                }
            }
        }
        debug!(handle_id, ?event, "Playback event");
        self.bump();
    }
}

async fn poll_status(
    inner: Weak<Inner>,
    backend: Arc<dyn NarrationBackend>,
    token: CancellationToken,
    request_id: u64,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let status = match backend.status().await {
            Ok(status) => status,
            Err(err) => {
                debug!(request_id, error = %err, "Ignoring narration status poll failure");
                continue;
            }
        };
        if token.is_cancelled() {
            break;
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.dispatch(PhaseEvent::StatusReported { request_id, status });
    }
    debug!(request_id, "Narration status polling finished");
}

/// One narration session per open text document. Dropping it cancels polling.
pub struct NarrationSession {
    inner: Arc<Inner>,
}

impl NarrationSession {
    pub fn new(
        backend: Arc<dyn NarrationBackend>,
        output: Arc<dyn AudioOutput>,
        config: &EngineConfig,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        let state = State {
            engine: config.narration_engine,
            ..State::default()
        };
        Self {
            inner: Arc::new(Inner {
                backend,
                output,
                poll_interval: config.narration_poll_interval(),
                state: Mutex::new(state),
                revision,
            }),
        }
    }

    pub fn snapshot(&self) -> NarrationSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn phase(&self) -> NarrationPhase {
        self.inner.lock().phase
    }

    /// Ticks whenever the snapshot may have changed.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Starts the backend from `Stopped` or `Error`, then polls until it settles.
    pub async fn start(&self) {
        if self.inner.lock().disposed {
            return;
        }
        let deferred = self.inner.dispatch(PhaseEvent::StartRequested);
        self.inner.perform(deferred).await;
    }

    /// Always ends in `Stopped`. Shutdown failures are logged and dropped.
    pub async fn stop(&self) {
        let deferred = self.inner.dispatch(PhaseEvent::StopRequested);
        self.inner.perform(deferred).await;
    }

    /// Synthesizes `text` and plays it, replacing any previous audio.
    /// Does nothing unless the backend is ready.
    pub async fn speak(&self, text: &str) {
        let (epoch, seq, engine) = {
            let mut state = self.inner.lock();
            if state.disposed || state.phase != NarrationPhase::Ready {
                debug!(phase = %state.phase, "Ignoring speak request while narration is not ready");
                return;
            }
            state.pending_requests += 1;
            state.speak_seq = state.speak_seq.wrapping_add(1);
            state.error_message = None;
            (state.epoch, state.speak_seq, state.engine)
        };
        self.inner.bump();
        info!(chars = text.chars().count(), %engine, "Requesting speech synthesis");

        let result = self.inner.backend.synthesize(text, engine).await;

        let (audio, previous, handle_id) = {
            let mut state = self.inner.lock();
            state.pending_requests = state.pending_requests.saturating_sub(1);
            if state.epoch != epoch {
                debug!(epoch, current = state.epoch, "Dropping synthesis result for a stopped session");
                drop(state);
                self.inner.bump();
                return;
            }
            if state.speak_seq != seq {
                debug!(seq, latest = state.speak_seq, "Dropping synthesis result superseded by a newer speak");
                drop(state);
                self.inner.bump();
                return;
            }
            let audio = match result {
                Ok(audio) => audio,
                Err(err) => {
                    warn!(error = %err, "Speech synthesis failed");
                    state.error_message = Some(err.to_string());
                    drop(state);
                    self.inner.bump();
                    return;
                }
            };
            state.next_handle_id = state.next_handle_id.wrapping_add(1);
            state.is_playing = false;
            state.last_audio = Some(audio.clone());
            let previous = state.handle.take().map(|active| active.handle);
            state.pending_handle = Some(state.next_handle_id);
            (audio, previous, state.next_handle_id)
        };
        self.inner.bump();
        if let Some(previous) = previous {
            previous.pause();
        }

        let weak = Arc::downgrade(&self.inner);
        let listener: PlaybackListener = Arc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_playback(handle_id, event);
            }
        });
        let handle = match self.inner.output.create(&audio, listener) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(error = %err, "Could not create audio handle");
                let mut state = self.inner.lock();
                if state.pending_handle == Some(handle_id) {
                    state.pending_handle = None;
                }
                state.error_message = Some(PLAYBACK_FAILED_MESSAGE.to_string());
                drop(state);
                self.inner.bump();
                return;
            }
        };

        {
            let mut state = self.inner.lock();
            let still_pending = state.pending_handle == Some(handle_id);
            if still_pending {
                state.pending_handle = None;
            }
            if state.epoch != epoch || !still_pending {
                debug!(handle_id, "Discarding audio handle that failed or was superseded");
                drop(state);
                handle.pause();
                return;
            }
            state.handle = Some(ActiveHandle {
                id: handle_id,
                handle: handle.clone(),
            });
        }
        info!(
            handle_id,
            bytes = audio.bytes.len(),
            audio_format = audio.format.extension(),
            "Playing synthesized audio"
        );
        handle.play();
    }

    pub fn toggle_play_pause(&self) {
        let handle = self
            .inner
            .lock()
            .handle
            .as_ref()
            .map(|active| active.handle.clone());
        let Some(handle) = handle else {
            return;
        };
        if handle.is_paused() {
            handle.play();
        } else {
            handle.pause();
        }
    }

    /// Pauses and rewinds the current audio and forgets the last synthesized payload.
    pub fn stop_audio(&self) {
        let handle = {
            let mut state = self.inner.lock();
            state.is_playing = false;
            state.last_audio = None;
            state.handle.as_ref().map(|active| active.handle.clone())
        };
        self.inner.bump();
        if let Some(handle) = handle {
            handle.pause();
            handle.rewind();
        }
    }

    /// Persists the last synthesized audio. A cancelled save is not an error.
    pub async fn save_audio(&self) -> Option<PathBuf> {
        let audio = self.inner.lock().last_audio.clone()?;
        match self.inner.backend.save_audio(&audio).await {
            Ok(path) => {
                info!(path = %path.display(), "Saved narration audio");
                Some(path)
            }
            Err(err) if err.is_cancelled() => {
                debug!("Audio save cancelled");
                None
            }
            Err(err) => {
                warn!(error = %err, "Saving narration audio failed");
                self.inner.lock().error_message = Some(err.to_string());
                self.inner.bump();
                None
            }
        }
    }

    pub fn clear_error(&self) {
        self.inner.lock().error_message = None;
        self.inner.bump();
    }

    pub fn set_engine(&self, engine: NarrationEngine) {
        self.inner.lock().engine = engine;
        self.inner.bump();
    }

    /// Cancels polling and detaches any in-flight synthesis. Called on drop.
    pub fn dispose(&self) {
        let mut state = self.inner.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.epoch = state.epoch.wrapping_add(1);
        state.request_id = state.request_id.wrapping_add(1);
        if let Some(token) = state.poll.take() {
            token.cancel();
        }
        debug!("Narration session disposed");
    }
}

impl Drop for NarrationSession {
    fn drop(&mut self) {
        self.dispose();
    }
}
