use crate::playback::PlaybackEngine;
use crate::session::{AssetPath, PlaybackSession, SessionId, TransportState};
use crate::transport::{Controls, PauseLabel, TransportError, TransportOptions, UiEvent};
use crate::tts::{SynthesisError, SynthesisRequest, Synthesizer};
use crate::voice::VoiceId;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const LOG_TARGET: &str = "transport";

/// Everything the lock protects: the engine handle and the active session.
struct Shared<E> {
    engine: E,
    session: Option<PlaybackSession>,
}

impl<E: PlaybackEngine> Shared<E> {
    fn is_current(&self, id: SessionId) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == id)
    }

    fn teardown(&mut self, reason: &'static str) -> Option<PlaybackSession> {
        let mut session = self.session.take()?;
        let from = session.state;
        session.state = TransportState::Stopping;
        tracing::debug!(
            target: LOG_TARGET,
            session = %session.id,
            from = ?from,
            reason,
            "tearing down session"
        );

        self.engine.stop();
        self.engine.unload();
        session.asset.remove();
        Some(session)
    }
}

fn lock_shared<E>(shared: &Mutex<Shared<E>>) -> MutexGuard<'_, Shared<E>> {
    match shared.lock() {
        Ok(g) => g,
        Err(poisoned) => {
            tracing::warn!(target: LOG_TARGET, "transport lock was poisoned; recovering and continuing");
            poisoned.into_inner()
        }
    }
}

struct Worker {
    session: SessionId,
    handle: JoinHandle<()>,
}

/// Owns at most one [`PlaybackSession`] and drives it through synthesis,
/// playback and cleanup.
///
/// `speak` spawns a Tokio task per session and must be called from inside a
/// runtime. All state changes happen under one lock shared with that task.
pub struct TransportController<S, E> {
    synth: Arc<S>,
    shared: Arc<Mutex<Shared<E>>>,
    events: UnboundedSender<UiEvent>,
    options: TransportOptions,
    workers: Vec<Worker>,
}

impl<S, E> TransportController<S, E>
where
    S: Synthesizer + 'static,
    E: PlaybackEngine + 'static,
{
    pub fn new(synth: S, engine: E, options: TransportOptions) -> (Self, UnboundedReceiver<UiEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Self {
            synth: Arc::new(synth),
            shared: Arc::new(Mutex::new(Shared {
                engine,
                session: None,
            })),
            events,
            options,
            workers: Vec::new(),
        };
        (controller, rx)
    }

    pub fn state(&self) -> TransportState {
        lock_shared(&self.shared)
            .session
            .as_ref()
            .map_or(TransportState::Idle, |s| s.state)
    }

    pub fn current_session(&self) -> Option<SessionId> {
        lock_shared(&self.shared).session.as_ref().map(|s| s.id)
    }

    pub fn current_asset(&self) -> Option<PathBuf> {
        lock_shared(&self.shared)
            .session
            .as_ref()
            .map(|s| s.asset.as_path().to_owned())
    }

    pub fn speak(&mut self, text: &str, voice: &VoiceId) -> Result<SessionId, TransportError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TransportError::Validation);
        }

        self.stop();
        self.workers.retain(|w| !w.handle.is_finished());

        let session = PlaybackSession::new(
            text.to_owned(),
            voice.clone(),
            &self.options.asset_dir,
            self.synth.audio_format(),
        );
        let id = session.id;
        let asset = session.asset.clone();
        let request = SynthesisRequest {
            text: session.text.clone(),
            voice: session.voice.clone(),
        };

        lock_shared(&self.shared).session = Some(session);
        let _ = self.events.send(UiEvent::Controls(Controls::active(PauseLabel::Pause)));
        tracing::info!(
            target: LOG_TARGET,
            session = %id,
            voice = %voice,
            asset = %asset.as_path().display(),
            "synthesizing"
        );

        let worker = SessionWorker {
            id,
            asset: asset.clone(),
            synth: Arc::clone(&self.synth),
            shared: Arc::clone(&self.shared),
            events: self.events.clone(),
            poll_interval: self.options.poll_interval,
        };
        let handle = tokio::spawn(worker.run(request));
        self.workers.push(Worker { session: id, handle });

        Ok(id)
    }

    /// Toggles between Playing and Paused. Returns the resulting state.
    pub fn pause(&self) -> TransportState {
        let mut guard = lock_shared(&self.shared);
        let Shared { engine, session } = &mut *guard;
        let Some(session) = session.as_mut() else {
            return TransportState::Idle;
        };

        let label = match session.state {
            TransportState::Playing => {
                engine.pause();
                session.state = TransportState::Paused;
                PauseLabel::Resume
            }
            TransportState::Paused => {
                engine.unpause();
                session.state = TransportState::Playing;
                PauseLabel::Pause
            }
            _ => return session.state,
        };

        tracing::debug!(target: LOG_TARGET, session = %session.id, state = ?session.state, "pause toggled");
        let _ = self.events.send(UiEvent::Controls(Controls::active(label)));
        session.state
    }

    /// Halts playback, deletes the asset and returns to Idle. Safe to call in any state.
    pub fn stop(&self) {
        let stopped = lock_shared(&self.shared).teardown("stopped");
        if let Some(session) = stopped {
            tracing::info!(target: LOG_TARGET, session = %session.id, "stopped");
            let _ = self.events.send(UiEvent::Controls(Controls::idle()));
        }
    }

    /// Application-close path: stops, cancels outstanding workers and releases
    /// the engine. Asset writes only happen under the lock for the current
    /// session, so nothing can land on disk after the stop below.
    pub async fn shutdown(mut self) {
        self.stop();

        for worker in self.workers.drain(..) {
            worker.handle.abort();
            if let Err(e) = worker.handle.await {
                if !e.is_cancelled() {
                    tracing::warn!(target: LOG_TARGET, session = %worker.session, error = %e, "session worker failed");
                }
            }
        }

        self.release_engine();
        tracing::info!(target: LOG_TARGET, "transport shut down");
    }

    fn release_engine(&self) {
        lock_shared(&self.shared).engine.shutdown();
    }
}

/// Background half of one session: synthesis, then playback until completion.
struct SessionWorker<S, E> {
    id: SessionId,
    asset: AssetPath,
    synth: Arc<S>,
    shared: Arc<Mutex<Shared<E>>>,
    events: UnboundedSender<UiEvent>,
    poll_interval: Duration,
}

impl<S, E> SessionWorker<S, E>
where
    S: Synthesizer + 'static,
    E: PlaybackEngine + 'static,
{
    async fn run(self, request: SynthesisRequest) {
        let outcome = match self.synth.synthesize(request).await {
            Ok(audio) => self.write_asset(audio).await,
            Err(e) => Err(e),
        };

        if self.start_playback(outcome) {
            self.watch_until_done().await;
        }
    }

    /// Writes the audio while holding the lock, and only if this session is
    /// still current. A concurrent stop therefore either waits for the write
    /// and deletes the file, or runs first and the write never happens.
    async fn write_asset(&self, audio: Bytes) -> Result<(), SynthesisError> {
        let shared = Arc::clone(&self.shared);
        let id = self.id;
        let path = self.asset.as_path().to_owned();
        tokio::task::spawn_blocking(move || {
            let shared = lock_shared(&shared);
            if !shared.is_current(id) {
                return Ok(());
            }
            std::fs::write(&path, &audio)
        })
        .await
        .map_err(|e| SynthesisError::Other(format!("asset writer failed: {e}")))?
        .map_err(SynthesisError::from)
    }

    fn emit(&self, event: UiEvent) {
        let _ = self.events.send(event);
    }

    fn start_playback(&self, outcome: Result<(), SynthesisError>) -> bool {
        let mut shared = lock_shared(&self.shared);
        if !shared.is_current(self.id) {
            tracing::debug!(target: LOG_TARGET, session = %self.id, "session superseded; discarding synthesis result");
            self.asset.remove();
            return false;
        }

        if let Err(e) = outcome {
            tracing::warn!(target: LOG_TARGET, session = %self.id, error = %e, "synthesis failed");
            shared.teardown("synthesis failed");
            self.emit(UiEvent::Error(e.into()));
            self.emit(UiEvent::Controls(Controls::idle()));
            return false;
        }

        let started = match shared.engine.load(self.asset.as_path()) {
            Ok(()) => shared.engine.play(),
            Err(e) => Err(e),
        };
        if let Err(e) = started {
            tracing::warn!(target: LOG_TARGET, session = %self.id, error = %e, "playback failed");
            shared.teardown("playback failed");
            self.emit(UiEvent::Error(e.into()));
            self.emit(UiEvent::Controls(Controls::idle()));
            return false;
        }

        if let Some(session) = shared.session.as_mut() {
            session.state = TransportState::Playing;
        }
        tracing::info!(target: LOG_TARGET, session = %self.id, "playing");
        self.emit(UiEvent::Controls(Controls::active(PauseLabel::Pause)));
        true
    }

    async fn watch_until_done(&self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !self.poll_once() {
                return;
            }
        }
    }

    /// Returns false once this worker has nothing left to watch.
    fn poll_once(&self) -> bool {
        let mut shared = lock_shared(&self.shared);
        let state = match shared.session.as_ref() {
            Some(s) if s.id == self.id => s.state,
            _ => return false,
        };

        if state == TransportState::Paused || shared.engine.is_busy() {
            return true;
        }

        shared.teardown("playback finished");
        tracing::info!(target: LOG_TARGET, session = %self.id, "playback finished");
        self.emit(UiEvent::Controls(Controls::idle()));
        self.emit(UiEvent::Finished(self.id));
        false
    }
}
