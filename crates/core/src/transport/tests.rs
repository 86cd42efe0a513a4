use super::*;
use crate::playback::{PlaybackEngine, PlaybackError};
use crate::tts::{AudioFormat, SynthesisError, SynthesisRequest, Synthesizer};
use crate::voice::VoiceId;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;

const WAIT: Duration = Duration::from_secs(2);

#[derive(Clone, Default)]
struct ScriptedSynth {
    fail: bool,
    gate: Option<Arc<Notify>>,
    payload: Option<Bytes>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedSynth {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    /// Returns a clip large enough that writing it to disk takes a while.
    fn large(len: usize) -> Self {
        Self {
            payload: Some(Bytes::from(vec![0u8; len])),
            ..Self::default()
        }
    }
}

impl Synthesizer for ScriptedSynth {
    fn audio_format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    fn synthesize(&self, _request: SynthesisRequest) -> BoxFuture<'_, Result<Bytes, SynthesisError>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                Err(SynthesisError::Network("offline".into()))
            } else {
                Ok(self
                    .payload
                    .clone()
                    .unwrap_or_else(|| Bytes::from_static(b"ID3fake")))
            }
        }
        .boxed()
    }
}

#[derive(Default)]
struct EngineProbe {
    loaded: Option<PathBuf>,
    finished: bool,
    fail_load: bool,
    shut_down: bool,
    calls: Vec<&'static str>,
}

#[derive(Clone, Default)]
struct FakeEngine {
    probe: Arc<Mutex<EngineProbe>>,
}

impl FakeEngine {
    fn probe(&self) -> std::sync::MutexGuard<'_, EngineProbe> {
        self.probe.lock().expect("probe lock")
    }

    fn failing_load() -> Self {
        let engine = Self::default();
        engine.probe().fail_load = true;
        engine
    }

    fn finish(&self) {
        self.probe().finished = true;
    }
}

impl PlaybackEngine for FakeEngine {
    fn load(&mut self, path: &Path) -> Result<(), PlaybackError> {
        let mut probe = self.probe();
        probe.calls.push("load");
        if probe.fail_load {
            return Err(PlaybackError::Decode {
                path: path.to_owned(),
                details: "not audio".into(),
            });
        }
        probe.loaded = Some(path.to_owned());
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        self.probe().calls.push("play");
        Ok(())
    }

    fn pause(&mut self) {
        self.probe().calls.push("pause");
    }

    fn unpause(&mut self) {
        self.probe().calls.push("unpause");
    }

    fn stop(&mut self) {
        self.probe().calls.push("stop");
    }

    fn unload(&mut self) {
        let mut probe = self.probe();
        probe.calls.push("unload");
        probe.loaded = None;
    }

    fn is_busy(&self) -> bool {
        let probe = self.probe();
        probe.loaded.is_some() && !probe.finished
    }

    fn shutdown(&mut self) {
        self.probe().shut_down = true;
    }
}

type Controller = TransportController<ScriptedSynth, FakeEngine>;

fn controller(
    synth: ScriptedSynth,
    engine: FakeEngine,
    dir: &Path,
) -> (Controller, UnboundedReceiver<UiEvent>) {
    TransportController::new(
        synth,
        engine,
        TransportOptions {
            poll_interval: Duration::from_millis(2),
            asset_dir: dir.to_owned(),
        },
    )
}

fn guy() -> VoiceId {
    VoiceId::new("en-US-GuyNeural")
}

fn assets_in(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("entry").path())
        .collect()
}

async fn wait_for_state(c: &Controller, want: TransportState) {
    tokio::time::timeout(WAIT, async {
        while c.state() != want {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("state never became {want:?}, stuck at {:?}", c.state()));
}

/// Collects events up to and including the first one matching `done`.
async fn events_until(
    rx: &mut UnboundedReceiver<UiEvent>,
    done: impl Fn(&UiEvent) -> bool,
) -> Vec<UiEvent> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("event in time")
            .expect("channel open");
        let stop = done(&event);
        seen.push(event);
        if stop {
            return seen;
        }
    }
}

fn last_controls(events: &[UiEvent]) -> Option<Controls> {
    events.iter().rev().find_map(|e| match e {
        UiEvent::Controls(c) => Some(*c),
        _ => None,
    })
}

async fn playing(dir: &Path) -> (Controller, UnboundedReceiver<UiEvent>, FakeEngine) {
    let engine = FakeEngine::default();
    let (mut c, rx) = controller(ScriptedSynth::default(), engine.clone(), dir);
    c.speak("Hello world", &guy()).expect("valid text");
    wait_for_state(&c, TransportState::Playing).await;
    (c, rx, engine)
}

#[tokio::test]
async fn blank_text_is_rejected_without_side_effects() {
    let dir = tempfile::tempdir().expect("tempdir");
    let synth = ScriptedSynth::default();
    let (mut c, mut rx) = controller(synth.clone(), FakeEngine::default(), dir.path());

    for text in ["", "   ", "\n\t "] {
        let err = c.speak(text, &guy()).expect_err("blank text");
        assert!(matches!(err, TransportError::Validation));
        assert_eq!(err.dialog_title(), "Input needed");
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(c.state(), TransportState::Idle);
    assert!(rx.try_recv().is_err());
    assert!(assets_in(dir.path()).is_empty());
    assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn speak_reaches_playing_with_a_fresh_asset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = FakeEngine::default();
    let (mut c, mut rx) = controller(ScriptedSynth::default(), engine.clone(), dir.path());

    c.speak("Hello world", &guy()).expect("valid text");
    let first = events_until(&mut rx, |e| matches!(e, UiEvent::Controls(_))).await;
    assert_eq!(last_controls(&first), Some(Controls::active(PauseLabel::Pause)));

    wait_for_state(&c, TransportState::Playing).await;
    let asset = c.current_asset().expect("asset while playing");
    assert!(asset.exists());
    assert!(asset.starts_with(dir.path()));
    assert_eq!(engine.probe().loaded.as_deref(), Some(asset.as_path()));
    assert_eq!(engine.probe().calls, vec!["load", "play"]);

    let controls = Controls::active(PauseLabel::Pause);
    assert!(!controls.speak_enabled && controls.pause_enabled && controls.stop_enabled);

    c.shutdown().await;
}

#[tokio::test]
async fn stop_is_idempotent_from_idle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = FakeEngine::default();
    let (c, mut rx) = controller(ScriptedSynth::default(), engine.clone(), dir.path());

    c.stop();
    c.stop();

    assert_eq!(c.state(), TransportState::Idle);
    assert!(rx.try_recv().is_err());
    assert!(engine.probe().calls.is_empty());
}

#[tokio::test]
async fn stop_while_playing_cleans_up() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (c, mut rx, engine) = playing(dir.path()).await;
    let asset = c.current_asset().expect("asset");

    c.stop();

    assert_eq!(c.state(), TransportState::Idle);
    assert!(!asset.exists());
    assert!(engine.probe().loaded.is_none());
    let events = events_until(&mut rx, |e| {
        matches!(e, UiEvent::Controls(c) if *c == Controls::idle())
    })
    .await;
    assert!(!events.iter().any(|e| matches!(e, UiEvent::Finished(_))));

    c.stop();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn pause_twice_returns_to_playing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (c, mut rx, engine) = playing(dir.path()).await;
    events_until(&mut rx, |e| matches!(e, UiEvent::Controls(_))).await;
    events_until(&mut rx, |e| matches!(e, UiEvent::Controls(_))).await;

    assert_eq!(c.pause(), TransportState::Paused);
    let events = events_until(&mut rx, |e| matches!(e, UiEvent::Controls(_))).await;
    assert_eq!(last_controls(&events), Some(Controls::active(PauseLabel::Resume)));

    assert_eq!(c.pause(), TransportState::Playing);
    let events = events_until(&mut rx, |e| matches!(e, UiEvent::Controls(_))).await;
    assert_eq!(last_controls(&events), Some(Controls::active(PauseLabel::Pause)));

    let calls = engine.probe().calls.clone();
    assert_eq!(&calls[calls.len() - 2..], ["pause", "unpause"]);
    c.shutdown().await;
}

#[tokio::test]
async fn pause_is_ignored_until_playback_starts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Arc::new(Notify::new());
    let engine = FakeEngine::default();
    let (mut c, _rx) = controller(ScriptedSynth::gated(gate.clone()), engine.clone(), dir.path());

    assert_eq!(c.pause(), TransportState::Idle);

    c.speak("Hello world", &guy()).expect("valid text");
    assert_eq!(c.pause(), TransportState::Synthesizing);
    assert!(!engine.probe().calls.contains(&"pause"));

    gate.notify_one();
    wait_for_state(&c, TransportState::Playing).await;
    c.shutdown().await;
}

#[tokio::test]
async fn natural_completion_removes_asset_and_reenables_speak() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (c, mut rx, engine) = playing(dir.path()).await;
    let id = c.current_session().expect("session");
    let asset = c.current_asset().expect("asset");

    engine.finish();
    let events = events_until(&mut rx, |e| matches!(e, UiEvent::Finished(_))).await;

    assert!(matches!(events.last(), Some(UiEvent::Finished(done)) if *done == id));
    assert_eq!(last_controls(&events), Some(Controls::idle()));
    assert_eq!(c.state(), TransportState::Idle);
    assert!(!asset.exists());
    assert!(assets_in(dir.path()).is_empty());
}

#[tokio::test]
async fn paused_session_completes_only_after_resume() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (c, mut rx, engine) = playing(dir.path()).await;
    let asset = c.current_asset().expect("asset");

    c.pause();
    engine.finish();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(c.state(), TransportState::Paused);
    assert!(asset.exists());

    c.pause();
    events_until(&mut rx, |e| matches!(e, UiEvent::Finished(_))).await;
    assert_eq!(c.state(), TransportState::Idle);
    assert!(!asset.exists());
}

#[tokio::test]
async fn speak_while_playing_replaces_the_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut c, _rx, _engine) = playing(dir.path()).await;
    let old_id = c.current_session().expect("session");
    let old_asset = c.current_asset().expect("asset");

    let new_id = c.speak("Second take", &VoiceId::new("en-GB-SoniaNeural")).expect("valid");
    assert_ne!(old_id, new_id);
    assert!(!old_asset.exists());

    wait_for_state(&c, TransportState::Playing).await;
    let new_asset = c.current_asset().expect("asset");
    assert_ne!(old_asset, new_asset);
    assert_eq!(assets_in(dir.path()), vec![new_asset]);
    c.shutdown().await;
}

#[tokio::test]
async fn synthesis_failure_reports_and_resets() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = FakeEngine::default();
    let (mut c, mut rx) = controller(ScriptedSynth::failing(), engine.clone(), dir.path());

    c.speak("Hello world", &guy()).expect("valid text");
    let events = events_until(&mut rx, |e| {
        matches!(e, UiEvent::Controls(c) if *c == Controls::idle())
    })
    .await;

    let err = events
        .iter()
        .find_map(|e| match e {
            UiEvent::Error(err) => Some(err),
            _ => None,
        })
        .expect("error event");
    assert!(matches!(err, TransportError::Synthesis(SynthesisError::Network(_))));
    assert_eq!(err.dialog_title(), "Error");
    assert_eq!(c.state(), TransportState::Idle);
    assert!(assets_in(dir.path()).is_empty());
    assert!(!engine.probe().calls.contains(&"load"));
}

#[tokio::test]
async fn playback_failure_reports_and_deletes_asset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut c, mut rx) = controller(ScriptedSynth::default(), FakeEngine::failing_load(), dir.path());

    c.speak("Hello world", &guy()).expect("valid text");
    let events = events_until(&mut rx, |e| matches!(e, UiEvent::Error(_))).await;

    match events.last() {
        Some(UiEvent::Error(err @ TransportError::Playback(_))) => {
            assert_eq!(err.dialog_title(), "Playback Error");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(c.state(), TransportState::Idle);
    assert!(assets_in(dir.path()).is_empty());
}

#[tokio::test]
async fn stop_during_synthesis_discards_the_late_result() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Arc::new(Notify::new());
    let synth = ScriptedSynth::gated(gate.clone());
    let engine = FakeEngine::default();
    let (mut c, mut rx) = controller(synth.clone(), engine.clone(), dir.path());

    c.speak("Hello world", &guy()).expect("valid text");
    tokio::time::timeout(WAIT, async {
        while synth.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("synthesis started");

    c.stop();
    assert_eq!(c.state(), TransportState::Idle);

    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(c.state(), TransportState::Idle);
    assert!(assets_in(dir.path()).is_empty());
    assert!(!engine.probe().calls.contains(&"load"));
    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event, UiEvent::Error(_)), "unexpected {event:?}");
    }
}

#[tokio::test]
async fn shutdown_while_playing_releases_everything() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (c, _rx, engine) = playing(dir.path()).await;
    let asset = c.current_asset().expect("asset");

    c.shutdown().await;

    assert!(!asset.exists());
    let probe = engine.probe();
    assert!(probe.shut_down);
    assert!(probe.loaded.is_none());
    assert!(probe.calls.ends_with(&["stop", "unload"]));
}

#[tokio::test]
async fn shutdown_while_paused_releases_everything() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (c, _rx, engine) = playing(dir.path()).await;
    c.pause();

    c.shutdown().await;

    assert!(assets_in(dir.path()).is_empty());
    assert!(engine.probe().shut_down);
}

#[tokio::test]
async fn shutdown_mid_synthesis_leaves_no_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Arc::new(Notify::new());
    let (mut c, _rx) = controller(ScriptedSynth::gated(gate), FakeEngine::default(), dir.path());

    c.speak("Hello world", &guy()).expect("valid text");
    tokio::time::sleep(Duration::from_millis(5)).await;
    c.shutdown().await;

    assert!(assets_in(dir.path()).is_empty());
}

const LARGE_CLIP: usize = 64 * 1024 * 1024;
const WRITE_WINDOW_DELAYS_US: [u64; 6] = [0, 100, 400, 1600, 6400, 12800];

#[tokio::test]
async fn shutdown_while_asset_is_being_written_leaves_no_file() {
    for delay in WRITE_WINDOW_DELAYS_US {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut c, _rx) = controller(ScriptedSynth::large(LARGE_CLIP), FakeEngine::default(), dir.path());

        c.speak("Hello world", &guy()).expect("valid text");
        tokio::time::sleep(Duration::from_micros(delay)).await;
        c.shutdown().await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(assets_in(dir.path()).is_empty(), "file left behind after {delay}us");
    }
}

#[tokio::test]
async fn replacing_a_session_mid_write_keeps_only_the_new_asset() {
    for delay in WRITE_WINDOW_DELAYS_US {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut c, _rx) = controller(ScriptedSynth::large(LARGE_CLIP), FakeEngine::default(), dir.path());

        c.speak("Hello world", &guy()).expect("valid text");
        tokio::time::sleep(Duration::from_micros(delay)).await;
        c.speak("Second take", &guy()).expect("valid text");
        wait_for_state(&c, TransportState::Playing).await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        let current = c.current_asset().expect("asset");
        assert_eq!(assets_in(dir.path()), vec![current], "stale file after {delay}us");

        c.shutdown().await;
        assert!(assets_in(dir.path()).is_empty());
    }
}
