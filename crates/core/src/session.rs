use crate::tts::AudioFormat;
use crate::voice::VoiceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const LOG_TARGET: &str = "session";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportState {
    #[default]
    Idle,
    Synthesizing,
    Playing,
    Paused,
    /// Carried by a session once it has been detached for teardown.
    Stopping,
}

/// Location of the synthesized audio for exactly one session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetPath(PathBuf);

impl AssetPath {
    pub fn generate(dir: &Path, id: SessionId, format: AudioFormat) -> Self {
        Self(dir.join(format!("speech_{id}.{}", format.extension())))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Deletes the file if it exists. Failures are logged and swallowed.
    pub fn remove(&self) -> bool {
        remove_asset_file(&self.0)
    }
}

fn remove_asset_file(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(target: LOG_TARGET, path = %path.display(), "asset deleted");
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(
                target: LOG_TARGET,
                path = %path.display(),
                error = %e,
                "failed to delete asset"
            );
            false
        }
    }
}

/// One speak-to-cleanup cycle.
#[derive(Clone, Debug)]
pub struct PlaybackSession {
    pub id: SessionId,
    pub text: String,
    pub voice: VoiceId,
    pub asset: AssetPath,
    pub state: TransportState,
}

impl PlaybackSession {
    pub fn new(text: String, voice: VoiceId, asset_dir: &Path, format: AudioFormat) -> Self {
        let id = SessionId::new();
        Self {
            id,
            text,
            voice,
            asset: AssetPath::generate(asset_dir, id, format),
            state: TransportState::Synthesizing,
        }
    }
}
