use crate::playback::{PlaybackEngine, PlaybackError};
use std::path::{Path, PathBuf};

/// Engine without an audio device. Playback finishes as soon as it starts.
#[derive(Clone, Debug, Default)]
pub struct NullEngine {
    loaded: Option<PathBuf>,
}

impl NullEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaybackEngine for NullEngine {
    fn load(&mut self, path: &Path) -> Result<(), PlaybackError> {
        std::fs::metadata(path).map_err(|source| PlaybackError::Open {
            path: path.to_owned(),
            source,
        })?;
        self.loaded = Some(path.to_owned());
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        match &self.loaded {
            Some(path) => {
                tracing::debug!(path = %path.display(), "audio disabled; skipping playback");
                Ok(())
            }
            None => Err(PlaybackError::NotLoaded),
        }
    }

    fn pause(&mut self) {}

    fn unpause(&mut self) {}

    fn stop(&mut self) {}

    fn unload(&mut self) {
        self.loaded = None;
    }

    fn is_busy(&self) -> bool {
        false
    }

    fn shutdown(&mut self) {
        self.loaded = None;
    }
}
