mod audio;
mod null;

use std::path::{Path, PathBuf};

pub use audio::RodioEngine;
#[cfg(feature = "playback-device-enum")]
pub use audio::enumerate_output_device_names;
pub use null::NullEngine;

#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    #[error("audio output unavailable: {details}")]
    AudioOutputUnavailable { details: String },

    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode {path}: {details}")]
    Decode { path: PathBuf, details: String },

    #[error("nothing loaded")]
    NotLoaded,
}

/// Transport primitives of a local audio engine.
///
/// Constructing an engine initialises it; [`PlaybackEngine::shutdown`] releases
/// its process-wide resources. `is_busy` stays true while loaded audio is
/// paused.
pub trait PlaybackEngine: Send {
    fn load(&mut self, path: &Path) -> Result<(), PlaybackError>;
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    fn unpause(&mut self);
    fn stop(&mut self);
    fn unload(&mut self);
    fn is_busy(&self) -> bool;
    fn shutdown(&mut self);
}

impl<T: PlaybackEngine + ?Sized> PlaybackEngine for Box<T> {
    fn load(&mut self, path: &Path) -> Result<(), PlaybackError> {
        (**self).load(path)
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn unpause(&mut self) {
        (**self).unpause()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn unload(&mut self) {
        (**self).unload()
    }

    fn is_busy(&self) -> bool {
        (**self).is_busy()
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}
