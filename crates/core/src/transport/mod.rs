//! Speak / pause / stop control over one synthesized clip at a time.
//!
//! The UI context owns a [`TransportController`] and drains the [`UiEvent`]
//! receiver it was created with. Background workers never touch UI state
//! directly; they report through that channel.

mod controller;
#[cfg(test)]
mod tests;

use crate::playback::PlaybackError;
use crate::session::SessionId;
use crate::tts::SynthesisError;
use std::path::PathBuf;
use std::time::Duration;

pub use crate::session::TransportState;
pub use controller::TransportController;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportOptions {
    pub poll_interval: Duration,
    pub asset_dir: PathBuf,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(crate::config::DEFAULT_POLL_INTERVAL_MS),
            asset_dir: std::env::temp_dir(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PauseLabel {
    Pause,
    Resume,
}

impl PauseLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pause => "Pause",
            Self::Resume => "Resume",
        }
    }
}

/// Enabled state of the three transport controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Controls {
    pub speak_enabled: bool,
    pub pause_enabled: bool,
    pub stop_enabled: bool,
    pub pause_label: PauseLabel,
}

impl Controls {
    pub fn idle() -> Self {
        Self {
            speak_enabled: true,
            pause_enabled: false,
            stop_enabled: false,
            pause_label: PauseLabel::Pause,
        }
    }

    pub fn active(pause_label: PauseLabel) -> Self {
        Self {
            speak_enabled: false,
            pause_enabled: true,
            stop_enabled: true,
            pause_label,
        }
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::idle()
    }
}

#[derive(Debug)]
pub enum UiEvent {
    Controls(Controls),
    Error(TransportError),
    Finished(SessionId),
}

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("Please enter some text to speak.")]
    Validation,
    #[error("TTS generation failed: {0}")]
    Synthesis(#[from] SynthesisError),
    #[error("Cannot play audio: {0}")]
    Playback(#[from] PlaybackError),
}

impl TransportError {
    pub fn dialog_title(&self) -> &'static str {
        match self {
            Self::Validation => "Input needed",
            Self::Synthesis(_) => "Error",
            Self::Playback(_) => "Playback Error",
        }
    }
}
