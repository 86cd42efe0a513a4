mod azure;
mod edge;
mod tone;

use crate::voice::VoiceId;
use bytes::Bytes;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use azure::{AzureTtsClient, AzureVoice};
pub use edge::EdgeTtsClient;
pub use tone::ToneSynthesizer;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: VoiceId,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SynthesisError {
    #[error("network error: {0}")]
    Network(String),
    #[error("speech service rejected the credentials (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("speech service quota exhausted or rate limited")]
    QuotaExhausted,
    #[error("invalid synthesis request: {0}")]
    InvalidRequest(String),
    #[error("speech service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("speech service returned no audio")]
    EmptyAudio,
    #[error("failed to write audio: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// Turns text into an encoded audio clip.
pub trait Synthesizer: Send + Sync {
    fn audio_format(&self) -> AudioFormat;

    fn synthesize(&self, request: SynthesisRequest) -> BoxFuture<'_, Result<Bytes, SynthesisError>>;
}

impl<T: Synthesizer + ?Sized> Synthesizer for Box<T> {
    fn audio_format(&self) -> AudioFormat {
        (**self).audio_format()
    }

    fn synthesize(&self, request: SynthesisRequest) -> BoxFuture<'_, Result<Bytes, SynthesisError>> {
        (**self).synthesize(request)
    }
}
