use crate::tts::{AudioFormat, SynthesisError, SynthesisRequest, Synthesizer};
use crate::voice::VoiceId;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use msedge_tts::tts::client::MSEdgeTTSClient;
use msedge_tts::tts::SpeechConfig;

const LOG_TARGET: &str = "tts::edge";
const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";
const SERVICE_VOICE_PREFIX: &str = "Microsoft Server Speech Text to Speech Voice";

/// Keyless synthesizer backed by the Edge read-aloud service.
///
/// The websocket client is blocking, so each request runs on Tokio's blocking
/// pool with its own connection.
#[derive(Clone, Debug, Default)]
pub struct EdgeTtsClient;

impl EdgeTtsClient {
    pub fn new() -> Self {
        Self
    }

    /// Full service names of every voice the endpoint offers.
    pub async fn list_voices(&self) -> Result<Vec<String>, SynthesisError> {
        tokio::task::spawn_blocking(|| {
            msedge_tts::voice::get_voices_list()
                .map(|voices| voices.into_iter().map(|v| v.name).collect::<Vec<String>>())
                .map_err(|e| SynthesisError::Network(e.to_string()))
        })
        .await
        .map_err(|e| SynthesisError::Other(format!("voice list task failed: {e}")))?
    }
}

impl Synthesizer for EdgeTtsClient {
    fn audio_format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    fn synthesize(&self, request: SynthesisRequest) -> BoxFuture<'_, Result<Bytes, SynthesisError>> {
        let config = speech_config(&request.voice);
        let text = request.text;
        async move {
            tracing::debug!(target: LOG_TARGET, voice = %config.voice_name, chars = text.len(), "synthesizing");
            let audio = tokio::task::spawn_blocking(move || {
                let mut client = MSEdgeTTSClient::connect()
                    .map_err(|e| SynthesisError::Network(e.to_string()))?;
                client
                    .synthesize(&text, &config)
                    .map(|audio| audio.audio_bytes)
                    .map_err(|e| SynthesisError::Network(e.to_string()))
            })
            .await
            .map_err(|e| SynthesisError::Other(format!("edge synthesis task failed: {e}")))??;

            if audio.is_empty() {
                return Err(SynthesisError::EmptyAudio);
            }
            Ok(Bytes::from(audio))
        }
        .boxed()
    }
}

fn speech_config(voice: &VoiceId) -> SpeechConfig {
    SpeechConfig {
        voice_name: service_voice_name(voice),
        audio_format: OUTPUT_FORMAT.to_owned(),
        pitch: 0,
        rate: 0,
        volume: 0,
    }
}

/// `en-US-GuyNeural` -> `Microsoft Server Speech Text to Speech Voice (en-US, GuyNeural)`.
/// Anything else is passed through as given.
fn service_voice_name(voice: &VoiceId) -> String {
    let id = voice.as_str();
    let mut parts = id.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(lang), Some(region), Some(name))
            if lang.len() >= 2
                && lang.chars().all(|c| c.is_ascii_lowercase())
                && region.len() == 2
                && region.chars().all(|c| c.is_ascii_uppercase())
                && !name.is_empty() =>
        {
            format!("{SERVICE_VOICE_PREFIX} ({lang}-{region}, {name})")
        }
        _ => id.to_owned(),
    }
}
