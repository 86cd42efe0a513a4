use crate::tts::{AudioFormat, SynthesisError, SynthesisRequest, Synthesizer};
use crate::voice::Gender;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::f32::consts::PI;
use std::io::Cursor;

const SAMPLE_RATE_HZ: u32 = 22050;
const MS_PER_CHAR: usize = 60;
const MIN_DURATION_MS: usize = 500;
const MAX_DURATION_MS: usize = 30_000;
const AMPLITUDE: f32 = 0.3;

/// Offline synthesizer that renders a sine tone instead of speech.
///
/// Clip length follows the text length and pitch follows the voice's gender,
/// so the transport can be exercised without network access or credentials.
#[derive(Clone, Debug, Default)]
pub struct ToneSynthesizer;

impl ToneSynthesizer {
    pub fn new() -> Self {
        Self
    }
}

impl Synthesizer for ToneSynthesizer {
    fn audio_format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    fn synthesize(&self, request: SynthesisRequest) -> BoxFuture<'_, Result<Bytes, SynthesisError>> {
        async move {
            let duration_ms = (request.text.chars().count() * MS_PER_CHAR)
                .clamp(MIN_DURATION_MS, MAX_DURATION_MS);

            let freq = match request.voice.catalog_entry().map(|v| v.gender) {
                Some(Gender::Male) => 220.0,
                Some(Gender::Female) | None => 440.0,
            };

            let samples = duration_ms * SAMPLE_RATE_HZ as usize / 1000;
            render_wav(freq, samples)
                .map_err(|e| SynthesisError::Other(format!("wav encoding failed: {e}")))
        }
        .boxed()
    }
}

fn render_wav(freq: f32, samples: usize) -> Result<Bytes, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE_HZ,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(samples * 2 + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for i in 0..samples {
            let t = i as f32 / SAMPLE_RATE_HZ as f32;
            let amplitude = (2.0 * PI * freq * t).sin() * AMPLITUDE;
            writer.write_sample((amplitude * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(Bytes::from(cursor.into_inner()))
}
