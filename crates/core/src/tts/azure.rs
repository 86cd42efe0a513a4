use crate::config::{ApiKey, AzureRegion};
use crate::tts::{AudioFormat, SynthesisError, SynthesisRequest, Synthesizer};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

const LOG_TARGET: &str = "tts::azure";
const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";
const USER_AGENT: &str = concat!("readaloud/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Client for the Azure Speech text-to-speech REST endpoint.
#[derive(Clone)]
pub struct AzureTtsClient {
    client: Client,
    api_key: ApiKey,
    base_url: String,
}

/// One entry of the regional voice list.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AzureVoice {
    pub short_name: String,
    pub display_name: String,
    pub gender: String,
    pub locale: String,
    #[serde(default)]
    pub voice_type: Option<String>,
}

impl AzureTtsClient {
    pub fn new(api_key: ApiKey, region: &AzureRegion) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: format!("https://{}.tts.speech.microsoft.com", region.as_str()),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(base_url)?;
        self.base_url = parsed.as_str().trim_end_matches('/').to_owned();
        Ok(self)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/cognitiveservices/{path}", self.base_url)
    }

    pub async fn list_voices(&self) -> Result<Vec<AzureVoice>, SynthesisError> {
        let response = self
            .client
            .get(self.endpoint("voices/list"))
            .header("Ocp-Apim-Subscription-Key", self.api_key.expose())
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| SynthesisError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::Network(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(classify_status(status, &String::from_utf8_lossy(&body)));
        }

        serde_json::from_slice(&body)
            .map_err(|e| SynthesisError::Other(format!("malformed voice list: {e}")))
    }
}

impl Synthesizer for AzureTtsClient {
    fn audio_format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    fn synthesize(&self, request: SynthesisRequest) -> BoxFuture<'_, Result<Bytes, SynthesisError>> {
        async move {
            let ssml = build_ssml(&request);
            tracing::debug!(
                target: LOG_TARGET,
                voice = %request.voice,
                chars = request.text.chars().count(),
                "requesting synthesis"
            );

            let response = self
                .client
                .post(self.endpoint("v1"))
                .header("Ocp-Apim-Subscription-Key", self.api_key.expose())
                .header("Content-Type", "application/ssml+xml")
                .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
                .header("User-Agent", USER_AGENT)
                .body(ssml)
                .send()
                .await
                .map_err(|e| SynthesisError::Network(e.to_string()))?;

            let status = response.status().as_u16();
            if !(200..300).contains(&status) {
                let body = response.text().await.unwrap_or_default();
                return Err(classify_status(status, &body));
            }

            let audio = response
                .bytes()
                .await
                .map_err(|e| SynthesisError::Network(e.to_string()))?;
            if audio.is_empty() {
                return Err(SynthesisError::EmptyAudio);
            }

            tracing::debug!(target: LOG_TARGET, bytes = audio.len(), "synthesis complete");
            Ok(audio)
        }
        .boxed()
    }
}

fn build_ssml(request: &SynthesisRequest) -> String {
    format!(
        "<speak version='1.0' xml:lang='{}'><voice name='{}'>{}</voice></speak>",
        escape_xml(&request.voice.locale()),
        escape_xml(request.voice.as_str()),
        escape_xml(&request.text)
    )
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn classify_status(status: u16, body: &str) -> SynthesisError {
    let body: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    match status {
        400 => SynthesisError::InvalidRequest(if body.is_empty() {
            "bad request (check the voice name)".to_owned()
        } else {
            body
        }),
        401 | 403 => SynthesisError::Unauthorized { status },
        429 => SynthesisError::QuotaExhausted,
        _ => SynthesisError::Http { status, body },
    }
}
