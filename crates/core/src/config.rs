use crate::transport::TransportOptions;
use crate::voice::{VoiceId, DEFAULT_VOICE};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, time::Duration};

pub const DEFAULT_AZURE_REGION: &str = "eastus";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;
pub const ENV_AZURE_SPEECH_KEY: &str = "AZURE_SPEECH_KEY";
pub const ENV_AZURE_SPEECH_REGION: &str = "AZURE_SPEECH_REGION";
pub const ENV_READALOUD_VOICE: &str = "READALOUD_VOICE";

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SynthKind {
    #[default]
    Edge,
    Azure,
    Tone,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        if v.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(v))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(**redacted**)")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AzureRegion(String);

impl AzureRegion {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        let trimmed = v.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidRegion(v));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AzureRegion {
    fn default() -> Self {
        Self(DEFAULT_AZURE_REGION.to_owned())
    }
}

/// Interval between completion checks while a session is playing.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollInterval {
    pub millis: u64,
}

impl PollInterval {
    pub fn new(millis: u64) -> Result<Self, ConfigError> {
        if millis == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(Self { millis })
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.millis)
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        Self {
            millis: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub voice: VoiceId,
    pub synth: SynthKind,
    pub azure_key: Option<ApiKey>,
    pub azure_region: AzureRegion,
    pub output_device: Option<String>,
    pub poll_interval: PollInterval,
    pub audio_enabled: bool,
    pub asset_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            voice: VoiceId::new(DEFAULT_VOICE),
            synth: SynthKind::default(),
            azure_key: None,
            azure_region: AzureRegion::default(),
            output_device: None,
            poll_interval: PollInterval::default(),
            audio_enabled: true,
            asset_dir: None,
        }
    }
}

impl AppConfig {
    /// Fails when the selected synthesizer needs credentials that were not provided.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.synth == SynthKind::Azure && self.azure_key.is_none() {
            return Err(ConfigError::MissingApiKey {
                env_key: ENV_AZURE_SPEECH_KEY,
            });
        }
        Ok(())
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            poll_interval: self.poll_interval.duration(),
            asset_dir: self
                .asset_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api key must not be empty")]
    EmptyApiKey,
    #[error("azure speech key is required (pass --azure-speech-key or set {env_key})")]
    MissingApiKey { env_key: &'static str },
    #[error("invalid azure region: {0:?}")]
    InvalidRegion(String),
    #[error("voice must not be empty")]
    EmptyVoice,
    #[error("poll interval must be > 0 ms")]
    ZeroPollInterval,
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_api_key(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Result<Option<ApiKey>, ConfigError> {
    match cli_value {
        Some(v) => Ok(Some(ApiKey::new(v)?)),
        None => match env.var(env_key) {
            Some(v) => Ok(Some(ApiKey::new(v)?)),
            None => Ok(None),
        },
    }
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}

pub fn resolve_voice(
    cli_value: Option<String>,
    env: &impl Env,
) -> Result<VoiceId, ConfigError> {
    let v = resolve_string_with_default(cli_value, ENV_READALOUD_VOICE, env, DEFAULT_VOICE);
    if v.trim().is_empty() {
        return Err(ConfigError::EmptyVoice);
    }
    Ok(VoiceId::new(v.trim()))
}
