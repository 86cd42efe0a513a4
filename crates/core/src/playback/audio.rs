use crate::playback::{PlaybackEngine, PlaybackError};
use rodio::cpal::traits::DeviceTrait;
use rodio::cpal::traits::HostTrait;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, StreamError};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const LOG_TARGET: &str = "playback::rodio";

/// Plays one decoded file at a time through a rodio [`Sink`].
///
/// The [`OutputStream`] is opened on the first `load` and kept alive until
/// `shutdown`. Dropping the stream between clips makes rodio tear down the
/// device and truncates playback.
pub struct RodioEngine {
    output_device_name: Option<String>,
    output_stream: Option<OutputStream>,
    output_stream_open_attempts: usize,
    sink: Option<Sink>,
}

impl RodioEngine {
    pub fn new() -> Self {
        Self {
            output_device_name: None,
            output_stream: None,
            output_stream_open_attempts: 0,
            sink: None,
        }
    }

    pub fn with_output_device_name<S: Into<String>>(mut self, name: S) -> Self {
        self.output_device_name = Some(name.into());
        self
    }

    fn open_output_stream(&mut self) -> Result<OutputStream, PlaybackError> {
        self.output_stream_open_attempts += 1;
        tracing::debug!(
            target: LOG_TARGET,
            attempt = self.output_stream_open_attempts,
            configured_output_device = %self.output_device_name.as_deref().unwrap_or("<default>"),
            "opening rodio OutputStream"
        );

        match self.output_device_name.as_deref() {
            Some(wanted) => match open_named_output_stream(wanted) {
                Ok(stream) => Ok(stream),
                Err(NamedDeviceStreamError::DeviceNotFound { wanted, available }) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        wanted_device = %wanted,
                        available_devices = %format_device_list(&available),
                        "configured output device not found; falling back to default output device"
                    );
                    open_default_stream(Some(&wanted), "default-device fallback after named device not found")
                }
                Err(NamedDeviceStreamError::OpenFailed {
                    wanted,
                    error,
                    available,
                }) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        wanted_device = %wanted,
                        error = %error,
                        available_devices = %format_device_list(&available),
                        "failed to open configured output device; falling back to default output device"
                    );
                    open_default_stream(Some(&wanted), "default-device fallback after named device open failed")
                }
            },
            None => open_default_stream(None, "open default output stream"),
        }
    }

    fn connect_sink(&mut self) -> Result<Sink, PlaybackError> {
        if self.output_stream.is_none() {
            self.output_stream = Some(self.open_output_stream()?);
        }
        match self.output_stream.as_ref() {
            Some(stream) => Ok(Sink::connect_new(stream.mixer())),
            None => Err(PlaybackError::AudioOutputUnavailable {
                details: "internal error: output stream missing after open".to_owned(),
            }),
        }
    }
}

impl Default for RodioEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackEngine for RodioEngine {
    fn load(&mut self, path: &Path) -> Result<(), PlaybackError> {
        self.unload();

        let file = File::open(path).map_err(|source| PlaybackError::Open {
            path: path.to_owned(),
            source,
        })?;
        let source = Decoder::new(BufReader::new(file)).map_err(|e| PlaybackError::Decode {
            path: path.to_owned(),
            details: e.to_string(),
        })?;

        let sink = self.connect_sink()?;
        sink.pause();
        sink.append(source);
        self.sink = Some(sink);

        tracing::debug!(target: LOG_TARGET, path = %path.display(), "audio loaded");
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        let sink = self.sink.as_ref().ok_or(PlaybackError::NotLoaded)?;
        sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn unpause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = &self.sink {
            sink.stop();
        }
    }

    fn unload(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn is_busy(&self) -> bool {
        self.sink.as_ref().is_some_and(|sink| !sink.empty())
    }

    fn shutdown(&mut self) {
        self.unload();
        if self.output_stream.take().is_some() {
            tracing::debug!(target: LOG_TARGET, "output stream released");
        }
    }
}

fn open_default_stream(wanted: Option<&str>, context: &str) -> Result<OutputStream, PlaybackError> {
    OutputStreamBuilder::open_default_stream().map_err(|e| PlaybackError::AudioOutputUnavailable {
        details: format_stream_error_details(e, wanted, context),
    })
}

#[derive(Debug)]
enum NamedDeviceStreamError {
    DeviceNotFound {
        wanted: String,
        available: Vec<String>,
    },
    OpenFailed {
        wanted: String,
        error: StreamError,
        available: Vec<String>,
    },
}

fn normalize_device_name(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

fn open_named_output_stream(wanted: &str) -> Result<OutputStream, NamedDeviceStreamError> {
    let wanted_norm = normalize_device_name(wanted);

    let host = rodio::cpal::default_host();
    let mut available: Vec<String> = Vec::new();
    let mut selected = None;

    if let Ok(devices) = host.output_devices() {
        for d in devices {
            let name = d.name().unwrap_or_else(|_| "<unnamed>".to_owned());
            if selected.is_none() && normalize_device_name(&name) == wanted_norm {
                selected = Some(d);
            }
            available.push(name);
        }
    }

    let Some(device) = selected else {
        return Err(NamedDeviceStreamError::DeviceNotFound {
            wanted: wanted.to_owned(),
            available,
        });
    };

    OutputStreamBuilder::from_device(device)
        .and_then(|b| b.open_stream_or_fallback())
        .map_err(|error| NamedDeviceStreamError::OpenFailed {
            wanted: wanted.to_owned(),
            error,
            available,
        })
}

fn format_device_list(devices: &[String]) -> String {
    if devices.is_empty() {
        return "<unknown>".to_owned();
    }
    devices.join(", ")
}

fn format_stream_error_details(err: StreamError, wanted: Option<&str>, context: &str) -> String {
    let mut s = format!("{context}: {err}");
    if let Some(w) = wanted {
        s.push_str(&format!(" (configured_device={w})"));
    }
    #[cfg(feature = "playback-device-enum")]
    {
        if let Ok(devices) = enumerate_output_device_names() {
            if devices.is_empty() {
                s.push_str("; available_output_devices=<none>");
            } else {
                s.push_str("; available_output_devices=");
                s.push_str(&devices.join(", "));
            }
        }
    }
    s
}

#[cfg(feature = "playback-device-enum")]
pub fn enumerate_output_device_names() -> Result<Vec<String>, PlaybackError> {
    let host = rodio::cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| PlaybackError::AudioOutputUnavailable {
            details: format!("failed to list output devices: {e}"),
        })?;

    Ok(devices
        .map(|d| d.name().unwrap_or_else(|_| "<unnamed>".to_owned()))
        .collect())
}
