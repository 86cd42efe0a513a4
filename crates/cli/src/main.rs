#![deny(warnings)]

mod shell;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use readaloud_core::config::{
    resolve_api_key, resolve_string_with_default, resolve_voice, AppConfig, AzureRegion, Env,
    PollInterval, StdEnv, SynthKind, DEFAULT_AZURE_REGION, DEFAULT_POLL_INTERVAL_MS,
    ENV_AZURE_SPEECH_KEY, ENV_AZURE_SPEECH_REGION,
};
use readaloud_core::playback::{NullEngine, PlaybackEngine, RodioEngine};
use readaloud_core::transport::{Controls, TransportController, UiEvent};
use readaloud_core::tts::{AzureTtsClient, EdgeTtsClient, Synthesizer, ToneSynthesizer};
use readaloud_core::voice::VoiceId;
use shell::Command;
use std::path::PathBuf;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing_subscriber::EnvFilter;

type Controller = TransportController<Box<dyn Synthesizer>, Box<dyn PlaybackEngine>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SynthArg {
    Edge,
    Azure,
    Tone,
}

impl From<SynthArg> for SynthKind {
    fn from(value: SynthArg) -> Self {
        match value {
            SynthArg::Edge => SynthKind::Edge,
            SynthArg::Azure => SynthKind::Azure,
            SynthArg::Tone => SynthKind::Tone,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "readaloud")]
#[command(about = "Type text, hear it spoken (neural TTS with play/pause/stop)")]
struct Args {
    /// Speak this text once and exit when playback ends. Starts the interactive shell when omitted.
    text: Option<String>,

    #[arg(long)]
    voice: Option<String>,

    #[arg(long, value_enum, default_value_t = SynthArg::Edge)]
    synth: SynthArg,

    #[arg(long)]
    azure_speech_key: Option<String>,

    #[arg(long)]
    azure_region: Option<String>,

    #[arg(long)]
    output_device: Option<String>,

    /// Directory for the per-session audio file (defaults to the system temp dir).
    #[arg(long)]
    asset_dir: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    poll_interval_ms: u64,

    /// Synthesize but skip the audio device.
    #[arg(long)]
    no_audio: bool,

    #[arg(long)]
    list_voices: bool,

    /// With --list-voices, ask the selected speech service instead of printing the built-in list.
    #[arg(long, requires = "list_voices")]
    remote: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let cfg = build_config(&args, &env)?;

    if args.list_voices {
        return list_voices(&cfg, args.remote).await;
    }

    cfg.validate()?;
    tracing::info!(
        voice = %cfg.voice,
        synth = ?cfg.synth,
        audio = cfg.audio_enabled,
        "config loaded"
    );

    let (controller, events) =
        TransportController::new(build_synth(&cfg)?, build_engine(&cfg), cfg.transport_options());

    match args.text {
        Some(text) => speak_once(controller, events, &text, &cfg.voice).await,
        None => run_shell(controller, events, cfg.voice.clone()).await,
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(args: &Args, env: &impl Env) -> anyhow::Result<AppConfig> {
    let voice = resolve_voice(args.voice.clone(), env)?;
    let azure_key = resolve_api_key(args.azure_speech_key.clone(), ENV_AZURE_SPEECH_KEY, env)?;
    let azure_region = AzureRegion::new(resolve_string_with_default(
        args.azure_region.clone(),
        ENV_AZURE_SPEECH_REGION,
        env,
        DEFAULT_AZURE_REGION,
    ))?;
    let poll_interval = PollInterval::new(args.poll_interval_ms)?;

    Ok(AppConfig {
        voice,
        synth: args.synth.into(),
        azure_key,
        azure_region,
        output_device: args.output_device.clone(),
        poll_interval,
        audio_enabled: !args.no_audio,
        asset_dir: args.asset_dir.clone(),
    })
}

fn build_synth(cfg: &AppConfig) -> anyhow::Result<Box<dyn Synthesizer>> {
    let synth: Box<dyn Synthesizer> = match cfg.synth {
        SynthKind::Edge => Box::new(EdgeTtsClient::new()),
        SynthKind::Azure => {
            let key = cfg
                .azure_key
                .clone()
                .with_context(|| format!("azure speech key is required ({ENV_AZURE_SPEECH_KEY})"))?;
            Box::new(AzureTtsClient::new(key, &cfg.azure_region))
        }
        SynthKind::Tone => Box::new(ToneSynthesizer::new()),
    };
    Ok(synth)
}

fn build_engine(cfg: &AppConfig) -> Box<dyn PlaybackEngine> {
    if !cfg.audio_enabled {
        return Box::new(NullEngine::new());
    }
    let engine = match &cfg.output_device {
        Some(name) => RodioEngine::new().with_output_device_name(name.clone()),
        None => RodioEngine::new(),
    };
    Box::new(engine)
}

async fn list_voices(cfg: &AppConfig, remote: bool) -> anyhow::Result<()> {
    if !remote {
        println!("{}", shell::render_voices(&cfg.voice));
        return Ok(());
    }

    if cfg.synth != SynthKind::Azure {
        let voices = EdgeTtsClient::new()
            .list_voices()
            .await
            .context("failed to fetch voice list")?;
        for name in voices {
            println!("{name}");
        }
        return Ok(());
    }

    let key = cfg
        .azure_key
        .clone()
        .with_context(|| format!("--remote needs an azure speech key ({ENV_AZURE_SPEECH_KEY})"))?;
    let voices = AzureTtsClient::new(key, &cfg.azure_region)
        .list_voices()
        .await
        .context("failed to fetch voice list")?;

    for v in voices {
        println!(
            "{:<36} {:<10} {:<7} {}",
            v.short_name, v.locale, v.gender, v.display_name
        );
    }
    Ok(())
}

async fn speak_once(
    mut controller: Controller,
    mut events: UnboundedReceiver<UiEvent>,
    text: &str,
    voice: &VoiceId,
) -> anyhow::Result<()> {
    if let Err(err) = controller.speak(text, voice) {
        controller.shutdown().await;
        return Err(err.into());
    }

    let mut failure = None;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(UiEvent::Finished(_)) | None => break,
                Some(UiEvent::Error(err)) => {
                    eprintln!("{}", shell::render_dialog(&err));
                    failure = Some(err);
                    break;
                }
                Some(UiEvent::Controls(_)) => {}
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    controller.shutdown().await;
    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

async fn run_shell(
    mut controller: Controller,
    mut events: UnboundedReceiver<UiEvent>,
    mut voice: VoiceId,
) -> anyhow::Result<()> {
    let mut input = spawn_stdin_reader()?;
    println!("{}", shell::HELP);
    println!("{}", shell::render_controls(&Controls::idle()));

    loop {
        tokio::select! {
            line = input.recv() => {
                let Some(line) = line else { break };
                match Command::parse(&line) {
                    Command::Speak(text) => {
                        if let Err(err) = controller.speak(&text, &voice) {
                            println!("{}", shell::render_dialog(&err));
                        }
                    }
                    Command::Pause => {
                        controller.pause();
                    }
                    Command::Stop => controller.stop(),
                    Command::Voice(None) => println!("voice: {voice}"),
                    Command::Voice(Some(v)) => {
                        voice = VoiceId::new(v);
                        if voice.catalog_entry().is_none() {
                            tracing::warn!(voice = %voice, "voice is not in the built-in list; the service may reject it");
                        }
                        println!("voice: {voice}");
                    }
                    Command::Voices => println!("{}", shell::render_voices(&voice)),
                    Command::Help => println!("{}", shell::HELP),
                    Command::Quit => break,
                    Command::Empty => {}
                }
            }
            Some(event) = events.recv() => println!("{}", shell::render_event(&event)),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.shutdown().await;
    Ok(())
}

/// Reads stdin on a plain thread so a pending read never holds up runtime shutdown.
fn spawn_stdin_reader() -> anyhow::Result<UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("readaloud-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}
