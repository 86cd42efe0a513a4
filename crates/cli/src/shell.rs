use readaloud_core::transport::{Controls, TransportError, UiEvent};
use readaloud_core::voice::{VoiceId, VOICES};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Speak(String),
    Pause,
    Stop,
    Voice(Option<String>),
    Voices,
    Help,
    Quit,
    Empty,
}

impl Command {
    /// Any line that is not a known command is spoken as-is.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }

        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match (head.to_ascii_lowercase().as_str(), rest.is_empty()) {
            ("speak" | "say", _) => Self::Speak(rest.to_owned()),
            ("pause" | "resume" | "p", true) => Self::Pause,
            ("stop" | "s", true) => Self::Stop,
            ("voice", true) => Self::Voice(None),
            ("voice", false) => Self::Voice(Some(rest.to_owned())),
            ("voices", true) => Self::Voices,
            ("help" | "?", true) => Self::Help,
            ("quit" | "exit" | "q", true) => Self::Quit,
            _ => Self::Speak(line.to_owned()),
        }
    }
}

pub const HELP: &str = "\
commands:
  speak <text>   synthesize and play <text> (bare text works too)
  pause          pause / resume playback
  stop           stop playback
  voice [id]     show or change the voice
  voices         list the built-in voices
  quit           stop and exit";

pub fn render_controls(c: &Controls) -> String {
    fn flag(name: &str, on: bool) -> String {
        if on {
            format!("[{name}]")
        } else {
            format!(" {name} ")
        }
    }
    format!(
        "{} {} {}",
        flag("Speak", c.speak_enabled),
        flag(c.pause_label.as_str(), c.pause_enabled),
        flag("Stop", c.stop_enabled)
    )
}

pub fn render_dialog(err: &TransportError) -> String {
    format!("!! {}: {err}", err.dialog_title())
}

pub fn render_event(event: &UiEvent) -> String {
    match event {
        UiEvent::Controls(c) => render_controls(c),
        UiEvent::Error(err) => render_dialog(err),
        UiEvent::Finished(_) => "(done)".to_owned(),
    }
}

pub fn render_voices(selected: &VoiceId) -> String {
    VOICES
        .iter()
        .map(|v| {
            let marker = if v.id == selected.as_str() { '*' } else { ' ' };
            format!("{marker} {:<20} {}", v.id, v.label)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
