use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

pub const DEFAULT_VOICE: &str = "en-US-GuyNeural";
const FALLBACK_LOCALE: &str = "en-US";

/// Opaque neural voice name, passed through to the synthesizer untouched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct VoiceId(pub String);

impl VoiceId {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `en-GB-RyanNeural` -> `en-GB`, `zh-Hant-HK-HiuMaanNeural` -> `zh-HK`.
    /// Names without a locale prefix map to `en-US`.
    pub fn locale(&self) -> Cow<'_, str> {
        let parts: Vec<&str> = self.0.split('-').collect();
        match parts.as_slice() {
            [lang, script, region, _, ..]
                if is_alpha(lang, 2..=3) && is_alpha(script, 4..=4) && is_region(region) =>
            {
                Cow::Owned(format!("{lang}-{region}"))
            }
            [lang, region, _, ..] if is_alpha(lang, 2..=3) && is_alpha(region, 2..=4) => {
                Cow::Borrowed(&self.0[..lang.len() + 1 + region.len()])
            }
            _ => Cow::Borrowed(FALLBACK_LOCALE),
        }
    }

    pub fn catalog_entry(&self) -> Option<&'static VoiceInfo> {
        VOICES.iter().find(|v| v.id == self.0)
    }
}

impl Default for VoiceId {
    fn default() -> Self {
        Self::new(DEFAULT_VOICE)
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_alpha(s: &str, len: std::ops::RangeInclusive<usize>) -> bool {
    len.contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphabetic())
}

fn is_region(s: &str) -> bool {
    s.len() == 2 && s.chars().all(|c| c.is_ascii_uppercase())
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub enum Gender {
    Female,
    Male,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct VoiceInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub gender: Gender,
}

pub const VOICES: [VoiceInfo; 7] = [
    VoiceInfo {
        id: "en-US-AriaNeural",
        label: "US Female 1",
        gender: Gender::Female,
    },
    VoiceInfo {
        id: "en-US-JennyNeural",
        label: "US Female 2",
        gender: Gender::Female,
    },
    VoiceInfo {
        id: "en-US-GuyNeural",
        label: "US Male 1",
        gender: Gender::Male,
    },
    VoiceInfo {
        id: "en-GB-LibbyNeural",
        label: "UK Female 1",
        gender: Gender::Female,
    },
    VoiceInfo {
        id: "en-GB-SoniaNeural",
        label: "UK Female 2",
        gender: Gender::Female,
    },
    VoiceInfo {
        id: "en-GB-RyanNeural",
        label: "UK Male 1",
        gender: Gender::Male,
    },
    VoiceInfo {
        id: "en-GB-ThomasNeural",
        label: "UK Male 2",
        gender: Gender::Male,
    },
];
