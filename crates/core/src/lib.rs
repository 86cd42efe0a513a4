#![deny(warnings)]

pub mod config;
pub mod playback;
pub mod session;
pub mod transport;
pub mod tts;
pub mod voice;
