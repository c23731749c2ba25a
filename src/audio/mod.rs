use std::{error, fmt};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

mod buffer;
mod voice;
pub mod pulse;

pub use buffer::{BufferBackend, BufferVoice};
pub use voice::{AudioBackend, GenericResult, NullBackend, NullVoice, Voice};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    S8,
    S16LE,
    S32LE,
}

impl SampleFormat {
    pub fn sample_bytes(self) -> usize {
        use SampleFormat::*;
        match self {
            S8 => 1,
            S16LE => 2,
            S32LE => 4,
        }
    }
}

impl Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use SampleFormat::*;
        match self {
            S8 => write!(f, "Signed 8 bit"),
            S16LE => write!(f, "Signed 16 bit Little Endian"),
            S32LE => write!(f, "Signed 32 bit Little Endian"),
        }
    }
}

impl FromStr for SampleFormat {
    type Err = SampleFormatError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S8" => Ok(SampleFormat::S8),
            "S16_LE" => Ok(SampleFormat::S16LE),
            "S32_LE" => Ok(SampleFormat::S32LE),
            _ => Err(SampleFormatError::InvalidSampleFormat),
        }
    }
}

/// Errors that are possible from a `SampleFormat`.
#[derive(Error, Debug)]
pub enum SampleFormatError {
    #[error("Must be in [S8, S16_LE, S32_LE]")]
    InvalidSampleFormat,
}

/// Valid directions of an audio stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamDirection {
    Playback,
    Capture,
}

/// PCM parameters of a host voice.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AudioSettings {
    pub freq: u32,
    pub nchannels: u8,
    pub format: SampleFormat,
}

impl AudioSettings {
    pub fn new(freq: u32, nchannels: u8, format: SampleFormat) -> Self {
        AudioSettings { freq, nchannels, format }
    }

    pub fn frame_size(&self) -> usize {
        self.format.sample_bytes() * self.nchannels as usize
    }

    pub fn bytes_per_second(&self) -> u64 {
        self.frame_size() as u64 * u64::from(self.freq)
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        AudioSettings::new(48000, 2, SampleFormat::S16LE)
    }
}

impl Display for AudioSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}Hz, {} channels, {}", self.freq, self.nchannels, self.format)
    }
}

/// Errors that can pass across threads.
pub type BoxError = Box<dyn error::Error + Send + Sync>;

/// Errors that are possible when choosing an audio backend by name.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("unknown audio backend '{0}', must be in [pa, none]")]
    UnknownBackend(String),
    #[error("PulseAudio: {0}")]
    Pulse(pulse::PulseError),
}

/// Creates the host audio backend called `name`.
pub fn audio_backend_from_name(name: &str) -> Result<Box<dyn AudioBackend>, BackendError> {
    match name {
        "pa" | "pulse" | "pulseaudio" => {
            let client = pulse::PulseClient::connect()
                .map_err(BackendError::Pulse)?;
            Ok(Box::new(client))
        }
        "none" | "null" => Ok(Box::new(NullBackend::new())),
        _ => Err(BackendError::UnknownBackend(name.to_string())),
    }
}
