//! Audio decoding
//!
//! Supports WAV, MP3, FLAC and OGG using pure Rust decoders, with Symphonia
//! probing as a fallback for inputs whose container cannot be told from
//! their name.

mod decoder;
mod probe;

pub use decoder::{decode_bytes, decode_file, AudioData};

use std::path::Path;

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    Ogg,
    Unknown,
}

impl AudioFormat {
    /// Detect format from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => AudioFormat::Wav,
            "mp3" => AudioFormat::Mp3,
            "flac" => AudioFormat::Flac,
            "ogg" | "oga" => AudioFormat::Ogg,
            _ => AudioFormat::Unknown,
        }
    }

    /// Detect format from a file path or bare file name
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(AudioFormat::Unknown)
    }

    pub fn extension(&self) -> Option<&'static str> {
        match self {
            AudioFormat::Wav => Some("wav"),
            AudioFormat::Mp3 => Some("mp3"),
            AudioFormat::Flac => Some("flac"),
            AudioFormat::Ogg => Some("ogg"),
            AudioFormat::Unknown => None,
        }
    }
}

/// Whether a file name carries one of the recognized audio extensions
pub fn is_audio_file(path: &Path) -> bool {
    AudioFormat::from_path(path) != AudioFormat::Unknown
}
