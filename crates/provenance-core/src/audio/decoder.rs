//! Audio decoding for multiple formats

use super::{probe, AudioFormat};
use crate::error::{Error, Result};
use std::io::Cursor;
use std::path::Path;

/// Decoded audio data
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Interleaved samples in [-1, 1]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_ms: u32,
}

impl AudioData {
    pub(super) fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let frames_per_second = (sample_rate as u64 * channels.max(1) as u64).max(1) as f64;
        let duration_ms = (samples.len() as f64 / frames_per_second * 1000.0) as u32;
        Self {
            samples,
            sample_rate,
            channels,
            duration_ms,
        }
    }

    /// Convert to mono by averaging channels
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        let mut mono = Vec::with_capacity(self.samples.len() / self.channels as usize);
        for chunk in self.samples.chunks(self.channels as usize) {
            let avg: f32 = chunk.iter().sum::<f32>() / chunk.len() as f32;
            mono.push(avg);
        }
        mono
    }
}

/// Decode an audio file at its native sample rate, downmixed to mono
pub fn decode_file(path: &Path) -> Result<AudioData> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::decode(format!("failed to read {}", path.display()), e))?;
    let hint = path.extension().and_then(|e| e.to_str());
    decode_bytes(&bytes, hint)
}

/// Decode in-memory audio at its native sample rate, downmixed to mono.
///
/// `hint` is a file extension used to pick the decoder; without one (or
/// with an unrecognized one) the container is probed.
pub fn decode_bytes(bytes: &[u8], hint: Option<&str>) -> Result<AudioData> {
    if bytes.is_empty() {
        return Err(Error::Decode("empty input".into()));
    }

    let format = hint.map(AudioFormat::from_extension).unwrap_or(AudioFormat::Unknown);

    let mut audio_data = match format {
        AudioFormat::Wav => decode_wav(bytes)?,
        AudioFormat::Mp3 => decode_mp3(bytes)?,
        AudioFormat::Flac => decode_flac(bytes)?,
        AudioFormat::Ogg => decode_ogg(bytes)?,
        AudioFormat::Unknown => probe::decode_probed(bytes, hint)?,
    };

    if audio_data.samples.is_empty() || audio_data.sample_rate == 0 {
        return Err(Error::Decode("stream contains no audio samples".into()));
    }
    if audio_data.samples.iter().any(|s| !s.is_finite()) {
        return Err(Error::Decode("stream contains non-finite samples".into()));
    }

    if audio_data.channels > 1 {
        audio_data.samples = audio_data.to_mono();
        audio_data.channels = 1;
    }

    Ok(audio_data)
}

fn decode_wav(bytes: &[u8]) -> Result<AudioData> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| Error::decode("invalid WAV stream", e))?;

    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::decode("WAV decode error", e))?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::decode("WAV decode error", e))?
        }
    };

    Ok(AudioData::new(samples, spec.sample_rate, spec.channels))
}

fn decode_mp3(bytes: &[u8]) -> Result<AudioData> {
    let mut decoder = minimp3::Decoder::new(bytes);
    let mut samples = Vec::new();
    let mut sample_rate = 0;
    let mut channels = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = frame.sample_rate as u32;
                    channels = frame.channels as u16;
                }
                samples.extend(frame.data.iter().map(|&s| s as f32 / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => continue,
            Err(e) => return Err(Error::decode("MP3 decode error", e)),
        }
    }

    if sample_rate == 0 {
        return Err(Error::Decode("no MPEG audio frames found".into()));
    }

    Ok(AudioData::new(samples, sample_rate, channels))
}

fn decode_flac(bytes: &[u8]) -> Result<AudioData> {
    let mut reader = claxon::FlacReader::new(Cursor::new(bytes))
        .map_err(|e| Error::decode("invalid FLAC stream", e))?;

    let info = reader.streaminfo();
    let max_val = (1i64 << (info.bits_per_sample.max(1) - 1)) as f32;
    let samples: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|v| v as f32 / max_val))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::decode("FLAC decode error", e))?;

    Ok(AudioData::new(samples, info.sample_rate, info.channels as u16))
}

fn decode_ogg(bytes: &[u8]) -> Result<AudioData> {
    let mut reader = lewton::inside_ogg::OggStreamReader::new(Cursor::new(bytes))
        .map_err(|e| Error::decode("invalid OGG stream", e))?;

    let sample_rate = reader.ident_hdr.audio_sample_rate;
    let channels = reader.ident_hdr.audio_channels as u16;

    let mut samples = Vec::new();
    while let Some(packet) = reader
        .read_dec_packet_itl()
        .map_err(|e| Error::decode("OGG decode error", e))?
    {
        samples.extend(packet.iter().map(|&s| s as f32 / 32768.0));
    }

    Ok(AudioData::new(samples, sample_rate, channels))
}
