//! Cue synthesis and WAV header parsing
//!
//! The built-in cues are short synthesized clips encoded as 16-bit mono PCM
//! WAV, so the binary ships no audio assets. Header parsing doubles as the
//! duration probe on platforms without a native one.

use std::f64::consts::TAU;
use std::time::Duration;

use thiserror::Error;

/// Sample rate of the synthesized cues
pub const SAMPLE_RATE: u32 = 22_050;

/// Errors from reading a WAV header
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WavError {
    #[error("Not a RIFF/WAVE file")]
    NotWave,

    #[error("Missing {0} chunk")]
    MissingChunk(&'static str),

    #[error("Invalid byte rate in fmt chunk")]
    InvalidByteRate,
}

/// Encode mono samples in -1.0..=1.0 as a 16-bit PCM WAV file
pub fn encode(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);

    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");

    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes()); // block align
    bytes.extend_from_slice(&16u16.to_le_bytes());

    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    bytes
}

/// Read the playing time from a WAV header
pub fn duration(bytes: &[u8]) -> Result<Duration, WavError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(WavError::NotWave);
    }

    let mut byte_rate = None;
    let mut data_len = None;
    let mut offset = 12;

    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = u32::from_le_bytes([
            bytes[offset + 4],
            bytes[offset + 5],
            bytes[offset + 6],
            bytes[offset + 7],
        ]) as usize;
        let body = offset + 8;

        match id {
            b"fmt " if body + 12 <= bytes.len() => {
                byte_rate = Some(u32::from_le_bytes([
                    bytes[body + 8],
                    bytes[body + 9],
                    bytes[body + 10],
                    bytes[body + 11],
                ]));
            }
            b"data" => {
                data_len = Some(size);
                break;
            }
            _ => {}
        }

        // Chunks are padded to an even length.
        offset = body + size + (size & 1);
    }

    let byte_rate = byte_rate.ok_or(WavError::MissingChunk("fmt"))?;
    let data_len = data_len.ok_or(WavError::MissingChunk("data"))?;
    if byte_rate == 0 {
        return Err(WavError::InvalidByteRate);
    }

    Ok(Duration::from_secs_f64(data_len as f64 / byte_rate as f64))
}

/// Rising ratchet clicks, like a kitchen timer being wound
pub fn windup() -> Vec<u8> {
    let mut samples = silence(Duration::from_millis(900));
    let mut at = 0.0;
    let mut gap = 0.09;
    while at < 0.85 {
        click(&mut samples, at, 1800.0 + at * 1200.0, 0.012, 0.6);
        at += gap;
        gap = (gap * 0.9_f64).max(0.03);
    }
    encode(&samples, SAMPLE_RATE)
}

/// Two seconds of alternating tick/tock, seamless when looped
pub fn ticking() -> Vec<u8> {
    let mut samples = silence(Duration::from_secs(2));
    for i in 0..4 {
        let pitch = if i % 2 == 0 { 2400.0 } else { 2000.0 };
        click(&mut samples, i as f64 * 0.5, pitch, 0.015, 0.5);
    }
    encode(&samples, SAMPLE_RATE)
}

/// A decaying bell
pub fn ding() -> Vec<u8> {
    let length = Duration::from_millis(1500);
    let mut samples = silence(length);
    for (i, sample) in samples.iter_mut().enumerate() {
        let t = i as f64 / SAMPLE_RATE as f64;
        let envelope = (-3.0 * t).exp();
        let tone = (TAU * 880.0 * t).sin() * 0.6 + (TAU * 1760.0 * t).sin() * 0.25;
        *sample = (tone * envelope * 0.8) as f32;
    }
    encode(&samples, SAMPLE_RATE)
}

fn silence(length: Duration) -> Vec<f32> {
    vec![0.0; (length.as_secs_f64() * SAMPLE_RATE as f64) as usize]
}

fn click(samples: &mut [f32], at: f64, pitch: f64, length: f64, gain: f64) {
    let start = (at * SAMPLE_RATE as f64) as usize;
    let count = (length * SAMPLE_RATE as f64) as usize;
    for (i, sample) in samples.iter_mut().skip(start).take(count).enumerate() {
        let t = i as f64 / SAMPLE_RATE as f64;
        let envelope = 1.0 - t / length;
        *sample += ((TAU * pitch * t).sin() * envelope * gain) as f32;
    }
}
