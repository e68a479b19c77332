//! MP3 decoding of downloaded speech clips.

use std::io::Cursor;

use anyhow::Result;
use minimp3::{Decoder, Frame};
use tracing::debug;

use super::util::convert_to_mono_f32_f32;

/// A fully decoded clip, downmixed to mono.
#[derive(Debug, Clone)]
pub struct DecodedClip {
    pub samples: Vec<f32>, // Mono samples in [-1.0, 1.0]
    pub sample_rate: u32,  // Sample rate of the stream
    pub channels: usize,   // Channel count of the source stream
}

/// Decode an MP3 byte stream.
///
/// # Errors
/// Returns an error if the stream is corrupt or contains no audio frames.
pub fn decode_mp3(bytes: &[u8]) -> Result<DecodedClip> {
    let mut decoder = Decoder::new(Cursor::new(bytes));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;
    let mut channels = 0usize;

    loop {
        match decoder.next_frame() {
            Ok(Frame { data, sample_rate: rate, channels: frame_channels, .. }) => {
                if frame_channels == 0 {
                    continue;
                }
                if sample_rate == 0 {
                    sample_rate = rate as u32;
                    channels = frame_channels;
                }
                let frame: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                samples.extend(convert_to_mono_f32_f32(&frame, frame_channels));
            }
            Err(minimp3::Error::Eof) | Err(minimp3::Error::InsufficientData) => break,
            Err(minimp3::Error::SkippedData) => continue,
            Err(e) => anyhow::bail!("MP3 decoding failed: {:?}", e),
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        anyhow::bail!("no audio frames found");
    }

    debug!("Decoded {} samples at {} Hz ({} channel(s))", samples.len(), sample_rate, channels);
    Ok(DecodedClip { samples, sample_rate, channels })
}
