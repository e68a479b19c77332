//! Clip resampling with the rubato FFT resampler.
//!
//! Used when the output device cannot run at a clip's native sample rate.

use anyhow::{Context, Result};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{Fft, FixedSync, Resampler};

/// Chunk size for FFT-based resampling.
const CHUNK_SIZE: usize = 1024;

/// Number of sub-chunks for FFT processing (higher = better quality but more CPU).
const SUB_CHUNKS: usize = 2;

/// Resample a whole mono clip from one sample rate to another.
///
/// # Arguments
/// * `samples` - Mono input samples
/// * `from_rate` - Clip sample rate (e.g. 24000 for speech clips)
/// * `to_rate` - Device sample rate (e.g. 48000)
///
/// # Returns
/// Resampled mono samples, trimmed to the expected duration.
pub fn resample_clip(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = Fft::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, SUB_CHUNKS, 1, FixedSync::Input).context("Failed to create resampler")?;

    let output_frames_max = resampler.output_frames_max();
    let mut output_buffer = vec![0.0f32; output_frames_max];
    let expected_len = (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;

    // The FFT resampler lags by `delay` output frames; zero chunks flush the tail out.
    let delay = resampler.output_delay();
    let flush_chunks = delay.div_ceil(output_frames_max.max(1)) + 1;
    let mut output = Vec::with_capacity(expected_len + delay + output_frames_max);

    let mut chunk_buffer = vec![0.0f32; CHUNK_SIZE];
    for chunk in samples.chunks(CHUNK_SIZE).chain(std::iter::repeat_n(&[][..], flush_chunks)) {
        if output.len() >= expected_len + delay {
            break;
        }

        // Partial and flush chunks are zero-padded to a full FFT block.
        chunk_buffer[..chunk.len()].copy_from_slice(chunk);
        chunk_buffer[chunk.len()..].fill(0.0);

        let input_adapter = InterleavedSlice::new(&chunk_buffer, 1, CHUNK_SIZE).context("Failed to create input adapter")?;
        let mut output_adapter = InterleavedSlice::new_mut(&mut output_buffer, 1, output_frames_max).context("Failed to create output adapter")?;

        let (_, frames_written) = resampler
            .process_into_buffer(&input_adapter, &mut output_adapter, None)
            .map_err(|e| anyhow::anyhow!("Resampling error: {}", e))?;
        output.extend_from_slice(&output_buffer[..frames_written]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected_len);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_speech_clip_to_device_rate() {
        // One second of 24 kHz speech played on a 48 kHz device.
        let samples = vec![0.0; 24000];
        let result = resample_clip(&samples, 24000, 48000).unwrap();
        assert!(result.len() >= 47000 && result.len() <= 48000, "got {}", result.len());
    }

    #[test]
    fn test_resampled_clip_is_aligned_and_keeps_its_tail() {
        // Half a second of silence, then half a second of a steady level.
        let mut samples = vec![0.0f32; 12000];
        samples.extend(std::iter::repeat_n(0.5f32, 12000));

        let result = resample_clip(&samples, 24000, 48000).unwrap();

        assert_eq!(result.len(), 48000);
        let onset = result.iter().position(|s| s.abs() > 0.25).unwrap();
        assert!(onset.abs_diff(24000) < 200, "onset at {onset}");
        assert!((result[47000] - 0.5).abs() < 0.05, "tail sample {}", result[47000]);
    }

    #[test]
    fn test_same_rate_is_passthrough() {
        let samples = vec![0.25; 100];
        assert_eq!(resample_clip(&samples, 22050, 22050).unwrap(), samples);
    }
}
