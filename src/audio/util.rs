//! Shared audio helpers for device selection and sample conversion.

use anyhow::{Context, Result};
use cpal::traits::DeviceTrait;
use cpal::{Device, SampleFormat, SupportedStreamConfig, SupportedStreamConfigRange};

/// Get a human-readable device name.
pub fn get_device_name(device: &Device) -> String {
    device.description().ok().map(|desc| desc.name().to_string()).unwrap_or_else(|| "Unknown".to_string())
}

/// Pick the output configuration for a clip.
///
/// Prefers an F32 mono or stereo configuration that supports the clip's own sample rate, so no
/// resampling is needed. Otherwise the closest rate of the first F32 configuration is used.
///
/// # Errors
/// Returns an error if the device exposes no F32 mono/stereo configuration.
pub fn find_output_config(device: &Device, clip_sample_rate: u32) -> Result<SupportedStreamConfig> {
    let configs = device.supported_output_configs().context("Failed to get supported output configs")?;
    choose_config(configs, clip_sample_rate)
}

fn choose_config(configs: impl Iterator<Item = SupportedStreamConfigRange>, target_sample_rate: u32) -> Result<SupportedStreamConfig> {
    let candidates: Vec<SupportedStreamConfigRange> = configs.filter(|c| c.channels() <= 2 && c.sample_format() == SampleFormat::F32).collect();

    if let Some(config) = candidates.iter().find(|c| (c.min_sample_rate()..=c.max_sample_rate()).contains(&target_sample_rate)) {
        return Ok((*config).with_sample_rate(target_sample_rate));
    }

    let config = candidates.first().context("No F32 output configuration available")?;
    let rate = target_sample_rate.clamp(config.min_sample_rate(), config.max_sample_rate());
    Ok((*config).with_sample_rate(rate))
}

/// Mix interleaved samples down to mono by averaging channels.
pub fn convert_to_mono_f32_f32(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        data.to_vec()
    } else {
        data.chunks(channels).map(|frame| frame.iter().sum::<f32>() / channels as f32).collect()
    }
}
