//! Audio playback module using cpal.
//!
//! One [`Player`] is opened per clip, sized to the clip's sample rate. Samples are handed to the
//! audio callback through a lock-free ring buffer; the calling thread polls for completion or an
//! external stop request.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use tracing::{debug, warn};

use super::resampler::resample_clip;
use super::util::{find_output_config, get_device_name};

/// Size of the playback ring buffer in samples (~5 seconds at 48kHz).
/// Longer clips are fed in while playing.
const PLAYBACK_RING_SIZE: usize = 262144;

/// Interval between completion/stop checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Audio player bound to the default output device.
pub struct Player {
    /// Kept alive to maintain the audio stream; dropping it releases the device
    _stream: Stream,
    /// Sample rate of the audio device
    device_sample_rate: u32,
    /// Sample rate of the clip being played
    input_sample_rate: u32,
    /// Ring buffer producer (mutex protects queue access from the polling thread)
    producer: Mutex<ringbuf::HeapProd<f32>>,
    /// Makes the callback output silence
    silenced: Arc<AtomicBool>,
    /// Cleared by the callback once the ring buffer runs dry
    playing: Arc<AtomicBool>,
}

impl Player {
    /// Open the default output device for a clip.
    ///
    /// # Arguments
    /// * `sample_rate` - The clip's sample rate; the device runs at this rate when it can
    ///
    /// # Errors
    /// Returns an error if no output device or F32 configuration is available, or the stream
    /// cannot be started.
    pub fn new(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().context("No output device available")?;

        let config = find_output_config(&device, sample_rate)?;
        let device_sample_rate = config.sample_rate();
        let channels = config.channels() as usize;

        debug!("Playing on {} at {} Hz, {} channel(s) (clip {} Hz)", get_device_name(&device), device_sample_rate, channels, sample_rate);

        let ring = HeapRb::<f32>::new(PLAYBACK_RING_SIZE);
        let (producer, mut consumer) = ring.split();

        let silenced = Arc::new(AtomicBool::new(false));
        let playing = Arc::new(AtomicBool::new(false));
        let silenced_clone = silenced.clone();
        let playing_clone = playing.clone();

        let stream_config: StreamConfig = config.config();

        let err_fn = |err| {
            tracing::error!("Audio playback error: {}", err);
        };

        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let silenced = silenced_clone.load(Ordering::Relaxed);

                for frame in data.chunks_mut(channels) {
                    let sample = if silenced { 0.0 } else { consumer.try_pop().unwrap_or(0.0) };
                    // Duplicate mono sample to all channels
                    for channel in frame.iter_mut() {
                        *channel = sample;
                    }
                }

                if consumer.is_empty() || silenced {
                    playing_clone.store(false, Ordering::SeqCst);
                }
            },
            err_fn,
            None,
        )?;

        stream.play().context("Failed to start playback stream")?;

        Ok(Self { _stream: stream, device_sample_rate, input_sample_rate: sample_rate, producer: Mutex::new(producer), silenced, playing })
    }

    /// Play mono samples, blocking until they finish or `stop` returns true.
    ///
    /// # Returns
    /// `true` if playback completed, `false` if stopped.
    pub fn play(&self, samples: &[f32], stop: &dyn Fn() -> bool) -> bool {
        if samples.is_empty() {
            return true;
        }

        let samples_to_play = if self.device_sample_rate != self.input_sample_rate {
            match resample_clip(samples, self.input_sample_rate, self.device_sample_rate) {
                Ok(resampled) => resampled,
                Err(e) => {
                    tracing::error!("Resampling failed: {}, playing without resampling", e);
                    samples.to_vec()
                }
            }
        } else {
            samples.to_vec()
        };

        let duration_secs = samples_to_play.len() as f64 / self.device_sample_rate as f64;
        let deadline = Instant::now() + Duration::from_secs_f64(duration_secs + 1.0);

        let mut queued = self.enqueue(&samples_to_play);
        self.playing.store(true, Ordering::SeqCst);

        loop {
            if stop() {
                debug!("Playback stopped");
                self.silence();
                return false;
            }

            if queued < samples_to_play.len() {
                let written = self.enqueue(&samples_to_play[queued..]);
                if written > 0 {
                    queued += written;
                    self.playing.store(true, Ordering::SeqCst);
                }
            } else if !self.playing.load(Ordering::SeqCst) {
                break;
            }

            if Instant::now() > deadline {
                warn!("Playback timeout exceeded");
                self.silence();
                return false;
            }

            std::thread::sleep(POLL_INTERVAL);
        }

        debug!("Playback completed ({} samples at {} Hz)", samples_to_play.len(), self.device_sample_rate);
        true
    }

    fn enqueue(&self, samples: &[f32]) -> usize {
        self.producer.lock().push_slice(samples)
    }

    /// Make the callback output silence for the rest of this player's life.
    fn silence(&self) {
        self.silenced.store(true, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.silence();
    }
}
