//! Audio output for narrated answers.
//!
//! Speech clips arrive as MP3 files. They are decoded with minimp3, resampled with rubato when the
//! device cannot run at the clip's rate, and played through cpal.

mod clip;
mod decoder;
mod playback;
pub mod resampler;
pub mod util;

pub use clip::{ClipPlayer, DevicePlayer, PlaybackOutcome};
