//! Playback of a single downloaded clip file.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::decoder::decode_mp3;
use super::playback::Player;
use crate::error::{Error, Result};

/// How a clip's playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Stopped,
}

/// Plays a clip file and removes it afterwards.
///
/// Implementations block the calling thread until the clip finishes or `stop` returns true.
/// The file is gone when `play` returns, whatever the outcome.
pub trait ClipPlayer: Send + Sync + 'static {
    fn play(&self, clip: &Path, stop: &dyn Fn() -> bool) -> Result<PlaybackOutcome>;
}

/// Plays clips on the default output device.
#[derive(Debug, Clone)]
pub struct DevicePlayer {
    delete_after_play: bool,
}

impl DevicePlayer {
    pub fn new(delete_after_play: bool) -> Self {
        Self { delete_after_play }
    }
}

/// Removes the clip file when dropped.
struct ClipFile<'a> {
    path: &'a Path,
    delete: bool,
}

impl Drop for ClipFile<'_> {
    fn drop(&mut self) {
        if !self.delete {
            return;
        }
        if let Err(e) = std::fs::remove_file(self.path) {
            warn!("Failed to remove clip {}: {}", self.path.display(), e);
        }
    }
}

impl ClipPlayer for DevicePlayer {
    fn play(&self, clip: &Path, stop: &dyn Fn() -> bool) -> Result<PlaybackOutcome> {
        let _file = ClipFile { path: clip, delete: self.delete_after_play };

        if stop() {
            return Ok(PlaybackOutcome::Stopped);
        }

        let decode_error = |reason: String| Error::Decode { path: PathBuf::from(clip), reason };
        let bytes = std::fs::read(clip).map_err(|e| decode_error(e.to_string()))?;
        let decoded = decode_mp3(&bytes).map_err(|e| decode_error(e.to_string()))?;

        let player = Player::new(decoded.sample_rate).map_err(|e| Error::Playback(format!("{:#}", e)))?;
        if player.play(&decoded.samples, stop) {
            debug!("Played {} ({} Hz, {} channel(s) downmixed)", clip.display(), decoded.sample_rate, decoded.channels);
            Ok(PlaybackOutcome::Completed)
        } else {
            Ok(PlaybackOutcome::Stopped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_before_play_removes_clip() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("0.mp3");
        std::fs::write(&clip, b"not played").unwrap();

        let outcome = DevicePlayer::new(true).play(&clip, &|| true).unwrap();

        assert_eq!(outcome, PlaybackOutcome::Stopped);
        assert!(!clip.exists());
    }

    #[test]
    fn test_undecodable_clip_is_reported_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("1.mp3");
        std::fs::write(&clip, b"<html>quota exceeded</html>").unwrap();

        let err = DevicePlayer::new(true).play(&clip, &|| false).unwrap_err();

        assert!(matches!(err, Error::Decode { .. }), "got {err:?}");
        assert!(!clip.exists());
    }

    #[test]
    fn test_keep_audio_leaves_clip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("2.mp3");
        std::fs::write(&clip, b"kept").unwrap();

        DevicePlayer::new(false).play(&clip, &|| true).unwrap();

        assert!(clip.exists());
    }
}
