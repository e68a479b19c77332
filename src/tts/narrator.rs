//! Narration pipeline: split an answer into fragments, fetch every clip concurrently, then play
//! the clips one after another in answer order.
//!
//! Fetching and playback are two separate phases. Playback only starts once every fetch has
//! finished, so the play order never depends on which download completed first. A fragment
//! whose fetch failed has no clip and is skipped.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::fetcher::ClipSource;
use crate::audio::{ClipPlayer, PlaybackOutcome};
use crate::error::Error;

/// Character used for inline and block markup in answers. It is never spoken.
const MARKUP_DELIMITER: char = '`';

/// One word-bounded slice of the narrated text.
#[derive(Debug)]
pub struct AudioFragment {
    pub index: usize,          // Playback position
    pub text: String,          // Spoken text
    pub path: Option<PathBuf>, // Local clip, once fetched
    pub error: Option<Error>,  // Why no clip is available
}

/// Summary of one narration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NarrationReport {
    pub fragments: usize,
    pub played: usize,
    pub skipped: usize,
    pub interrupted: bool,
}

/// Remove markup delimiters from a copy of the text.
pub fn strip_markup(text: &str) -> String {
    text.chars().filter(|&c| c != MARKUP_DELIMITER).collect()
}

/// Split text into fragments of whole words.
///
/// Words are separated by single spaces. A fragment grows one word at a time until adding the
/// next word (and its separator) would reach `budget` characters; that word then starts the next
/// fragment. A single word longer than the budget becomes a fragment on its own. Joining the
/// fragments with single spaces gives back the input.
pub fn split_fragments(text: &str, budget: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    let mut words = 0usize;

    for word in text.split(' ') {
        let word_len = word.chars().count();
        if words > 0 && current_len + 1 + word_len >= budget {
            fragments.push(std::mem::take(&mut current));
            current_len = 0;
            words = 0;
        }
        if words > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
        words += 1;
    }

    fragments.push(current);
    fragments
}

/// Narrates answers through a clip source and a clip player.
pub struct Narrator<S: ClipSource, P: ClipPlayer> {
    source: Arc<S>,
    player: Arc<P>,
    fragment_budget: usize,
}

impl<S: ClipSource, P: ClipPlayer> Clone for Narrator<S, P> {
    fn clone(&self) -> Self {
        Self { source: self.source.clone(), player: self.player.clone(), fragment_budget: self.fragment_budget }
    }
}

impl<S: ClipSource, P: ClipPlayer> Narrator<S, P> {
    /// Create a narrator.
    ///
    /// # Arguments
    /// * `source` - Where clips are fetched from
    /// * `player` - Plays and removes fetched clips
    /// * `fragment_budget` - Maximum characters per fragment
    pub fn new(source: S, player: P, fragment_budget: usize) -> Self {
        Self { source: Arc::new(source), player: Arc::new(player), fragment_budget }
    }

    /// Speak `text` in `language`.
    ///
    /// Playback checks `interrupted` every poll interval and stops as soon as it is set. Clips not
    /// yet played are still handed to the player so they get cleaned up.
    pub async fn narrate(&self, text: &str, language: &str, interrupted: Arc<AtomicBool>) -> NarrationReport {
        let mut fragments: Vec<AudioFragment> = split_fragments(&strip_markup(text), self.fragment_budget)
            .into_iter()
            .enumerate()
            .map(|(index, text)| AudioFragment { index, text: text.trim().to_string(), path: None, error: None })
            .collect();

        if fragments.is_empty() {
            return NarrationReport::default();
        }

        self.fetch_all(&mut fragments, language).await;

        let player = self.player.clone();
        let count = fragments.len();
        match tokio::task::spawn_blocking(move || play_in_order(player.as_ref(), &fragments, &interrupted)).await {
            Ok(report) => {
                info!("Narration finished: {} of {} fragment(s) played{}", report.played, report.fragments, if report.interrupted { " (interrupted)" } else { "" });
                report
            }
            Err(e) => {
                warn!("Playback task failed: {}", e);
                NarrationReport { fragments: count, skipped: count, ..Default::default() }
            }
        }
    }

    /// Fetch every fragment concurrently and wait for all of them.
    async fn fetch_all(&self, fragments: &mut [AudioFragment], language: &str) {
        let mut fetches = JoinSet::new();
        for fragment in fragments.iter().filter(|f| !f.text.trim().is_empty()) {
            let source = self.source.clone();
            let text = fragment.text.clone();
            let language = language.to_string();
            let index = fragment.index;
            fetches.spawn(async move { (index, source.fetch(index, &text, &language).await) });
        }

        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((index, Ok(path))) => fragments[index].path = Some(path),
                Ok((index, Err(e))) => {
                    warn!("Fragment {} will be skipped: {}", index, e);
                    fragments[index].error = Some(e);
                }
                Err(e) => warn!("Fetch task failed: {}", e),
            }
        }
    }
}

fn play_in_order(player: &dyn ClipPlayer, fragments: &[AudioFragment], interrupted: &AtomicBool) -> NarrationReport {
    let stop = || interrupted.load(Ordering::SeqCst);
    let mut report = NarrationReport { fragments: fragments.len(), ..Default::default() };

    for fragment in fragments {
        let Some(path) = &fragment.path else {
            report.skipped += 1;
            continue;
        };

        match player.play(path, &stop) {
            Ok(PlaybackOutcome::Completed) => report.played += 1,
            Ok(PlaybackOutcome::Stopped) => {
                debug!("Fragment {} stopped", fragment.index);
                report.interrupted = true;
            }
            Err(e) => {
                warn!("Fragment {} skipped: {}", fragment.index, e);
                report.skipped += 1;
            }
        }
    }

    report
}
