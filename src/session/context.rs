//! Flags shared between the tasks of one question/answer turn.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Request-scoped state handed to every concurrent task of a turn.
///
/// Each flag has a single writer: the session raises `finished_thinking` once the response
/// arrives, the renderer (or the next turn) raises `interrupted`.
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    pub finished_thinking: Arc<AtomicBool>, // Read by the thinking indicator
    pub interrupted: Arc<AtomicBool>,       // Read by narration playback
}

impl TurnContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish_thinking(&self) {
        self.finished_thinking.store(true, Ordering::SeqCst);
    }

    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }
}
