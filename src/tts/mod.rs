//! Text-to-speech narration of answers.
//!
//! Clips are synthesized remotely, one request per fragment, and played locally in order.

mod fetcher;
mod narrator;

pub use fetcher::{ClipSource, HttpFetcher};
pub use narrator::{NarrationReport, Narrator};
