//! Error taxonomy shared by the request, narration and command paths.
//!
//! Every variant except [`Error::Settings`] is recoverable: the session reports it and returns
//! to the prompt. Settings storage failures abort startup.

use std::path::PathBuf;

/// Errors surfaced by the narrator core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The watchdog cancelled the in-flight chat request.
    #[error("server took too long to respond, send the question again")]
    Timeout,

    /// Transport failure talking to the chat or speech endpoint.
    #[error("network error: {0}")]
    Network(String),

    /// Well-formed error payload returned by the chat API.
    #[error("{0}")]
    Api(String),

    /// Response body that could not be decoded; carries the raw body.
    #[error("unexpected response: {0}")]
    Parse(String),

    /// Audio clip that could not be decoded or played.
    #[error("cannot decode audio clip {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// No usable audio output device.
    #[error("audio output unavailable: {0}")]
    Playback(String),

    /// Malformed or rejected in-session command.
    #[error("{0}")]
    InvalidCommand(String),

    /// Settings storage could not be read or written.
    #[error("settings file {}: {reason}", path.display())]
    Settings { path: PathBuf, reason: String },
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
