//! Command-line arguments and process-level configuration.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

/// Default character budget of one narration fragment.
pub const DEFAULT_FRAGMENT_BUDGET: usize = 100;

/// Narrator command-line configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "gpt-narrator")]
#[command(author, version, about = "Ask a chat model from the terminal and hear the answer", long_about = None)]
pub struct AppConfig {
    /// Question to ask (all remaining words are joined). Starts interactive mode when omitted.
    pub question: Vec<String>,

    /// Print the answer at once, without the simulated typing delay
    #[arg(long)]
    pub nosleep: bool,

    /// Print the raw JSON payload returned by the chat API
    #[arg(long)]
    pub printjson: bool,

    /// Keep asking questions after the first answer, preserving the conversation context
    #[arg(long, short = 'i')]
    pub interactive: bool,

    /// Settings file (endpoint, API key, model, timeout, temperature, TTS, language, max delay)
    #[arg(long, short = 's', env = "GPT_NARRATOR_SETTINGS", default_value_os_t = default_settings_path())]
    pub settings: PathBuf,

    /// Directory where downloaded speech clips are stored
    #[arg(long, env = "GPT_NARRATOR_AUDIO_DIR", default_value_os_t = default_audio_dir())]
    pub audio_dir: PathBuf,

    /// Speech synthesis endpoint
    #[arg(long, env = "GPT_NARRATOR_TTS_URL", default_value = "http://translate.google.com/translate_tts")]
    pub tts_url: String,

    /// Maximum characters per narration fragment (the synthesis endpoint truncates longer text)
    #[arg(long, default_value_t = DEFAULT_FRAGMENT_BUDGET, value_parser = parse_fragment_budget)]
    pub fragment_budget: usize,

    /// Keep speech clips on disk after they are played
    #[arg(long)]
    pub keep_audio: bool,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl AppConfig {
    /// Parse configuration from command line arguments.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// The one-shot question, if any words were given.
    pub fn question(&self) -> Option<String> {
        let joined = self.question.join(" ");
        let trimmed = joined.trim();
        if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
    }

    /// Interactive mode is implied when no question is given.
    pub fn is_interactive(&self) -> bool {
        self.interactive || self.question().is_none()
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!("Configuration:");
        info!("  Settings file: {}", self.settings.display());
        info!("  Audio directory: {}", self.audio_dir.display());
        info!("  TTS endpoint: {}", self.tts_url);
        info!("  Fragment budget: {} chars", self.fragment_budget);
        info!("  Interactive: {}", self.is_interactive());
        info!("  Pacing: {}", if self.nosleep { "off" } else { "on" });
        info!("  Keep audio: {}", self.keep_audio);
    }
}

/// Directory holding narrator state (~/.gpt-narrator).
fn default_home() -> PathBuf {
    if let Some(home_dir) = dirs::home_dir() { home_dir.join(".gpt-narrator") } else { PathBuf::from(".") }
}

fn default_settings_path() -> PathBuf {
    default_home().join("settings.json")
}

fn default_audio_dir() -> PathBuf {
    default_home().join("audio")
}

/// Parse and validate the fragment budget (must be positive).
fn parse_fragment_budget(s: &str) -> Result<usize, String> {
    let value: usize = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if value == 0 { Err("fragment budget must be at least 1".to_string()) } else { Ok(value) }
}
