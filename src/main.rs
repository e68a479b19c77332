//! GPT Narrator - a terminal chat client that types out and reads aloud its answers.
//!
//! Questions go to an OpenAI-compatible chat completion endpoint. Answers are streamed to the
//! terminal one character at a time and, when enabled, narrated through a remote speech
//! synthesis endpoint.

mod audio;
mod config;
mod error;
mod llm;
mod session;
mod terminal;
mod tts;

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;

use config::{AppConfig, Settings};
use session::{Session, print_banner};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let config = AppConfig::from_args();

    // Stdout carries the conversation, so logs go to stderr and stay quiet unless asked for.
    // Respect RUST_LOG env var, fallback to verbose flag, default to warn
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| if config.verbose { EnvFilter::try_new("debug") } else { EnvFilter::try_new("warn") })
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::new(time::macros::format_description!("[hour]:[minute]:[second]")))
        .init();

    info!("GPT Narrator v{}", env!("CARGO_PKG_VERSION"));
    config.log_config();

    if !config.settings.exists() {
        Settings::default().save(&config.settings)?;
        anyhow::bail!("Created default settings at {}. Add your API key there and run again.", config.settings.display());
    }

    // Unreadable or invalid settings abort startup
    let settings = Settings::load(&config.settings)?;
    print_banner(&settings, &config.settings);

    let session = Session::new(config, settings)?;
    session.run().await?;

    debug!("Session ended");
    Ok(())
}
