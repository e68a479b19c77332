//! The prompt loop: read a line, run a command or ask a question, render the answer.

use std::io::{self, Stdout, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use super::command::{Command, print_help};
use super::context::TurnContext;
use crate::audio::{ClipPlayer, DevicePlayer};
use crate::config::{AppConfig, SettingKey, Settings};
use crate::error::Error;
use crate::llm::{ChatClient, Conversation};
use crate::terminal::keys::{Hotkey, KeyStateProbe};
use crate::terminal::{Renderer, ThinkingIndicator, open_probe};
use crate::tts::{ClipSource, HttpFetcher, NarrationReport, Narrator};

/// Opens the hotkey reader used while an answer renders or a narration finishes.
pub type KeyReaderFactory = fn() -> Box<dyn KeyStateProbe>;

/// How often the cancel key is checked while waiting for a narration to end.
const KEY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What the loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// A narration running in the background.
struct Narration {
    context: TurnContext, // Turn whose answer is being narrated
    handle: JoinHandle<NarrationReport>,
}

/// One chat session: settings, conversation history and the narration side task.
pub struct Session<S: ClipSource = HttpFetcher, P: ClipPlayer = DevicePlayer, W: Write = Stdout> {
    config: AppConfig,
    settings: Settings,
    conversation: Conversation,
    client: ChatClient,
    narrator: Narrator<S, P>,
    narration: Option<Narration>,
    out: W,                   // Conversation output
    open_keys: KeyReaderFactory, // Hotkey source
}

impl Session {
    /// Create a session on the terminal, the speech endpoint and the default audio device.
    ///
    /// # Errors
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: AppConfig, settings: Settings) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.tts_url.clone(), config.audio_dir.clone())?;
        let narrator = Narrator::new(fetcher, DevicePlayer::new(!config.keep_audio), config.fragment_budget);
        Self::with_parts(config, settings, narrator, io::stdout(), open_probe)
    }
}

impl<S: ClipSource, P: ClipPlayer, W: Write> Session<S, P, W> {
    /// Create a session from its parts.
    ///
    /// # Arguments
    /// * `narrator` - Speaks answers when TTS is enabled
    /// * `out` - Where prompts, answers and command feedback are written
    /// * `open_keys` - Hotkey source for rendering and narration waits
    ///
    /// # Errors
    /// Returns an error if the chat HTTP client cannot be built.
    pub fn with_parts(config: AppConfig, settings: Settings, narrator: Narrator<S, P>, out: W, open_keys: KeyReaderFactory) -> Result<Self> {
        let client = ChatClient::new(config.printjson)?;
        Ok(Self { config, settings, conversation: Conversation::new(), client, narrator, narration: None, out, open_keys })
    }

    /// Ask the command-line question, then keep prompting in interactive mode.
    ///
    /// A one-shot session waits for its narration to finish, still honouring the cancel key; an
    /// interactive session stops it on the way out.
    ///
    /// # Errors
    /// Returns an error if stdin cannot be read or the output cannot be written.
    pub async fn run(mut self) -> Result<()> {
        if let Some(question) = self.config.question() {
            self.ask(&question).await?;
        }

        if self.config.is_interactive() {
            self.prompt_loop().await?;
            self.stop_narration().await;
        } else {
            self.finish_narration().await;
        }

        Ok(())
    }

    async fn prompt_loop(&mut self) -> Result<()> {
        loop {
            write!(self.out, "\r\n{}: ", "Question".green())?;
            self.out.flush()?;

            let Some(line) = read_line().await? else {
                debug!("Stdin closed");
                return Ok(());
            };

            let flow = match Command::parse(&line) {
                Ok(command) => self.execute(command).await?,
                Err(e) => {
                    self.report(&e)?;
                    Flow::Continue
                }
            };

            if flow == Flow::Quit {
                return Ok(());
            }
        }
    }

    async fn execute(&mut self, command: Command) -> io::Result<Flow> {
        match command {
            Command::Quit => return Ok(Flow::Quit),
            Command::Help => print_help(),
            Command::Cls => self.clear_screen()?,
            Command::ShowSettings => self.settings.print(),
            Command::Reset => self.reset()?,
            Command::Set { key, value } => self.set(key, &value)?,
            Command::Ask(question) => self.ask(&question).await?,
            Command::Empty => {}
        }
        Ok(Flow::Continue)
    }

    /// Apply a `set` command. Only a changed value is written back; if that write fails the new
    /// value stays active for this session.
    fn set(&mut self, key: SettingKey, value: &str) -> io::Result<()> {
        match self.settings.apply(key, value) {
            Ok(true) => {
                writeln!(self.out, "{} changed to \"{}\"", key, value)?;
                match self.settings.save(&self.config.settings) {
                    Ok(()) => Ok(()),
                    Err(e) => self.report(&e),
                }
            }
            Ok(false) => writeln!(self.out, "{} is already \"{}\"", key, value),
            Err(e) => self.report(&e),
        }
    }

    /// Start a new conversation with freshly loaded settings. A settings file that no longer
    /// loads is reported and the current settings are kept.
    fn reset(&mut self) -> io::Result<()> {
        self.clear_screen()?;
        match Settings::load(&self.config.settings) {
            Ok(settings) => self.settings = settings,
            Err(e) => self.report(&e)?,
        }
        if !self.conversation.is_empty() {
            info!("Dropping {} message(s) of conversation history", self.conversation.len());
            self.conversation.clear();
        }
        self.settings.print();
        writeln!(self.out, "Reset done. The conversation history was cleared.")?;
        writeln!(self.out, "Ready for a new conversation.")
    }

    /// Dispatch one question and present the answer.
    ///
    /// Request failures are reported and leave the session ready for the next question.
    async fn ask(&mut self, question: &str) -> io::Result<()> {
        let context = TurnContext::new();
        let indicator = ThinkingIndicator::new(self.settings.timeout, context.finished_thinking.clone()).spawn();

        let result = self.client.dispatch(&mut self.conversation, question, &self.settings).await;

        context.finish_thinking();
        if let Err(e) = indicator.await {
            debug!("Thinking indicator task failed: {}", e);
        }

        let completion = match result {
            Ok(completion) => completion,
            Err(e) => return self.report(&e),
        };
        let answer = completion.answer().unwrap_or_default().to_string();
        debug!("Conversation holds {} message(s)", self.conversation.len());

        write!(self.out, "\r{}: ", "Answer".blue())?;

        if self.settings.tts {
            self.start_narration(&answer, &context).await;
        }

        self.render(&answer, &context).await?;
        writeln!(self.out)
    }

    async fn render(&mut self, answer: &str, context: &TurnContext) -> io::Result<()> {
        let pace = !self.config.nosleep;
        let max_delay = self.settings.max_delay;
        let mut keys = (self.open_keys)();
        let mut renderer = Renderer::new(&mut self.out, keys.as_mut(), max_delay);
        let outcome = renderer.render(answer, pace, &context.interrupted).await?;
        if outcome.interrupted {
            debug!("Answer interrupted by the user");
        }
        Ok(())
    }

    /// Narrate in the background. A narration still running from an earlier answer is stopped
    /// first so the two never share clip files.
    async fn start_narration(&mut self, answer: &str, context: &TurnContext) {
        self.stop_narration().await;

        let narrator = self.narrator.clone();
        let text = answer.to_string();
        let language = self.settings.language.clone();
        let interrupted = context.interrupted.clone();
        let handle = tokio::spawn(async move { narrator.narrate(&text, &language, interrupted).await });

        self.narration = Some(Narration { context: context.clone(), handle });
    }

    async fn stop_narration(&mut self) {
        let Some(narration) = self.narration.take() else {
            return;
        };
        narration.context.interrupt();
        log_narration(narration.handle.await);
    }

    /// Wait for the running narration to end on its own. The cancel key still stops it.
    async fn finish_narration(&mut self) {
        let Some(mut narration) = self.narration.take() else {
            return;
        };

        let mut keys = (self.open_keys)();
        let result = loop {
            tokio::select! {
                result = &mut narration.handle => break result,
                _ = tokio::time::sleep(KEY_POLL_INTERVAL) => {
                    if keys.is_key_released(Hotkey::Cancel) {
                        debug!("Narration cancelled by the user");
                        narration.context.interrupt();
                    }
                }
            }
        };
        log_narration(result);
    }

    fn clear_screen(&mut self) -> io::Result<()> {
        execute!(self.out, Clear(ClearType::All), MoveTo(0, 0))
    }

    fn report(&mut self, error: &Error) -> io::Result<()> {
        writeln!(self.out, "\r\n{}", error.to_string().red())
    }
}

fn log_narration(result: std::result::Result<NarrationReport, JoinError>) {
    match result {
        Ok(report) => debug!("Narration ended: {:?}", report),
        Err(e) => warn!("Narration task failed: {}", e),
    }
}

/// Read one line from stdin without blocking the runtime.
///
/// # Returns
/// `None` at end of input.
async fn read_line() -> Result<Option<String>> {
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|read| (read > 0).then_some(line))
    })
    .await
    .context("Stdin reader task failed")?
    .context("Failed to read from stdin")?;
    Ok(line)
}

/// Show where the settings were loaded from at startup.
pub fn print_banner(settings: &Settings, path: &Path) {
    println!("{} version {}", "GPT Narrator".green(), env!("CARGO_PKG_VERSION").cyan());
    println!("---------------------------------------------------");
    debug!("Settings from {}, API key {}", path.display(), settings.masked_api_key());
    settings.print();
    println!("Type {} for more information", "help".cyan());
}
