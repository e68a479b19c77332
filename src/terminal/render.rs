//! Character-by-character answer rendering with backtick markup.
//!
//! A run of exactly one backtick toggles the inline accent style, a run of exactly three toggles
//! the code block style, and any other run length is printed as-is. A run is resolved when the
//! next non-backtick character (or the end of the text) arrives.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::queue;
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use tracing::debug;

use super::keys::{Hotkey, KeyStateProbe};

/// Markup delimiter for inline code and code blocks.
pub const DELIMITER: char = '`';

/// Marker printed when the user cancels rendering.
pub const INTERRUPTED_MARKER: &str = " <interrupted>";

/// Delimiter counting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkupState {
    /// Not inside a delimiter run.
    #[default]
    Plain,
    /// Inside a run of this many consecutive delimiters.
    PendingRun(usize),
}

/// Active styles; both may be on at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Styles {
    pub inline: bool,
    pub block: bool,
}

/// Output produced by the markup scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    Char(char),
    Style(Styles),
}

/// Markup scanner: turns characters into literal output and style changes.
#[derive(Debug, Default)]
pub struct Markup {
    state: MarkupState,
    styles: Styles,
}

impl Markup {
    #[cfg(test)]
    pub fn state(&self) -> MarkupState {
        self.state
    }

    pub fn styles(&self) -> Styles {
        self.styles
    }

    /// Feed one character.
    pub fn feed(&mut self, c: char, out: &mut Vec<Emit>) {
        if c == DELIMITER {
            self.state = match self.state {
                MarkupState::Plain => MarkupState::PendingRun(1),
                MarkupState::PendingRun(n) => MarkupState::PendingRun(n + 1),
            };
            return;
        }
        self.resolve(out);
        out.push(Emit::Char(c));
    }

    /// Resolve a run left open at the end of the text.
    pub fn finish(&mut self, out: &mut Vec<Emit>) {
        self.resolve(out);
    }

    fn resolve(&mut self, out: &mut Vec<Emit>) {
        let MarkupState::PendingRun(run) = self.state else {
            return;
        };
        self.state = MarkupState::Plain;
        match run {
            1 => {
                self.styles.inline = !self.styles.inline;
                out.push(Emit::Style(self.styles));
            }
            3 => {
                self.styles.block = !self.styles.block;
                out.push(Emit::Style(self.styles));
            }
            n => out.extend(std::iter::repeat_n(Emit::Char(DELIMITER), n)),
        }
    }
}

/// Result of one render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOutcome {
    pub interrupted: bool,
}

/// Streams answers to a terminal with randomized per-character pacing.
pub struct Renderer<'a, W: Write> {
    out: W,                           // Terminal stream
    probe: &'a mut dyn KeyStateProbe, // Hotkey oracle
    max_delay_ms: u64,                // Upper bound (exclusive) of the per-character delay
}

impl<'a, W: Write> Renderer<'a, W> {
    pub fn new(out: W, probe: &'a mut dyn KeyStateProbe, max_delay_ms: u64) -> Self {
        Self { out, probe, max_delay_ms }
    }

    /// Render `text`, optionally paced.
    ///
    /// Before each pacing delay the probe is consulted: the cancel key stops rendering, prints
    /// the interrupted marker and raises `interrupted`; the fast-forward key disables pacing for
    /// the rest of this call. Styles are always reset before returning.
    ///
    /// # Errors
    /// Returns an error if writing to the terminal fails.
    pub async fn render(&mut self, text: &str, pace: bool, interrupted: &AtomicBool) -> io::Result<RenderOutcome> {
        let mut pace = pace && self.max_delay_ms > 0;
        let mut markup = Markup::default();
        let mut pending = Vec::with_capacity(4);
        let mut chars = text.chars();
        let mut finished = false;

        while !finished {
            match chars.next() {
                Some(c) => markup.feed(c, &mut pending),
                None => {
                    markup.finish(&mut pending);
                    finished = true;
                }
            }

            for emit in pending.drain(..) {
                match emit {
                    Emit::Style(styles) => apply_styles(&mut self.out, styles)?,
                    Emit::Char(c) => {
                        write_char(&mut self.out, c)?;
                        self.out.flush()?;

                        if self.probe.is_key_released(Hotkey::Cancel) {
                            queue!(self.out, ResetColor, SetForegroundColor(Color::DarkRed))?;
                            write!(self.out, "\r\n{}", INTERRUPTED_MARKER)?;
                            queue!(self.out, ResetColor)?;
                            self.out.flush()?;
                            interrupted.store(true, Ordering::SeqCst);
                            debug!("Rendering interrupted");
                            return Ok(RenderOutcome { interrupted: true });
                        }
                        if pace && self.probe.is_key_released(Hotkey::FastForward) {
                            debug!("Pacing disabled for the rest of the answer");
                            pace = false;
                        }
                        if pace {
                            let delay = rand::random_range(0..self.max_delay_ms);
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                        }
                    }
                }
            }
        }

        if markup.styles() != Styles::default() {
            debug!("Answer ended with unbalanced markup");
        }
        queue!(self.out, ResetColor)?;
        self.out.flush()?;
        Ok(RenderOutcome { interrupted: false })
    }
}

fn apply_styles<W: Write>(out: &mut W, styles: Styles) -> io::Result<()> {
    queue!(out, ResetColor)?;
    if styles.block {
        queue!(out, SetForegroundColor(Color::DarkYellow))?;
    } else if styles.inline {
        queue!(out, SetForegroundColor(Color::Cyan))?;
    }
    Ok(())
}

/// Write one character; newlines carry a carriage return so raw mode output stays aligned.
fn write_char<W: Write>(out: &mut W, c: char) -> io::Result<()> {
    if c == '\n' {
        out.write_all(b"\r\n")
    } else {
        let mut buf = [0u8; 4];
        out.write_all(c.encode_utf8(&mut buf).as_bytes())
    }
}
