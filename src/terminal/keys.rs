//! Non-blocking hotkey polling.
//!
//! The renderer asks once per character whether a hotkey was released since the last check. On a
//! real terminal the probe holds raw mode for its lifetime and drains pending key events from
//! crossterm; without a terminal the no-op probe keeps rendering uninterruptible.

use std::io::IsTerminal;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::debug;

/// Hotkeys recognized while an answer is streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hotkey {
    /// Esc (or Ctrl+C, which raw mode no longer turns into a signal)
    Cancel,
    /// Space
    FastForward,
}

/// Polling oracle for hotkey state.
pub trait KeyStateProbe: Send {
    /// Whether `key` was pressed and released since the last call for that key.
    fn is_key_released(&mut self, key: Hotkey) -> bool;
}

/// Probe for platforms or sessions without key state access. Never reports a key.
#[derive(Debug, Default)]
pub struct NoopProbe;

impl KeyStateProbe for NoopProbe {
    fn is_key_released(&mut self, _key: Hotkey) -> bool {
        false
    }
}

/// Probe backed by crossterm key events. Raw mode is enabled on open and restored on drop.
#[derive(Debug)]
pub struct TerminalProbe {
    cancel: bool,       // Latched cancel key
    fast_forward: bool, // Latched fast-forward key
}

impl TerminalProbe {
    /// Enable raw mode and start latching hotkeys.
    ///
    /// # Returns
    /// `None` if stdin is not a terminal or raw mode cannot be enabled.
    pub fn open() -> Option<Self> {
        if !std::io::stdin().is_terminal() {
            return None;
        }
        if let Err(e) = enable_raw_mode() {
            debug!("Raw mode unavailable: {}", e);
            return None;
        }
        Some(Self { cancel: false, fast_forward: false })
    }

    /// Drain pending key events into the latches.
    fn drain(&mut self) {
        while event::poll(Duration::ZERO).unwrap_or(false) {
            let Ok(Event::Key(key)) = event::read() else {
                continue;
            };
            if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Release) {
                continue;
            }
            match key.code {
                KeyCode::Esc => self.cancel = true,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => self.cancel = true,
                KeyCode::Char(' ') => self.fast_forward = true,
                _ => {}
            }
        }
    }
}

impl KeyStateProbe for TerminalProbe {
    fn is_key_released(&mut self, key: Hotkey) -> bool {
        self.drain();
        let latch = match key {
            Hotkey::Cancel => &mut self.cancel,
            Hotkey::FastForward => &mut self.fast_forward,
        };
        std::mem::take(latch)
    }
}

impl Drop for TerminalProbe {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Open the best available probe for this process.
pub fn open_probe() -> Box<dyn KeyStateProbe> {
    match TerminalProbe::open() {
        Some(probe) => Box::new(probe),
        None => {
            debug!("No interactive terminal, rendering without hotkeys");
            Box::new(NoopProbe)
        }
    }
}
