//! Animated countdown shown while a request is in flight.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::queue;
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use tokio::task::JoinHandle;

/// Animation tick; the countdown is refreshed every fourth tick (once per second).
const TICK: Duration = Duration::from_millis(250);
const TICKS_PER_SECOND: u32 = 4;

const DOT_COLORS: [Color; 6] = [Color::Red, Color::Green, Color::Yellow, Color::Blue, Color::Magenta, Color::Cyan];

/// Prints `<seconds left>...` until the request finishes or the countdown runs out.
pub struct ThinkingIndicator {
    timeout_secs: u64,         // Countdown start
    finished: Arc<AtomicBool>, // Set by the dispatcher once the response arrived
}

impl ThinkingIndicator {
    pub fn new(timeout_secs: u64, finished: Arc<AtomicBool>) -> Self {
        Self { timeout_secs, finished }
    }

    /// Run on the runtime, drawing to stdout.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(std::io::stdout()).await })
    }

    /// Animate until stopped. Returns within one tick of the stop flag being raised.
    pub async fn run<W: Write>(self, mut out: W) {
        let mut remaining = self.timeout_secs;
        let mut tick: u32 = 0;

        loop {
            let _ = queue!(out, SetForegroundColor(Color::Yellow));
            if tick % TICKS_PER_SECOND == 0 {
                let _ = write!(out, "\r         \r{}", remaining);
                remaining = remaining.saturating_sub(1);
            }
            let _ = out.flush();

            tokio::time::sleep(TICK).await;

            if remaining == 0 || self.finished.load(Ordering::SeqCst) {
                break;
            }

            let color = DOT_COLORS[rand::random_range(0..DOT_COLORS.len())];
            let _ = queue!(out, SetForegroundColor(color));
            let _ = write!(out, ".");
            tick += 1;
        }

        let _ = queue!(out, ResetColor);
        let _ = write!(out, "\r         \r");
        let _ = out.flush();
    }
}
