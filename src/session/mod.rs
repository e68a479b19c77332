//! Conversation session: prompt loop, in-session commands and per-turn state.

mod command;
mod context;
#[allow(clippy::module_inception)]
mod session;

pub use session::{Session, print_banner};
