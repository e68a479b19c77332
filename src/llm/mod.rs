//! Chat module: wire types, conversation history and the request lifecycle.

mod client;
mod conversation;
mod types;

pub use client::ChatClient;
pub use conversation::Conversation;
