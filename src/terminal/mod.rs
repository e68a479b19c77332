//! Terminal output: hotkey polling, answer rendering and the thinking indicator.

pub mod keys;
mod render;
mod thinking;

pub use keys::open_probe;
pub use render::Renderer;
pub use thinking::ThinkingIndicator;
