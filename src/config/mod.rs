//! Configuration module for the narrator.
//!
//! Provides CLI argument parsing and the persisted settings record.

#[allow(clippy::module_inception)]
mod config;
mod settings;

pub use config::AppConfig;
pub use settings::{SettingKey, Settings};
