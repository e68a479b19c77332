//! Persisted settings record.
//!
//! Read once at startup, mutated by the in-session `set` command and written back whenever a
//! value actually changes.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crossterm::style::Stylize;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Settings stored in the JSON settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub api_url: String,  // Chat completion endpoint
    pub api_key: String,  // Bearer token
    pub model: String,    // Model identifier sent with every request
    pub timeout: u64,     // Request timeout in seconds
    pub temperature: f32, // Sampling temperature (0.0-2.0)
    pub tts: bool,        // Narrate answers
    pub language: String, // Narration and answer language code
    pub max_delay: u64,   // Maximum per-character delay in milliseconds
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "gpt-3.5-turbo".to_string(),
            timeout: 30,
            temperature: 0.7,
            tts: false,
            language: "en-us".to_string(),
            max_delay: 50,
        }
    }
}

/// Keys accepted by `set <key>=<value>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    Model,
    Lang,
    MaxDelay,
    Timeout,
    Temperature,
    Tts,
}

impl FromStr for SettingKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "model" => Ok(SettingKey::Model),
            "lang" => Ok(SettingKey::Lang),
            "max_delay" => Ok(SettingKey::MaxDelay),
            "timeout" => Ok(SettingKey::Timeout),
            "temperature" => Ok(SettingKey::Temperature),
            "tts" => Ok(SettingKey::Tts),
            other => Err(Error::InvalidCommand(format!("unknown setting \"{}\"", other))),
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettingKey::Model => "model",
            SettingKey::Lang => "lang",
            SettingKey::MaxDelay => "max_delay",
            SettingKey::Timeout => "timeout",
            SettingKey::Temperature => "temperature",
            SettingKey::Tts => "tts",
        };
        f.write_str(name)
    }
}

impl Settings {
    /// Load settings from a JSON file.
    ///
    /// # Errors
    /// Returns [`Error::Settings`] if the file cannot be read, parsed or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| settings_error(path, e))?;
        let settings: Settings = serde_json::from_str(&raw).map_err(|e| settings_error(path, e))?;
        settings.validate().map_err(|e| settings_error(path, e))?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Write settings back to a JSON file, creating the parent directory when needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| settings_error(path, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| settings_error(path, e))?;
        std::fs::write(path, json).map_err(|e| settings_error(path, e))?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Validate value ranges.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.api_url.trim().is_empty() {
            return Err("api_url must not be empty".to_string());
        }
        if self.timeout == 0 {
            return Err("timeout must be at least 1 second".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!("temperature must be between 0.0 and 2.0, got {}", self.temperature));
        }
        Ok(())
    }

    /// Apply a `set` command value.
    ///
    /// # Returns
    /// `true` if the value changed and must be persisted, `false` if it was already set.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCommand`] if the value does not parse for its key; the settings are
    /// left untouched in that case.
    pub fn apply(&mut self, key: SettingKey, value: &str) -> Result<bool> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::InvalidCommand(format!("missing value for \"{}\"", key)));
        }

        let changed = match key {
            SettingKey::Model => replace(&mut self.model, value.to_string()),
            SettingKey::Lang => replace(&mut self.language, value.to_string()),
            SettingKey::MaxDelay => replace(&mut self.max_delay, parse_value::<u64>(key, value)?),
            SettingKey::Timeout => {
                let timeout = parse_value::<u64>(key, value)?;
                if timeout == 0 {
                    return Err(Error::InvalidCommand("timeout must be at least 1 second".to_string()));
                }
                replace(&mut self.timeout, timeout)
            }
            SettingKey::Temperature => {
                let temperature = parse_value::<f32>(key, value)?;
                if !(0.0..=2.0).contains(&temperature) {
                    return Err(Error::InvalidCommand(format!("temperature must be between 0.0 and 2.0, got {}", temperature)));
                }
                replace(&mut self.temperature, temperature)
            }
            SettingKey::Tts => {
                let enabled = parse_bool(value).ok_or_else(|| Error::InvalidCommand(format!("invalid value \"{}\" for tts", value)))?;
                replace(&mut self.tts, enabled)
            }
        };

        if changed {
            info!("Setting {} changed to {}", key, value);
        }
        Ok(changed)
    }

    /// Print the settings summary shown at startup, on `reset` and on a bare `set`.
    pub fn print(&self) {
        println!("Model: {}", self.model.clone().cyan());
        println!("Timeout: {}", self.timeout.to_string().cyan());
        println!("TTS: {}", self.tts.to_string().cyan());
        println!("Language: {}", self.language.clone().cyan());
        println!("Max Delay: {}", self.max_delay.to_string().cyan());
        println!("Temperature: {}", self.temperature.to_string().cyan());
    }

    /// API key with everything but the last four characters hidden.
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 4 {
            return "*".repeat(chars.len());
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}", "*".repeat(chars.len() - 4), tail)
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn parse_value<T: FromStr>(key: SettingKey, value: &str) -> Result<T> {
    value.parse().map_err(|_| Error::InvalidCommand(format!("invalid value \"{}\" for {}", value, key)))
}

/// Parse the boolean spellings accepted for `tts`.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" | "on" | "yes" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" | "off" | "no" => Some(false),
        _ => None,
    }
}

fn settings_error(path: &Path, err: impl fmt::Display) -> Error {
    Error::Settings { path: path.to_path_buf(), reason: err.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let saved = Settings { api_key: "sk-test-1234".to_string(), temperature: 0.35, tts: true, ..Settings::default() };
        saved.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        loaded.save(&path).unwrap();
        let reloaded = Settings::load(&path).unwrap();

        assert_eq!(saved, loaded);
        assert_eq!(loaded, reloaded);
    }

    #[test]
    fn test_load_missing_file_is_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Settings { .. }));
    }

    #[test]
    fn test_load_rejects_out_of_range_temperature() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        Settings { temperature: 3.5, ..Settings::default() }.save(&path).unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn test_apply_changes_and_reports_unchanged() {
        let mut settings = Settings::default();
        assert!(settings.apply(SettingKey::MaxDelay, "0").unwrap());
        assert_eq!(settings.max_delay, 0);
        assert!(!settings.apply(SettingKey::MaxDelay, "0").unwrap());

        assert!(settings.apply(SettingKey::Tts, "true").unwrap());
        assert!(settings.tts);
        assert!(settings.apply(SettingKey::Lang, "pt-BR").unwrap());
        assert_eq!(settings.language, "pt-BR");
    }

    #[test]
    fn test_apply_invalid_values_leave_settings_untouched() {
        let mut settings = Settings::default();
        let before = settings.clone();
        assert!(matches!(settings.apply(SettingKey::Timeout, "soon"), Err(Error::InvalidCommand(_))));
        assert!(matches!(settings.apply(SettingKey::Timeout, "0"), Err(Error::InvalidCommand(_))));
        assert!(matches!(settings.apply(SettingKey::Temperature, "2.5"), Err(Error::InvalidCommand(_))));
        assert!(matches!(settings.apply(SettingKey::Tts, "maybe"), Err(Error::InvalidCommand(_))));
        assert!(matches!(settings.apply(SettingKey::Model, "  "), Err(Error::InvalidCommand(_))));
        assert_eq!(settings, before);
    }

    #[test]
    fn test_setting_key_parsing() {
        assert_eq!("MAX_DELAY".parse::<SettingKey>().unwrap(), SettingKey::MaxDelay);
        assert_eq!(" lang ".parse::<SettingKey>().unwrap(), SettingKey::Lang);
        assert!("voice".parse::<SettingKey>().is_err());
    }

    #[test]
    fn test_masked_api_key() {
        let settings = Settings { api_key: "sk-abcdef".to_string(), ..Settings::default() };
        assert_eq!(settings.masked_api_key(), "*****cdef");
    }
}
