//! In-session command language.

use crossterm::style::Stylize;

use crate::config::SettingKey;
use crate::error::{Error, Result};

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    /// Clear screen and history, reload settings
    Reset,
    /// Clear screen, keep history
    Cls,
    /// Bare `set`
    ShowSettings,
    Set { key: SettingKey, value: String },
    Ask(String),
    Empty,
}

impl Command {
    /// Parse a prompt line. Keywords are case-insensitive; anything else is a question.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCommand`] for a `set` line without `key=value` or with an unknown
    /// key.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let command = match line.to_ascii_lowercase().as_str() {
            "" => Command::Empty,
            "help" => Command::Help,
            "quit" => Command::Quit,
            "reset" => Command::Reset,
            "cls" => Command::Cls,
            "set" => Command::ShowSettings,
            _ => match line.get(..4).filter(|prefix| prefix.eq_ignore_ascii_case("set ")) {
                Some(_) => parse_set(line, &line[4..])?,
                None => Command::Ask(line.to_string()),
            },
        };
        Ok(command)
    }
}

fn parse_set(line: &str, assignment: &str) -> Result<Command> {
    let (key, value) = assignment.split_once('=').ok_or_else(|| Error::InvalidCommand(format!("invalid command \"{}\"", line)))?;
    Ok(Command::Set { key: key.parse()?, value: value.trim().to_string() })
}

/// Print usage of the command line and the in-session commands.
pub fn print_help() {
    println!("Ask the chat model a question.");
    println!("Example: What weighs more, one kilogram of feathers or one kilogram of lead?");
    println!();
    println!("Command line options:");
    println!("\t{}      Print the answer at once, without delay.", "--nosleep".dark_cyan());
    println!("\t               Press {} to interrupt the answer.", "ESC".dark_cyan());
    println!("\t               Press {} to print the rest of the answer without delay.", "SPACE".dark_cyan());
    println!("\t{}    Print the JSON payload returned by the server.", "--printjson".dark_cyan());
    println!("\t{}  Keep the conversation going after the first answer.", "--interactive".dark_cyan());
    println!();
    println!("Commands:");
    println!("\t{}             Show this help", "help".dark_cyan());
    println!("\t{}             Leave the program", "quit".dark_cyan());
    println!("\t{}            Start a new conversation and reload the settings file", "reset".dark_cyan());
    println!("\t{}              Clear the screen (the conversation is kept)", "cls".dark_cyan());
    println!("\t{}              Show the current settings", "set".dark_cyan());
    println!("\t{}  Change a setting: model, lang, max_delay, timeout, temperature, tts", "set key=value".dark_cyan());
    println!("\t                 Example: {} to turn speech off", "set tts=false".dark_cyan());
    println!("\t                          {} to answer in US English", "set lang=en-us".dark_cyan());
}
