//! Special commands parser for the interactive prompts
//!
//! Both the text chat and the live conversation accept slash commands.
//! Command words are case-insensitive; arguments (paths, questions) keep
//! their case.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Attach an image; the chat prompt also takes the question inline
    Image {
        /// Path of the image file
        path: String,
        /// Question about the image, when given on the same line
        question: Option<String>,
    },

    /// Start a fresh session
    NewSession,

    /// List saved conversations
    History,

    /// Toggle speech output (live mode)
    Mute,

    /// Display help information
    Help,

    /// Leave the prompt
    Exit,

    /// Not a special command
    None,
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` for an unrecognized `/word` and
/// `CommandError::MissingArgument` for `/image` without a path.
///
/// # Examples
///
/// ```
/// use parley::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// let cmd = parse_special_command("/image Cat.png what breed?").unwrap();
/// assert_eq!(
///     cmd,
///     SpecialCommand::Image {
///         path: "Cat.png".to_string(),
///         question: Some("what breed?".to_string()),
///     }
/// );
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') {
        return match lower.as_str() {
            "exit" | "quit" => Ok(SpecialCommand::Exit),
            _ => Ok(SpecialCommand::None),
        };
    }

    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };

    match word.as_str() {
        "/image" | "/img" => {
            if rest.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "/image".to_string(),
                    usage: "/image <path> [question]".to_string(),
                });
            }
            let (path, question) = match rest.split_once(char::is_whitespace) {
                Some((path, question)) => (path, Some(question.trim().to_string())),
                None => (rest, None),
            };
            Ok(SpecialCommand::Image {
                path: path.to_string(),
                question: question.filter(|q| !q.is_empty()),
            })
        }
        "/new" => Ok(SpecialCommand::NewSession),
        "/history" => Ok(SpecialCommand::History),
        "/mute" | "/unmute" => Ok(SpecialCommand::Mute),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" | "/stop" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Display help for the text chat prompt
pub fn print_chat_help() {
    println!(
        r#"
Chat Commands
=============

  <text>                    - Send a message
  /image <path> <question>  - Ask a question about an image
  /new                      - Start a new conversation
  /history                  - List saved conversations
  /help                     - Show this help message
  /exit                     - Leave the chat (also: exit, quit)
"#
    );
}

/// Display help for the live conversation prompt
pub fn print_live_help() {
    println!(
        r#"
Live Conversation Commands
==========================

  <text>          - Say something (accepted while listening)
  /image <path>   - Send an image with your next utterance
  /mute           - Toggle reply playback
  /help           - Show this help message
  /stop           - End the conversation
"#
    );
}
