//! Command-line interface definition for Parley
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for text chat, live voice chat, history browsing,
//! and the relay server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parley - talk to an assistant by text, voice, or image
#[derive(Parser, Debug, Clone)]
#[command(name = "parley")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the local history database path
    #[arg(long, env = "PARLEY_HISTORY_DB")]
    pub storage_path: Option<String>,

    /// Override the assistant API base URL
    #[arg(long)]
    pub api_url: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Parley
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive text chat
    Chat {
        /// Resume an existing session by ID
        #[arg(short, long)]
        session: Option<String>,

        /// Ask the assistant to reply in this language (e.g. "Spanish")
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Send a single message and print the reply
    Send {
        /// Message text (the question when an image is attached)
        #[arg(short, long)]
        message: String,

        /// Attach an image to the message
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Send as a voice-transcribed message
        #[arg(long)]
        voice: bool,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,

        /// Reply language
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Start a live, turn-taking voice conversation
    Live {
        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,

        /// Reply language
        #[arg(short, long)]
        language: Option<String>,

        /// Start with speech output muted
        #[arg(long)]
        muted: bool,
    },

    /// Browse and manage local conversation history
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Run the assistant relay server
    Serve {
        /// Address to listen on (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },
}

/// History management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List saved conversations
    List,

    /// Find conversations whose title or preview contains a term
    Search {
        /// Search term (case-insensitive)
        term: String,
    },

    /// Print the messages of a conversation
    Show {
        /// Session ID
        id: String,

        /// Fetch the relay's copy instead of the local one
        #[arg(long)]
        remote: bool,
    },

    /// Delete a conversation from local history
    Delete {
        /// Session ID
        id: String,
    },

    /// Delete all local history
    Clear,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            storage_path: None,
            api_url: None,
            command: Commands::History {
                command: HistoryCommand::List,
            },
        }
    }
}
