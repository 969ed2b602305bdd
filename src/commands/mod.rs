/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `chat`: Interactive text chat
- `send`: One-shot text, voice, or image turn
- `live`: Live voice conversation on the console devices
- `serve`: Assistant relay server
- `history`: Local history browsing

These handlers are small and lean on the library components: the assistant
client, session persistence, and the live controller.
*/

use crate::config::Config;
use crate::error::Result;
use crate::session::{SessionPersistence, SqliteKeyValueStore};
use std::sync::Arc;

pub mod history;
pub mod special_commands;

/// Open the local session store selected by the configuration
pub fn open_persistence(config: &Config) -> Result<SessionPersistence> {
    let store = match &config.storage.path {
        Some(path) => SqliteKeyValueStore::new_with_path(path)?,
        None => SqliteKeyValueStore::new()?,
    };
    tracing::debug!("Local history at {}", store.path().display());
    Ok(SessionPersistence::new(Arc::new(store)))
}

/// Reply language: the command-line choice, else the configured one
pub fn reply_language(config: &Config, language: Option<String>) -> Option<String> {
    language.or_else(|| config.assistant.language.clone())
}

// Chat command handler
pub mod chat {
    //! Interactive text chat.
    //!
    //! Reads lines with rustyline, sends each as a text turn, and records
    //! every successful exchange in the local history.

    use super::*;
    use crate::assistant::{HttpAssistantClient, ImageAttachment, UserTurn};
    use crate::commands::special_commands::{parse_special_command, print_chat_help, SpecialCommand};
    use crate::conversation::TextConversation;
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `session` - Session to continue
    /// * `language` - Reply language override
    pub async fn run_chat(
        config: Config,
        session: Option<String>,
        language: Option<String>,
    ) -> Result<()> {
        tracing::info!("Starting interactive chat mode");

        let client = HttpAssistantClient::new(&config.assistant)?;
        let persistence = open_persistence(&config)?;
        let language = reply_language(&config, language);
        let mut conversation =
            TextConversation::new(Arc::new(client), persistence.clone(), session, language);

        let mut rl = DefaultEditor::new()?;
        print_welcome_banner(&conversation)?;

        loop {
            match rl.readline(&format!("{} ", "you>".green().bold())) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    let turn = match parse_special_command(trimmed) {
                        Ok(SpecialCommand::None) => UserTurn::Text(trimmed.to_string()),
                        Ok(SpecialCommand::Image { path, question }) => {
                            match image_turn(&path, question) {
                                Ok(turn) => turn,
                                Err(e) => {
                                    eprintln!("{}\n", e.to_string().red());
                                    continue;
                                }
                            }
                        }
                        Ok(SpecialCommand::NewSession) => {
                            conversation.reset();
                            println!("{}\n", "Started a new conversation.".green());
                            continue;
                        }
                        Ok(SpecialCommand::History) => {
                            history::print_history_table(&persistence.history()?);
                            continue;
                        }
                        Ok(SpecialCommand::Mute) => {
                            println!("/mute is only available in live mode\n");
                            continue;
                        }
                        Ok(SpecialCommand::Help) => {
                            print_chat_help();
                            continue;
                        }
                        Ok(SpecialCommand::Exit) => break,
                        Err(e) => {
                            eprintln!("{}\n", e.to_string().red());
                            continue;
                        }
                    };

                    match conversation.send(turn).await {
                        Ok(reply) => {
                            println!("\n{} {}\n", "assistant>".cyan().bold(), reply.response);
                        }
                        Err(e) => {
                            eprintln!("{}\n", format!("Error: {}", e).red());
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(id) = conversation.session_id() {
            println!("Session: {}", id.cyan());
        }
        println!("Goodbye!");
        Ok(())
    }

    /// Build an image turn from `/image <path> <question>`
    pub fn image_turn(path: &str, question: Option<String>) -> Result<UserTurn> {
        let Some(question) = question else {
            return Err(crate::error::ParleyError::Validation(
                "Question is required: /image <path> <question>".to_string(),
            )
            .into());
        };
        let image = ImageAttachment::from_path(path)?;
        Ok(UserTurn::Image { image, question })
    }

    fn print_welcome_banner(conversation: &TextConversation) -> Result<()> {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                 Parley Chat - Welcome!                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        if let Some(session) = conversation.session()? {
            println!(
                "Continuing session {} ({} messages)",
                session.session_id.cyan(),
                session.len()
            );
        }
        println!("Type '/help' for available commands, 'exit' to quit\n");
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::test_utils::{temp_dir, PNG_BYTES};

        #[test]
        fn test_image_turn_requires_question() {
            let err = image_turn("cat.png", None).unwrap_err();
            assert!(err.to_string().contains("Question is required"));
        }

        #[test]
        fn test_image_turn_reads_file() {
            let dir = temp_dir();
            let path = dir.path().join("cat.png");
            std::fs::write(&path, PNG_BYTES).unwrap();
            let turn = image_turn(path.to_str().unwrap(), Some("what breed?".into())).unwrap();
            assert_eq!(turn.text(), "what breed?");
        }
    }
}

// One-shot send command handler
pub mod send {
    //! Single-turn send.

    use super::*;
    use crate::assistant::{HttpAssistantClient, ImageAttachment, UserTurn};
    use crate::conversation::TextConversation;
    use colored::Colorize;
    use std::path::PathBuf;

    /// Send one message and print the reply
    ///
    /// An attached image turns the message into the question about it;
    /// `voice` marks the message as speech-transcribed.
    pub async fn run_send(
        config: Config,
        message: String,
        image: Option<PathBuf>,
        voice: bool,
        session: Option<String>,
        language: Option<String>,
    ) -> Result<()> {
        let turn = match image {
            Some(path) => UserTurn::Image {
                image: ImageAttachment::from_path(&path)?,
                question: message,
            },
            None if voice => UserTurn::Voice(message),
            None => UserTurn::Text(message),
        };

        let client = HttpAssistantClient::new(&config.assistant)?;
        let persistence = open_persistence(&config)?;
        let language = reply_language(&config, language);
        let mut conversation =
            TextConversation::new(Arc::new(client), persistence, session, language);

        let reply = conversation.send(turn).await?;
        println!("{}", reply.response);
        eprintln!("{} {}", "session:".dimmed(), reply.session_id.cyan());
        Ok(())
    }
}

// Live conversation command handler
pub mod live {
    //! Live voice conversation on the console devices.
    //!
    //! A reader thread turns typed lines into live events; the conversation
    //! itself runs on the async runtime.

    use super::*;
    use crate::assistant::{HttpAssistantClient, ImageAttachment};
    use crate::commands::special_commands::{parse_special_command, print_live_help, SpecialCommand};
    use crate::live::console::{ConsoleSpeaker, ConsoleTranscriber};
    use crate::live::{
        event_channel, ControllerSettings, LiveConversation, LiveEvent, LiveEventSender,
        TurnController,
    };
    use colored::Colorize;
    use rustyline::DefaultEditor;
    use tokio::sync::mpsc;

    /// What a typed line means during a live conversation
    #[derive(Debug)]
    pub enum LiveLine {
        /// Events to post
        Events(Vec<LiveEvent>),
        /// Show the command help
        Help,
        /// Tell the user something; nothing is posted
        Message(String),
    }

    /// Interpret one typed line
    ///
    /// Plain text counts as a finalized utterance only while the console
    /// source is listening.
    pub fn route_line(line: &str, listening: bool) -> LiveLine {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return LiveLine::Events(Vec::new());
        }

        match parse_special_command(trimmed) {
            Ok(SpecialCommand::None) if listening => LiveLine::Events(vec![LiveEvent::Fragment {
                text: trimmed.to_string(),
                is_final: true,
            }]),
            Ok(SpecialCommand::None) => {
                LiveLine::Message("Not listening right now; wait for the reply.".to_string())
            }
            Ok(SpecialCommand::Image { path, question }) => {
                match ImageAttachment::from_path(&path) {
                    Ok(image) => {
                        let mut events = vec![LiveEvent::AttachImage(image)];
                        if let Some(question) = question.filter(|_| listening) {
                            events.push(LiveEvent::Fragment {
                                text: question,
                                is_final: true,
                            });
                        }
                        LiveLine::Events(events)
                    }
                    Err(e) => LiveLine::Message(e.to_string()),
                }
            }
            Ok(SpecialCommand::Mute) => LiveLine::Events(vec![LiveEvent::ToggleMute]),
            Ok(SpecialCommand::Exit) => LiveLine::Events(vec![LiveEvent::Stop]),
            Ok(SpecialCommand::Help) => LiveLine::Help,
            Ok(SpecialCommand::NewSession) | Ok(SpecialCommand::History) => LiveLine::Message(
                "Not available during a live conversation; /stop first.".to_string(),
            ),
            Err(e) => LiveLine::Message(e.to_string()),
        }
    }

    /// Run a live conversation until `/stop`
    pub async fn run_live(
        config: Config,
        session: Option<String>,
        language: Option<String>,
        muted: bool,
    ) -> Result<()> {
        tracing::info!("Starting live conversation");

        let client = HttpAssistantClient::new(&config.assistant)?;
        let persistence = open_persistence(&config)?;
        let settings =
            ControllerSettings::from_config(&config.live, reply_language(&config, language));

        let (events, inbox) = event_channel();
        let transcriber = ConsoleTranscriber::new();
        let speaker = ConsoleSpeaker::new(events.clone());
        let mut controller = TurnController::new(transcriber.clone(), speaker, settings);
        if let Some(id) = session {
            controller = controller.with_session(id);
        }

        let (notice_tx, mut notice_rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(notice) = notice_rx.recv().await {
                eprintln!("{}", notice.red());
            }
        });

        if muted || config.live.start_muted {
            let _ = events.send(LiveEvent::ToggleMute);
        }

        let conversation =
            LiveConversation::new(controller, Arc::new(client), persistence, events.clone(), inbox)
                .with_notices(notice_tx);

        println!("\n{}", "Live conversation - type to talk, /help for commands".bold());
        spawn_line_reader(events, transcriber);

        let controller = conversation.run().await?;
        if let Some(id) = controller.session_id() {
            println!("Session: {}", id.cyan());
        }
        println!("Goodbye!");
        Ok(())
    }

    fn spawn_line_reader(events: LiveEventSender, transcriber: ConsoleTranscriber) {
        std::thread::spawn(move || {
            let mut rl = match DefaultEditor::new() {
                Ok(rl) => rl,
                Err(e) => {
                    tracing::error!("Failed to open line editor: {}", e);
                    let _ = events.send(LiveEvent::Stop);
                    return;
                }
            };

            loop {
                let line = match rl.readline("") {
                    Ok(line) => line,
                    Err(err) => {
                        tracing::debug!("Line reader closed: {:?}", err);
                        let _ = events.send(LiveEvent::Stop);
                        return;
                    }
                };

                match route_line(&line, transcriber.is_listening()) {
                    LiveLine::Events(posted) => {
                        let stop = posted.iter().any(|e| matches!(e, LiveEvent::Stop));
                        for event in posted {
                            let _ = events.send(event);
                        }
                        if stop {
                            return;
                        }
                    }
                    LiveLine::Help => print_live_help(),
                    LiveLine::Message(message) => println!("{}", message.yellow()),
                }
            }
        });
    }

}

// Relay server command handler
pub mod serve {
    //! Assistant relay server.

    use super::*;

    /// Run the relay, optionally on a different address than configured
    pub async fn run_serve(config: Config, bind: Option<String>) -> Result<()> {
        let mut relay = config.relay;
        if let Some(bind) = bind {
            relay.bind = bind;
        }
        tracing::info!("Starting relay server on {}", relay.bind);
        crate::relay::serve(&relay).await
    }
}
