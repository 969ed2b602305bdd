//! Parley - text, voice, and image chat CLI
//!
#![doc = "Parley - text, voice, and image chat CLI"]
#![doc = "Main entry point for the Parley application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parley::assistant::HttpAssistantClient;
use parley::cli::{Cli, Commands, HistoryCommand};
use parley::commands;
use parley::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat { session, language } => {
            if let Some(s) = &session {
                tracing::debug!("Resuming session: {}", s);
            }
            commands::chat::run_chat(config, session, language).await?;
            Ok(())
        }
        Commands::Send {
            message,
            image,
            voice,
            session,
            language,
        } => {
            tracing::info!("Sending a single turn");
            commands::send::run_send(config, message, image, voice, session, language).await?;
            Ok(())
        }
        Commands::Live {
            session,
            language,
            muted,
        } => {
            commands::live::run_live(config, session, language, muted).await?;
            Ok(())
        }
        Commands::History {
            command: HistoryCommand::Show { id, remote: true },
        } => {
            tracing::info!("Fetching remote history for {}", id);
            let client = HttpAssistantClient::new(&config.assistant)?;
            commands::history::show_remote(&client, &id).await?;
            Ok(())
        }
        Commands::History { command } => {
            tracing::info!("Starting history command");
            let persistence = commands::open_persistence(&config)?;
            commands::history::handle_history(command, &persistence)?;
            Ok(())
        }
        Commands::Serve { bind } => {
            commands::serve::run_serve(config, bind).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so they do not interleave with replies on stdout.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "parley=debug" } else { "parley=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
