use crate::assistant::HttpAssistantClient;
use crate::cli::HistoryCommand;
use crate::error::{ParleyError, Result};
use crate::session::history::{format_relative, truncate_with_ellipsis};
use crate::session::{HistoryEntry, Role, Session, SessionPersistence};
use chrono::Utc;
use colored::Colorize;
use prettytable::{format, Table};

const TITLE_COLUMN_CHARS: usize = 40;

/// Handle history commands
pub fn handle_history(command: HistoryCommand, persistence: &SessionPersistence) -> Result<()> {
    match command {
        HistoryCommand::List => {
            print_history_table(&persistence.history()?);
        }
        HistoryCommand::Search { term } => {
            let hits = persistence.search(&term)?;
            if hits.is_empty() {
                println!("{}", format!("No conversations match '{}'.", term).yellow());
                return Ok(());
            }
            print_history_table(&hits);
        }
        HistoryCommand::Show { id, .. } => {
            let session = persistence.load_session(&id)?;
            if session.is_empty() {
                println!("{}", format!("No conversation found for {}", id).yellow());
                return Ok(());
            }
            print_session(&session);
        }
        HistoryCommand::Delete { id } => {
            persistence.delete_session(&id)?;
            println!("{}", format!("Deleted conversation {}", id).green());
        }
        HistoryCommand::Clear => {
            persistence.clear_all()?;
            println!("{}", "Cleared all conversation history.".green());
        }
    }

    Ok(())
}

/// Print the relay's stored log of a session
///
/// Returns whether the relay knew the session.
pub async fn show_remote(client: &HttpAssistantClient, id: &str) -> Result<bool> {
    let Some(session) = client.get_history(id).await.map_err(ParleyError::from)? else {
        println!("{}", format!("No remote conversation found for {}", id).yellow());
        return Ok(false);
    };
    print_session(&session);
    Ok(true)
}

/// Print history entries as a table, most recent first
pub fn print_history_table(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("{}", "No conversation history found.".yellow());
        return;
    }

    let now = Utc::now();
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Type".bold(),
        "Messages".bold(),
        "Updated".bold()
    ]);

    for entry in entries {
        table.add_row(prettytable::row![
            entry.session_id.cyan(),
            truncate_with_ellipsis(&entry.title, TITLE_COLUMN_CHARS),
            entry.entry_type,
            entry.message_count,
            format_relative(entry.timestamp, now)
        ]);
    }

    println!("\nConversation History:");
    table.printstd();
    println!();
    println!(
        "Use {} to continue a conversation.",
        "parley chat --session <ID>".cyan()
    );
    println!();
}

/// Print every message of a session
pub fn print_session(session: &Session) {
    println!(
        "\n{} {} ({} messages)\n",
        "Session".bold(),
        session.session_id.cyan(),
        session.len()
    );

    for message in &session.messages {
        let time = message.timestamp.format("%Y-%m-%d %H:%M");
        let speaker = match message.role {
            Role::User => "you".green().bold(),
            Role::Assistant => "assistant".cyan().bold(),
        };
        println!("[{}] {} ({}): {}", time, speaker, message.message_type, message.content);
        if message.image_url.is_some() {
            println!("    {}", "[image attached]".dimmed());
        }
    }
    println!();
}
