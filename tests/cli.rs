//! End-to-end checks of the `parley` binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::sync::Arc;

mod common;

use parley::session::{Message, MessageType, SessionPersistence, SqliteKeyValueStore};

fn parley(db_path: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("parley").unwrap();
    cmd.env("PARLEY_HISTORY_DB", db_path)
        .env("NO_COLOR", "1")
        .env_remove("PARLEY_API_URL")
        .env_remove("PARLEY_LANGUAGE");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let tmp = tempfile::TempDir::new().unwrap();
    parley(&tmp.path().join("local.db"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("live"))
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn test_history_list_empty() {
    let tmp = tempfile::TempDir::new().unwrap();
    parley(&tmp.path().join("local.db"))
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No conversation history found."));
}

#[test]
fn test_history_list_and_search_show_recorded_session() {
    let tmp = tempfile::TempDir::new().unwrap();
    let db_path = tmp.path().join("local.db");
    let persistence =
        SessionPersistence::new(Arc::new(SqliteKeyValueStore::new_with_path(&db_path).unwrap()));
    persistence
        .record_turn(
            "abc123",
            Message::user("What's the weather today", MessageType::Text),
            Message::assistant("Sunny", MessageType::Text),
        )
        .unwrap();

    parley(&db_path)
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("abc123"));

    parley(&db_path)
        .args(["history", "search", "joke"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No conversations match"));

    parley(&db_path)
        .args(["history", "show", "abc123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sunny"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (_dir, config_path) = common::temp_config_file(
        r#"
assistant:
  base_url: "http://localhost:5000/api"
  timeout_seconds: 0
"#,
    );

    parley(&tmp.path().join("local.db"))
        .arg("--config")
        .arg(config_path)
        .args(["history", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be greater than 0"));
}
