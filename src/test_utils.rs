//! Test utilities for Parley
//!
//! This module provides recording fakes for the live conversation devices,
//! a scripted assistant, and small fixture helpers.

use crate::assistant::{AssistantClient, AssistantError, AssistantReply, ImageAttachment, UserTurn};
use crate::config::Config;
use crate::error::{ParleyError, Result};
use crate::live::{LiveEvent, LiveEventSender, SpeechSink, TranscriptionSource};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Smallest byte string detected as PNG
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// Create a temporary directory for testing
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// A valid PNG attachment
pub fn png_attachment() -> ImageAttachment {
    ImageAttachment::from_bytes("photo.png", PNG_BYTES.to_vec()).expect("valid png header")
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: std::result::Result<T, ParleyError>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Create a test configuration with default values
pub fn test_config() -> Config {
    Config::default()
}

/// Transcription source that counts calls
#[derive(Clone, Default)]
pub struct RecordingSource {
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    fail_next: Arc<AtomicBool>,
}

impl RecordingSource {
    /// Number of successful `start` calls
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of `stop` calls
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Make the next `start` fail
    pub fn fail_next_start(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl TranscriptionSource for RecordingSource {
    fn start(&mut self) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ParleyError::Transcription("microphone unavailable".to_string()).into());
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Speech sink that records what it was asked to say
///
/// With an event sender attached, every utterance completes immediately.
#[derive(Clone, Default)]
pub struct RecordingSink {
    spoken: Arc<Mutex<Vec<String>>>,
    cancels: Arc<AtomicUsize>,
    events: Option<LiveEventSender>,
}

impl RecordingSink {
    /// A sink that reports `SpeechEnded` right after each `speak`
    pub fn completing(events: LiveEventSender) -> Self {
        Self {
            events: Some(events),
            ..Default::default()
        }
    }

    /// Everything spoken so far
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().expect("spoken lock").clone()
    }

    /// Number of `cancel` calls
    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl SpeechSink for RecordingSink {
    fn speak(&mut self, text: &str, _locale: &str) -> Result<()> {
        self.spoken.lock().expect("spoken lock").push(text.to_string());
        if let Some(events) = &self.events {
            let _ = events.send(LiveEvent::SpeechStarted);
            let _ = events.send(LiveEvent::SpeechEnded);
        }
        Ok(())
    }

    fn cancel(&mut self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Assistant that answers from a queue of canned results
#[derive(Clone, Default)]
pub struct ScriptedAssistant {
    replies: Arc<Mutex<VecDeque<std::result::Result<AssistantReply, AssistantError>>>>,
    requests: Arc<Mutex<Vec<(UserTurn, Option<String>)>>>,
}

impl ScriptedAssistant {
    /// Queue a successful reply
    pub fn reply(self, response: &str, session_id: &str) -> Self {
        self.push(Ok(AssistantReply {
            response: response.to_string(),
            session_id: session_id.to_string(),
            image_url: None,
        }))
    }

    /// Queue a failure
    pub fn fail(self, error: AssistantError) -> Self {
        self.push(Err(error))
    }

    fn push(self, result: std::result::Result<AssistantReply, AssistantError>) -> Self {
        self.replies.lock().expect("replies lock").push_back(result);
        self
    }

    /// Turns received so far with the session id they carried
    pub fn requests(&self) -> Vec<(UserTurn, Option<String>)> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl AssistantClient for ScriptedAssistant {
    async fn send(
        &self,
        turn: &UserTurn,
        session_id: Option<&str>,
        _language: Option<&str>,
    ) -> std::result::Result<AssistantReply, AssistantError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push((turn.clone(), session_id.map(str::to_string)));
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_else(|| Err(AssistantError::Network("no scripted reply".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_dir_creation() {
        let dir = temp_dir();
        assert!(dir.path().exists());
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: std::result::Result<(), ParleyError> =
            Err(ParleyError::Config("test error message".to_string()));
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        let result: std::result::Result<(), ParleyError> = Ok(());
        assert_error_contains(result, "error");
    }

    #[test]
    fn test_test_config_is_valid() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_recording_source_counts() {
        let mut source = RecordingSource::default();
        let observer = source.clone();
        source.start().unwrap();
        source.stop();
        assert_eq!(observer.starts(), 1);
        assert_eq!(observer.stops(), 1);

        observer.fail_next_start();
        assert!(source.start().is_err());
        assert!(source.start().is_ok());
    }

    #[tokio::test]
    async fn test_scripted_assistant_runs_out() {
        let assistant = ScriptedAssistant::default().reply("Hi!", "abc123");
        let turn = UserTurn::Text("hello".into());
        assert!(assistant.send(&turn, None, None).await.is_ok());
        assert!(matches!(
            assistant.send(&turn, None, None).await,
            Err(AssistantError::Network(_))
        ));
        assert_eq!(assistant.requests().len(), 2);
    }
}
