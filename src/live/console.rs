//! Terminal stand-ins for the audio devices
//!
//! Typed lines play the role of finalized utterances and replies are printed
//! instead of spoken. Printing is paced by word count so muting and stopping
//! can interrupt a reply the way they would interrupt speech.

use crate::error::{ParleyError, Result};
use crate::live::{LiveEvent, LiveEventSender, SpeechSink, TranscriptionSource};
use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const PACE_PER_WORD: Duration = Duration::from_millis(60);
const MAX_PLAYBACK: Duration = Duration::from_secs(4);

/// Transcription source fed by the terminal
///
/// The source only gates input: the line reader checks
/// [`is_listening`](Self::is_listening) before forwarding a line as a final
/// fragment.
#[derive(Clone, Default)]
pub struct ConsoleTranscriber {
    listening: Arc<AtomicBool>,
}

impl ConsoleTranscriber {
    /// Create a closed source
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether typed lines are currently accepted
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

impl TranscriptionSource for ConsoleTranscriber {
    fn start(&mut self) -> Result<()> {
        if !self.listening.swap(true, Ordering::SeqCst) {
            println!("{}", "[listening]".green());
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.listening.store(false, Ordering::SeqCst);
    }
}

/// Speech sink that prints replies
pub struct ConsoleSpeaker {
    events: LiveEventSender,
    playback: Option<JoinHandle<()>>,
}

impl ConsoleSpeaker {
    /// Create a speaker that reports completion on `events`
    pub fn new(events: LiveEventSender) -> Self {
        Self {
            events,
            playback: None,
        }
    }
}

/// How long a reply of `text` takes to "play"
pub fn playback_duration(text: &str) -> Duration {
    let words = text.split_whitespace().count() as u32;
    (PACE_PER_WORD * words).min(MAX_PLAYBACK)
}

impl SpeechSink for ConsoleSpeaker {
    fn speak(&mut self, text: &str, locale: &str) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ParleyError::Synthesis(format!("No async runtime: {}", e)))?;

        self.cancel();
        tracing::debug!("Speaking {} chars ({})", text.len(), locale);
        println!("\n{} {}\n", "assistant>".cyan().bold(), text);

        let events = self.events.clone();
        let duration = playback_duration(text);
        self.playback = Some(runtime.spawn(async move {
            let _ = events.send(LiveEvent::SpeechStarted);
            tokio::time::sleep(duration).await;
            let _ = events.send(LiveEvent::SpeechEnded);
        }));
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(playback) = self.playback.take() {
            if !playback.is_finished() {
                playback.abort();
                println!("{}", "[reply interrupted]".yellow());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::event_channel;

    #[test]
    fn test_transcriber_gates_input() {
        let mut source = ConsoleTranscriber::new();
        let observer = source.clone();
        assert!(!observer.is_listening());
        source.start().unwrap();
        assert!(observer.is_listening());
        source.stop();
        assert!(!observer.is_listening());
    }

    #[test]
    fn test_playback_duration_is_capped() {
        assert_eq!(playback_duration(""), Duration::ZERO);
        assert_eq!(playback_duration("one two"), Duration::from_millis(120));
        assert_eq!(playback_duration(&"word ".repeat(1000)), MAX_PLAYBACK);
    }

    #[test]
    fn test_speak_without_runtime_fails() {
        let (tx, _rx) = event_channel();
        let mut speaker = ConsoleSpeaker::new(tx);
        assert!(speaker.speak("hello", "en-US").is_err());
    }

    #[tokio::test]
    async fn test_speak_reports_start_and_end() {
        let (tx, mut rx) = event_channel();
        let mut speaker = ConsoleSpeaker::new(tx);
        speaker.speak("hi", "en-US").unwrap();
        assert!(matches!(rx.recv().await, Some(LiveEvent::SpeechStarted)));
        assert!(matches!(rx.recv().await, Some(LiveEvent::SpeechEnded)));
    }

    #[tokio::test]
    async fn test_cancel_suppresses_end() {
        let (tx, mut rx) = event_channel();
        let mut speaker = ConsoleSpeaker::new(tx);
        speaker.speak(&"word ".repeat(50), "en-US").unwrap();
        assert!(matches!(rx.recv().await, Some(LiveEvent::SpeechStarted)));
        speaker.cancel();
        drop(speaker);
        assert!(rx.recv().await.is_none());
    }
}
