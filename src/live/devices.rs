//! Audio device seams
//!
//! Devices never call back into the controller. They report what happened by
//! posting [`LiveEvent`](crate::live::LiveEvent)s on the conversation's event
//! channel, and the controller decides what to do next.

use crate::error::Result;

/// Live audio to text
pub trait TranscriptionSource: Send {
    /// Begin capturing. Fragments arrive as `LiveEvent::Fragment`.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing. The source must not restart on its own afterwards.
    fn stop(&mut self);
}

/// Text to audible speech
pub trait SpeechSink: Send {
    /// Start speaking `text`. Completion arrives as `LiveEvent::SpeechEnded`
    /// or `LiveEvent::SpeechError`.
    fn speak(&mut self, text: &str, locale: &str) -> Result<()>;

    /// Cut off any speech in progress
    fn cancel(&mut self);
}

/// Class of a transcription failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionErrorKind {
    /// Nothing was said before the source gave up
    NoSpeech,
    /// Capture was stopped by the controller
    Aborted,
    /// Any other device or recognizer failure
    Other(String),
}
