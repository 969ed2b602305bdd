use std::fmt;

/// Phase of a live voice conversation
///
/// Exactly one value is current at a time, so listening and speaking can
/// never hold together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiveState {
    /// Not in a live conversation
    #[default]
    Idle,
    /// Capturing the user's speech
    Listening,
    /// Waiting on the assistant
    Processing,
    /// Playing the assistant's reply
    Speaking,
}

impl LiveState {
    /// Returns true for every state except `Idle`
    pub fn is_live(self) -> bool {
        self != Self::Idle
    }
}

impl fmt::Display for LiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
        };
        f.write_str(label)
    }
}
