//! Display events exchanged as `"<kind>:<payload>"` text
//!
//! Consumers switch on the prefix before the first colon; the payload may
//! itself contain colons.

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Wake status: a wake word was heard, the next transcript is a command
pub const LISTENING: &str = "LISTENING";
/// Wake status: back to dormant
pub const SLEEPING: &str = "SLEEPING";
/// LLM status: completion request in flight
pub const THINKING: &str = "THINKING";
/// LLM status: response handed to the speaker
pub const SPEAKING: &str = "SPEAKING";
/// LLM status: nothing in progress
pub const IDLE: &str = "IDLE";

/// Kind tag of a display event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WakeStatus,
    LlmStatus,
    UserTranscription,
    LlmResponse,
    SystemMessage,
}

impl EventKind {
    /// Wire tag for this kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WakeStatus => "wake_status",
            Self::LlmStatus => "llm_status",
            Self::UserTranscription => "user_transcription",
            Self::LlmResponse => "llm_response",
            Self::SystemMessage => "system_message",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wake_status" => Ok(Self::WakeStatus),
            "llm_status" => Ok(Self::LlmStatus),
            "user_transcription" => Ok(Self::UserTranscription),
            "llm_response" => Ok(Self::LlmResponse),
            "system_message" => Ok(Self::SystemMessage),
            other => Err(Error::Protocol(format!("unknown event kind: {other}"))),
        }
    }
}

/// A tagged status or content message for the display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub payload: String,
}

impl Event {
    /// Create an event of the given kind
    #[must_use]
    pub fn new(kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn wake_status(status: &str) -> Self {
        Self::new(EventKind::WakeStatus, status)
    }

    #[must_use]
    pub fn llm_status(status: &str) -> Self {
        Self::new(EventKind::LlmStatus, status)
    }

    #[must_use]
    pub fn user_transcription(text: &str) -> Self {
        Self::new(EventKind::UserTranscription, text)
    }

    #[must_use]
    pub fn llm_response(text: &str) -> Self {
        Self::new(EventKind::LlmResponse, text)
    }

    #[must_use]
    pub fn system_message(text: &str) -> Self {
        Self::new(EventKind::SystemMessage, text)
    }

    /// Parse wire text, splitting on the first colon only
    ///
    /// # Errors
    ///
    /// Returns error if there is no colon or the kind is unknown
    pub fn parse(text: &str) -> crate::Result<Self> {
        let (kind, payload) = text
            .split_once(':')
            .ok_or_else(|| Error::Protocol(format!("event without kind delimiter: {text}")))?;
        Ok(Self::new(kind.parse()?, payload))
    }

    /// Wire text for this event
    #[must_use]
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.payload)
    }
}
