//! Routing of outbound events to the three downstream services

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::net::ConnectionHandle;
use crate::protocol::Event;

/// Service name of the status display
pub const UI_SERVICE: &str = "UI";
/// Service name of the session logger
pub const SESSION_SERVICE: &str = "Session Manager";
/// Service name of the TTS speaker
pub const SPEAKER_SERVICE: &str = "Speaker";

/// A question/answer pair recorded in the session log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub question: String,
    pub answer: String,
}

/// Downstream destination of an outbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Display,
    SessionLog,
    Speech,
}

/// One logical event leaving the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Status or content for the display, sent as `kind:payload`
    Display(Event),
    /// Interaction record for the session log, sent as JSON
    Log(Interaction),
    /// Sanitized text for the speaker, sent verbatim
    Speech(String),
}

impl Outbound {
    /// Where this event goes
    #[must_use]
    pub const fn route(&self) -> Route {
        match self {
            Self::Display(_) => Route::Display,
            Self::Log(_) => Route::SessionLog,
            Self::Speech(_) => Route::Speech,
        }
    }

    /// Payload text placed in the frame
    ///
    /// # Errors
    ///
    /// Returns error if the interaction cannot be serialized
    pub fn to_wire(&self) -> Result<String> {
        Ok(match self {
            Self::Display(event) => event.to_wire(),
            Self::Log(interaction) => serde_json::to_string(interaction)?,
            Self::Speech(text) => text.clone(),
        })
    }
}

/// Destination for outbound events
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event, returning once it has been written
    async fn emit(&self, event: Outbound) -> Result<()>;
}

/// Maps each outbound event onto one resilient connection
///
/// No buffering, batching or deduplication beyond what the connections do.
#[derive(Clone)]
pub struct Fanout {
    display: ConnectionHandle,
    session_log: ConnectionHandle,
    speech: ConnectionHandle,
}

impl Fanout {
    #[must_use]
    pub const fn new(
        display: ConnectionHandle,
        session_log: ConnectionHandle,
        speech: ConnectionHandle,
    ) -> Self {
        Self {
            display,
            session_log,
            speech,
        }
    }

    const fn connection(&self, route: Route) -> &ConnectionHandle {
        match route {
            Route::Display => &self.display,
            Route::SessionLog => &self.session_log,
            Route::Speech => &self.speech,
        }
    }
}

#[async_trait]
impl EventSink for Fanout {
    async fn emit(&self, event: Outbound) -> Result<()> {
        let connection = self.connection(event.route());
        let payload = event.to_wire()?;
        tracing::trace!(service = connection.name(), payload = %payload, "emit");
        connection.send(&payload).await
    }
}
