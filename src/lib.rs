//! Voice Hub - orchestrator for a socket-connected voice assistant pipeline
//!
//! Independent services (microphone, transcriber, orchestrator, speaker,
//! session logger, display) talk to each other over TCP using 4-byte
//! big-endian length-prefixed UTF-8 frames. This crate provides the
//! orchestrator plus the session logger and a console display.
//!
//! # Architecture
//!
//! ```text
//!  transcriber ──frames──▶ ┌──────────────────────────────┐
//!                          │ ingest ─▶ coordinator (state) │
//!                          │              │ spawn           │
//!                          │              ▼                 │
//!                          │         dispatcher ─▶ LLM      │
//!                          │              │                 │
//!                          │           fan-out              │
//!                          └───┬──────────┬──────────┬──────┘
//!                              ▼          ▼          ▼
//!                           display   session log  speaker
//! ```

pub mod config;
pub mod daemon;
pub mod display;
pub mod error;
pub mod llm;
pub mod net;
pub mod orchestrator;
pub mod protocol;
pub mod session;

pub use config::{CentralConfig, DisplayConfig, Endpoint, SessionConfig};
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use llm::{CompletionClient, OllamaClient};
pub use net::{ConnectionHandle, ResilientConnection, RetryPolicy};
pub use orchestrator::{
    Dispatcher, EventSink, Fanout, Orchestrator, OrchestratorHandle, Outbound, WakeState,
    WakeStateMachine,
};
pub use protocol::{Event, EventKind};
pub use session::SessionStore;
