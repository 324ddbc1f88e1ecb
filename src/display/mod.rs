//! Console status display
//!
//! Listens for display events from the orchestrator and renders them as
//! terminal lines: a status line whenever the wake or LLM status changes,
//! and one line per transcript, response or system message.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::protocol::event::{IDLE, SLEEPING};
use crate::protocol::{Event, EventKind, read_frame};

/// Latest statuses seen by the display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    wake: String,
    llm: String,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            wake: SLEEPING.to_string(),
            llm: IDLE.to_string(),
        }
    }
}

impl DisplayState {
    /// Apply an event and return the line to print
    pub fn apply(&mut self, event: &Event) -> String {
        match event.kind {
            EventKind::WakeStatus => {
                self.wake.clone_from(&event.payload);
                self.status_line()
            }
            EventKind::LlmStatus => {
                self.llm.clone_from(&event.payload);
                self.status_line()
            }
            EventKind::UserTranscription => format!("You: {}", event.payload),
            EventKind::LlmResponse => format!("Assistant: {}", event.payload),
            EventKind::SystemMessage => format!("System: {}", event.payload),
        }
    }

    #[must_use]
    pub fn wake(&self) -> &str {
        &self.wake
    }

    #[must_use]
    pub fn llm(&self) -> &str {
        &self.llm
    }

    fn status_line(&self) -> String {
        format!("[wake: {} | llm: {}]", self.wake, self.llm)
    }
}

/// Accept orchestrator connections and render their events until `cancel` fires
pub async fn serve(listener: TcpListener, max_frame_bytes: Option<usize>, cancel: CancellationToken) {
    let state = Arc::new(Mutex::new(DisplayState::default()));

    loop {
        let accepted = tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                tokio::spawn(handle_connection(
                    stream,
                    peer,
                    Arc::clone(&state),
                    max_frame_bytes,
                    cancel.clone(),
                ));
            }
            Err(e) => tracing::warn!(error = %e, "failed to accept display connection"),
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: Arc<Mutex<DisplayState>>,
    max_frame_bytes: Option<usize>,
    cancel: CancellationToken,
) {
    tracing::info!(%peer, "orchestrator connected to display");

    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => break,
            frame = read_frame(&mut stream, max_frame_bytes) => frame,
        };

        let text = match frame {
            Ok(Some(text)) => text,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(%peer, error = %e, "display read failed");
                break;
            }
        };

        match Event::parse(&text) {
            Ok(event) => {
                let line = state.lock().await.apply(&event);
                println!("{line}");
            }
            Err(e) => tracing::warn!(error = %e, "ignoring display message"),
        }
    }

    tracing::info!(%peer, "display client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::event::{LISTENING, THINKING};

    #[test]
    fn starts_sleeping_and_idle() {
        let state = DisplayState::default();
        assert_eq!(state.wake(), SLEEPING);
        assert_eq!(state.llm(), IDLE);
    }

    #[test]
    fn status_events_update_the_status_line() {
        let mut state = DisplayState::default();
        assert_eq!(
            state.apply(&Event::wake_status(LISTENING)),
            "[wake: LISTENING | llm: IDLE]"
        );
        assert_eq!(
            state.apply(&Event::llm_status(THINKING)),
            "[wake: LISTENING | llm: THINKING]"
        );
        assert_eq!(state.llm(), THINKING);
    }

    #[test]
    fn content_events_render_speaker_lines() {
        let mut state = DisplayState::default();
        assert_eq!(state.apply(&Event::user_transcription("hi")), "You: hi");
        assert_eq!(state.apply(&Event::llm_response("hello")), "Assistant: hello");
        assert_eq!(
            state.apply(&Event::system_message("Error connecting to LLM")),
            "System: Error connecting to LLM"
        );
        assert_eq!(state, DisplayState::default());
    }
}
