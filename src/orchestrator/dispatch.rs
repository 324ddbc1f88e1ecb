//! Command dispatch: completion request plus the surrounding status events
//!
//! Within one dispatch the events go out in a fixed order:
//!
//! ```text
//! llm_status:THINKING
//! llm_response:<text>      ─┐
//! <session log entry>       │ success only
//! llm_status:SPEAKING       │
//! <speech text>            ─┘
//! system_message:<error>   ── failure only
//! wake_status:SLEEPING     ─┐ always, after the state reset
//! llm_status:IDLE          ─┘
//! ```

use std::future::Future;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::fanout::{EventSink, Interaction, Outbound};
use crate::llm::CompletionClient;
use crate::protocol::Event;
use crate::protocol::event::{IDLE, SLEEPING, SPEAKING, THINKING};

static UNSPEAKABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\s.,?!']").expect("valid regex"));

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip symbols the TTS engine reads badly
///
/// Anything other than ASCII letters, digits, whitespace and `.,?!'`
/// becomes a space; whitespace runs collapse to one space and the ends are
/// trimmed.
#[must_use]
pub fn sanitize_for_speech(text: &str) -> String {
    let replaced = UNSPEAKABLE.replace_all(text, " ");
    WHITESPACE_RUN.replace_all(&replaced, " ").trim().to_string()
}

/// How a dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The endpoint answered and the answer was spoken
    Answered,
    /// The request failed; a system message was shown instead
    Failed,
}

/// Runs commands against the completion endpoint
#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn EventSink>,
    client: Arc<dyn CompletionClient>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>, client: Arc<dyn CompletionClient>) -> Self {
        Self { sink, client }
    }

    /// Process one command to completion
    ///
    /// `reset` is awaited after the request settles, success or failure,
    /// and before `wake_status:SLEEPING` is emitted; it returns the
    /// conversation to dormant.
    pub async fn run<F, Fut>(&self, command: &str, reset: F) -> DispatchOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        tracing::info!(command, "dispatching command");
        self.emit(Outbound::Display(Event::llm_status(THINKING))).await;

        let outcome = match self.client.complete(command).await {
            Ok(answer) => {
                tracing::debug!(response_len = answer.len(), "completion received");
                self.emit(Outbound::Display(Event::llm_response(&answer))).await;
                self.emit(Outbound::Log(Interaction {
                    question: command.to_string(),
                    answer: answer.clone(),
                }))
                .await;

                let speech = sanitize_for_speech(&answer);
                self.emit(Outbound::Display(Event::llm_status(SPEAKING))).await;
                self.emit(Outbound::Speech(speech)).await;
                DispatchOutcome::Answered
            }
            Err(e) => {
                tracing::warn!(error = %e, command, "completion failed");
                let message = format!("Error connecting to LLM: {e}");
                self.emit(Outbound::Display(Event::system_message(&message))).await;
                DispatchOutcome::Failed
            }
        };

        reset().await;
        self.emit(Outbound::Display(Event::wake_status(SLEEPING))).await;
        self.emit(Outbound::Display(Event::llm_status(IDLE))).await;

        outcome
    }

    /// Emit and keep going; a lost event must not skip the state reset
    async fn emit(&self, event: Outbound) {
        let route = event.route();
        if let Err(e) = self.sink.emit(event).await {
            tracing::warn!(?route, error = %e, "failed to emit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_symbols_and_collapses_spaces() {
        assert_eq!(sanitize_for_speech("Cost: $5.50 — ok?"), "Cost 5.50 ok?");
    }

    #[test]
    fn keeps_allowed_punctuation() {
        assert_eq!(
            sanitize_for_speech("It's fine, really! Right? Yes."),
            "It's fine, really! Right? Yes."
        );
    }

    #[test]
    fn strips_markdown_and_newlines() {
        assert_eq!(
            sanitize_for_speech("**Step 1:**\n\n- open the *door*\t(now)"),
            "Step 1 open the door now"
        );
    }

    #[test]
    fn only_symbols_becomes_empty() {
        assert_eq!(sanitize_for_speech("#@$%^&*()"), "");
    }
}
