//! Wake word / command state machine
//!
//! Decides per transcript whether the assistant is dormant or in a
//! conversation, and whether the text is a wake trigger or a command.

/// Conversation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WakeState {
    /// Waiting for a wake word
    #[default]
    Dormant,
    /// Wake word heard; transcripts are commands
    Active,
}

/// Outcome of feeding one transcript to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Dormant and a wake word matched; now active
    Woke,
    /// Dormant and no wake word; nothing to do
    Ignored,
    /// Active; the transcript should be dispatched as a command
    Command(String),
}

/// Tracks the conversation state across transcripts
#[derive(Debug, Clone)]
pub struct WakeStateMachine {
    wake_words: Vec<String>,
    state: WakeState,
}

impl WakeStateMachine {
    /// Create a dormant state machine
    ///
    /// Wake words are matched as case-sensitive substrings. Empty entries
    /// are dropped since they would match every transcript.
    #[must_use]
    pub fn new(wake_words: Vec<String>) -> Self {
        let wake_words: Vec<String> = wake_words.into_iter().filter(|w| !w.is_empty()).collect();
        tracing::debug!(wake_words = ?wake_words, "wake state machine initialized");

        Self {
            wake_words,
            state: WakeState::Dormant,
        }
    }

    /// Feed one transcript
    ///
    /// The transcript that triggers the wake word is never itself a command.
    pub fn on_transcript(&mut self, transcript: &str) -> Transition {
        match self.state {
            WakeState::Active => Transition::Command(transcript.to_string()),
            WakeState::Dormant => match self.matching_wake_word(transcript) {
                Some(wake_word) => {
                    tracing::info!(wake_word, transcript, "wake word detected");
                    self.state = WakeState::Active;
                    Transition::Woke
                }
                None => {
                    tracing::debug!(transcript, "no wake word");
                    Transition::Ignored
                }
            },
        }
    }

    /// First configured wake word contained in `transcript`
    #[must_use]
    pub fn matching_wake_word(&self, transcript: &str) -> Option<&str> {
        self.wake_words
            .iter()
            .find(|w| transcript.contains(w.as_str()))
            .map(String::as_str)
    }

    /// Return to dormant
    pub fn reset(&mut self) {
        self.state = WakeState::Dormant;
    }

    #[must_use]
    pub const fn state(&self) -> WakeState {
        self.state
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, WakeState::Active)
    }

    /// Get the configured wake words
    #[must_use]
    pub fn wake_words(&self) -> &[String] {
        &self.wake_words
    }
}
