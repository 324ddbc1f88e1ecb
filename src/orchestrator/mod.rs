//! Orchestrator: transcripts in, status events and commands out
//!
//! A single coordinator task owns the conversation state. Ingestion
//! connections submit transcripts over a channel and wait for the
//! coordinator to finish with each one, which keeps a connection's
//! transcripts in order. Commands run as independent tasks so a slow
//! completion never blocks the next transcript; when a dispatch settles it
//! asks the coordinator to go dormant and waits for that to be applied
//! before announcing it.
//!
//! Transcripts that arrive while a command is in flight are dispatched
//! concurrently. Nothing queues or rejects them, and a finishing dispatch
//! returns the state to dormant even if a later command is still running.

pub mod dispatch;
pub mod fanout;
pub mod ingest;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

pub use dispatch::{DispatchOutcome, Dispatcher, sanitize_for_speech};
pub use fanout::{EventSink, Fanout, Interaction, Outbound, Route};
pub use state::{Transition, WakeState, WakeStateMachine};

use crate::llm::CompletionClient;
use crate::protocol::Event;
use crate::protocol::event::LISTENING;
use crate::{Error, Result};

/// Coordinator inbox depth
const INBOX_CAPACITY: usize = 64;

/// How long shutdown waits for in-flight dispatches
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages handled by the coordinator task
enum Inbound {
    /// A transcript from an ingestion connection
    Transcript {
        text: String,
        done: oneshot::Sender<()>,
    },
    /// A dispatch settled; go dormant
    DispatchFinished { done: oneshot::Sender<()> },
    /// Report the current state
    QueryState { reply: oneshot::Sender<WakeState> },
}

/// Cloneable handle for submitting transcripts to the coordinator
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<Inbound>,
}

impl OrchestratorHandle {
    /// Submit a transcript and wait until the coordinator has handled it
    ///
    /// Returns once the transcript has been forwarded, the wake check has
    /// run and any command has been spawned; it does not wait for the
    /// command itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the coordinator has stopped
    pub async fn submit(&self, text: String) -> Result<()> {
        let (done, handled) = oneshot::channel();
        self.tx
            .send(Inbound::Transcript { text, done })
            .await
            .map_err(|_| Error::Cancelled)?;
        handled.await.map_err(|_| Error::Cancelled)
    }

    /// Current conversation state
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the coordinator has stopped
    pub async fn state(&self) -> Result<WakeState> {
        let (reply, state) = oneshot::channel();
        self.tx
            .send(Inbound::QueryState { reply })
            .await
            .map_err(|_| Error::Cancelled)?;
        state.await.map_err(|_| Error::Cancelled)
    }
}

/// The coordinator: owns the wake state and spawns dispatches
pub struct Orchestrator {
    machine: WakeStateMachine,
    sink: Arc<dyn EventSink>,
    dispatcher: Dispatcher,
    limiter: Option<Arc<Semaphore>>,
    tasks: TaskTracker,
}

impl Orchestrator {
    /// Create a coordinator
    ///
    /// `max_concurrent_dispatches` caps how many commands talk to the
    /// completion endpoint at once; extra commands wait for a slot. `None`
    /// leaves dispatch unbounded.
    #[must_use]
    pub fn new(
        wake_words: Vec<String>,
        sink: Arc<dyn EventSink>,
        client: Arc<dyn CompletionClient>,
        max_concurrent_dispatches: Option<usize>,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&sink), client);
        Self {
            machine: WakeStateMachine::new(wake_words),
            sink,
            dispatcher,
            limiter: max_concurrent_dispatches.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            tasks: TaskTracker::new(),
        }
    }

    /// Start the coordinator task
    ///
    /// The task stops when `cancel` fires or every handle is dropped, then
    /// waits briefly for in-flight dispatches.
    #[must_use]
    pub fn spawn(self, cancel: CancellationToken) -> (OrchestratorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let weak = tx.downgrade();
        let task = tokio::spawn(self.run(rx, weak, cancel));
        (OrchestratorHandle { tx }, task)
    }

    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Inbound>,
        weak: mpsc::WeakSender<Inbound>,
        cancel: CancellationToken,
    ) {
        loop {
            let message = tokio::select! {
                () = cancel.cancelled() => break,
                message = rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            match message {
                Inbound::Transcript { text, done } => {
                    self.handle_transcript(text, &weak).await;
                    let _ = done.send(());
                }
                Inbound::DispatchFinished { done } => {
                    self.machine.reset();
                    tracing::debug!("conversation dormant");
                    let _ = done.send(());
                }
                Inbound::QueryState { reply } => {
                    let _ = reply.send(self.machine.state());
                }
            }
        }

        drop(rx);
        self.tasks.close();
        if tokio::time::timeout(DRAIN_TIMEOUT, self.tasks.wait()).await.is_err() {
            tracing::warn!(in_flight = self.tasks.len(), "dispatches still running at shutdown");
        }
        tracing::debug!("orchestrator stopped");
    }

    async fn handle_transcript(&mut self, text: String, weak: &mpsc::WeakSender<Inbound>) {
        tracing::info!(transcript = %text, active = self.machine.is_active(), "transcript received");
        self.emit(Outbound::Display(Event::user_transcription(&text))).await;

        match self.machine.on_transcript(&text) {
            Transition::Woke => {
                self.emit(Outbound::Display(Event::wake_status(LISTENING))).await;
            }
            Transition::Ignored => {}
            Transition::Command(command) => self.spawn_dispatch(command, weak.clone()),
        }
    }

    fn spawn_dispatch(&self, command: String, weak: mpsc::WeakSender<Inbound>) {
        let dispatcher = self.dispatcher.clone();
        let limiter = self.limiter.clone();

        self.tasks.spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };

            let outcome = dispatcher
                .run(&command, || request_reset(weak))
                .await;
            tracing::debug!(?outcome, "dispatch finished");
        });
    }

    async fn emit(&self, event: Outbound) {
        if let Err(e) = self.sink.emit(event).await {
            tracing::warn!(error = %e, "failed to emit event");
        }
    }
}

/// Ask the coordinator to go dormant and wait until it has
async fn request_reset(weak: mpsc::WeakSender<Inbound>) {
    let Some(tx) = weak.upgrade() else {
        tracing::debug!("coordinator gone, skipping reset");
        return;
    };

    let (done, applied) = oneshot::channel();
    if tx.send(Inbound::DispatchFinished { done }).await.is_err() || applied.await.is_err() {
        tracing::debug!("coordinator stopped before reset");
    }
}
