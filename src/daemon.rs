//! Service bootstrap
//!
//! Wires configuration, sockets and tasks together for each of the three
//! services this crate runs: the orchestrator, the session logger and the
//! console display.

use std::sync::Arc;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::config::{CentralConfig, DisplayConfig, SessionConfig};
use crate::llm::OllamaClient;
use crate::net::{DEFAULT_BIND_POLICY, ResilientConnection, RetryPolicy, bind_with_retry};
use crate::orchestrator::fanout::{SESSION_SERVICE, SPEAKER_SERVICE, UI_SERVICE};
use crate::orchestrator::{Fanout, Orchestrator, ingest};
use crate::session::{self, SessionStore, TIMEOUT_CHECK_INTERVAL};
use crate::{Error, Result, display};

/// The orchestrator service
pub struct Daemon {
    config: CentralConfig,
}

impl Daemon {
    #[must_use]
    pub const fn new(config: CentralConfig) -> Self {
        Self { config }
    }

    /// Run until `cancel` fires
    ///
    /// Connects to the speaker, session logger and display first (waiting
    /// for each as long as it takes), then listens for transcripts.
    ///
    /// # Errors
    ///
    /// Returns error if the completion client cannot be built or the
    /// transcript listener cannot be bound
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let config = self.config;
        tracing::info!(
            listen = %config.listen.addr(),
            model = %config.llm_model,
            endpoint = %config.llm_endpoint,
            wake_words = ?config.wake_words,
            max_concurrent_dispatches = ?config.max_concurrent_dispatches,
            "starting orchestrator"
        );

        let client = OllamaClient::new(
            config.llm_endpoint.clone(),
            config.llm_model.clone(),
            config.request_timeout,
        )?;

        let policy = RetryPolicy::forever(config.reconnect_delay);
        let connect = |name: &'static str, addr: String| {
            ResilientConnection::establish(name, addr, policy, cancel.clone())
        };
        let speech = match connect(SPEAKER_SERVICE, config.speaker.addr()).await {
            Err(Error::Cancelled) => return Ok(()),
            other => other?,
        };
        let session_log = match connect(SESSION_SERVICE, config.session.addr()).await {
            Err(Error::Cancelled) => return Ok(()),
            other => other?,
        };
        let display = match connect(UI_SERVICE, config.ui.addr()).await {
            Err(Error::Cancelled) => return Ok(()),
            other => other?,
        };
        let fanout = Arc::new(Fanout::new(display, session_log, speech));

        let orchestrator = Orchestrator::new(
            config.wake_words,
            fanout,
            Arc::new(client),
            config.max_concurrent_dispatches,
        );
        let (handle, coordinator) = orchestrator.spawn(cancel.clone());

        let listener = match bind_with_retry(&config.listen.addr(), &DEFAULT_BIND_POLICY, &cancel).await {
            Err(Error::Cancelled) => return Ok(()),
            other => other?,
        };
        tracing::info!("orchestrator ready");

        ingest::serve(listener, handle, Some(config.max_frame_bytes), cancel).await;
        report_task("coordinator", coordinator.await);

        tracing::info!("orchestrator stopped");
        Ok(())
    }
}

/// Run the session logger until `cancel` fires
///
/// # Errors
///
/// Returns error if the log directory cannot be created or the listener
/// cannot be bound
pub async fn run_session_log(config: SessionConfig, cancel: CancellationToken) -> Result<()> {
    let store = Arc::new(SessionStore::open(&config.log_dir, config.timeout)?);
    tracing::info!(
        dir = %config.log_dir.display(),
        timeout_secs = config.timeout.as_secs(),
        "starting session logger"
    );

    let listener = match bind_with_retry(&config.listen.addr(), &DEFAULT_BIND_POLICY, &cancel).await {
        Err(Error::Cancelled) => return Ok(()),
        other => other?,
    };

    let watcher = tokio::spawn(session::run_timeout_watcher(
        Arc::clone(&store),
        TIMEOUT_CHECK_INTERVAL,
        cancel.clone(),
    ));

    session::serve(listener, Arc::clone(&store), Some(config.max_frame_bytes), cancel).await;
    report_task("session timeout watcher", watcher.await);

    if let Err(e) = store.close() {
        tracing::error!(error = %e, "failed to save session on shutdown");
    }
    tracing::info!("session logger stopped");
    Ok(())
}

/// Run the console display until `cancel` fires
///
/// # Errors
///
/// Returns error if the listener cannot be bound
pub async fn run_display(config: DisplayConfig, cancel: CancellationToken) -> Result<()> {
    let listener = match bind_with_retry(&config.listen.addr(), &DEFAULT_BIND_POLICY, &cancel).await {
        Err(Error::Cancelled) => return Ok(()),
        other => other?,
    };

    display::serve(listener, Some(config.max_frame_bytes), cancel).await;
    tracing::info!("display stopped");
    Ok(())
}

/// Log a background task that panicked or was aborted; `true` if it ended cleanly
fn report_task(task: &str, outcome: std::result::Result<(), JoinError>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(task, error = %e, "background task failed");
            false
        }
    }
}
