//! Session logger service
//!
//! Receives interaction records from the orchestrator as JSON frames and
//! appends them to the session store. Malformed records are logged and
//! dropped.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use super::SessionStore;
use crate::protocol::read_frame;

/// How often the inactivity timeout is checked
pub const TIMEOUT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Accept orchestrator connections until `cancel` fires
pub async fn serve(
    listener: TcpListener,
    store: Arc<SessionStore>,
    max_frame_bytes: Option<usize>,
    cancel: CancellationToken,
) {
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
                    Arc::clone(&store),
                    max_frame_bytes,
                    cancel.clone(),
                ));
            }
            Err(e) => tracing::warn!(error = %e, "failed to accept session log connection"),
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    store: Arc<SessionStore>,
    max_frame_bytes: Option<usize>,
    cancel: CancellationToken,
) {
    tracing::info!(%peer, "orchestrator connected to session log");

    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => break,
            frame = read_frame(&mut stream, max_frame_bytes) => frame,
        };

        match frame {
            Ok(Some(text)) => record(&store, &text),
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(%peer, error = %e, "session log read failed");
                break;
            }
        }
    }

    tracing::info!(%peer, "session log client disconnected");
}

fn record(store: &SessionStore, text: &str) {
    let interaction: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "received malformed JSON, dropping");
            return;
        }
    };

    if let Err(e) = store.add_entry(interaction) {
        tracing::error!(error = %e, "failed to record session entry");
    }
}

/// Periodically close the session once it has been idle too long
pub async fn run_timeout_watcher(
    store: Arc<SessionStore>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // Skip the first immediate tick
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = store.expire_idle() {
                    tracing::error!(error = %e, "failed to finalize idle session");
                }
            }
        }
    }
}
