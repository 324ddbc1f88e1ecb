//! Transcript ingestion listener
//!
//! Accepts connections from the transcriber. Each connection gets its own
//! task that reads frames and submits them in order; a closed or broken
//! connection ends only that task.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use super::OrchestratorHandle;
use crate::protocol::read_frame;

/// Accept transcriber connections until `cancel` fires
pub async fn serve(
    listener: TcpListener,
    orchestrator: OrchestratorHandle,
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
                    orchestrator.clone(),
                    max_frame_bytes,
                    cancel.clone(),
                ));
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept transcriber connection");
            }
        }
    }

    tracing::debug!("ingestion listener stopped");
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    orchestrator: OrchestratorHandle,
    max_frame_bytes: Option<usize>,
    cancel: CancellationToken,
) {
    tracing::info!(%peer, "transcriber connected");

    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => break,
            frame = read_frame(&mut stream, max_frame_bytes) => frame,
        };

        match frame {
            Ok(Some(text)) if text.is_empty() => {
                tracing::debug!(%peer, "skipping empty transcript");
            }
            Ok(Some(text)) => {
                if orchestrator.submit(text).await.is_err() {
                    tracing::debug!(%peer, "orchestrator stopped");
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(%peer, error = %e, "transcriber read failed");
                break;
            }
        }
    }

    tracing::info!(%peer, "transcriber disconnected");
}
