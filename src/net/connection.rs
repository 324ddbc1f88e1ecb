//! Self-healing outbound connection to one downstream service
//!
//! A single task owns the socket. Senders hand frames to it over a queue
//! and wait for the outcome, so connect, reconnect and write never
//! interleave between callers. A failed write closes the stale socket,
//! reconnects (retrying forever) and resends the same frame exactly once.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::retry::{RetryPolicy, retry};
use crate::protocol::frame;
use crate::{Error, Result};

/// A queued write and the channel its outcome is reported on
struct SendRequest {
    frame: Vec<u8>,
    reply: oneshot::Sender<Result<()>>,
}

/// Cloneable sending side of a [`ResilientConnection`]
#[derive(Clone)]
pub struct ConnectionHandle {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<SendRequest>,
}

impl ConnectionHandle {
    /// Logical service name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Frame `text` and deliver it
    ///
    /// Waits until the owning task has written the frame, reconnecting if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns error if the resend after a reconnect also fails, or the
    /// connection task has shut down
    pub async fn send(&self, text: &str) -> Result<()> {
        self.send_frame(frame::encode(text)?).await
    }

    /// Deliver an already encoded frame
    ///
    /// # Errors
    ///
    /// See [`ConnectionHandle::send`]
    pub async fn send_frame(&self, frame: Vec<u8>) -> Result<()> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(SendRequest { frame, reply })
            .map_err(|_| self.closed())?;
        outcome.await.map_err(|_| self.closed())?
    }

    fn closed(&self) -> Error {
        Error::Connection(format!("{} connection closed", self.name))
    }
}

/// Owner of the socket to one downstream service
pub struct ResilientConnection {
    name: Arc<str>,
    addr: String,
    policy: RetryPolicy,
    cancel: CancellationToken,
    stream: Option<TcpStream>,
}

impl ResilientConnection {
    /// Connect to `addr`, retrying per `policy`, then spawn the owning task
    ///
    /// Does not return until the first connection succeeds. The task stops
    /// when every handle is dropped or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if shutdown happens before connecting,
    /// or the last connect error under a bounded policy
    pub async fn establish(
        name: &str,
        addr: impl Into<String>,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Result<ConnectionHandle> {
        let mut conn = Self {
            name: Arc::from(name),
            addr: addr.into(),
            policy,
            cancel,
            stream: None,
        };
        conn.stream = Some(conn.connect().await?);

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle {
            name: Arc::clone(&conn.name),
            tx,
        };
        tokio::spawn(conn.run(rx));
        Ok(handle)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SendRequest>) {
        loop {
            let request = tokio::select! {
                () = self.cancel.cancelled() => break,
                request = rx.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            let outcome = self.deliver(&request.frame).await;
            if let Err(e) = &outcome {
                tracing::error!(service = %self.name, error = %e, "send failed");
            }
            // Caller may have given up waiting
            let _ = request.reply.send(outcome);
        }

        tracing::debug!(service = %self.name, "connection task stopped");
    }

    /// Write `frame`; on failure reconnect and write it once more
    async fn deliver(&mut self, frame: &[u8]) -> Result<()> {
        if let Some(stream) = self.stream.as_mut() {
            match write(stream, frame).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        service = %self.name,
                        error = %e,
                        "downstream disconnected, reconnecting"
                    );
                }
            }
        }

        // Dropping the stale stream closes it
        self.stream = None;
        let mut stream = self.connect().await?;

        match write(&mut stream, frame).await {
            Ok(()) => {
                self.stream = Some(stream);
                Ok(())
            }
            Err(e) => Err(Error::Connection(format!(
                "{}: resend after reconnect failed: {e}",
                self.name
            ))),
        }
    }

    async fn connect(&self) -> Result<TcpStream> {
        let name = &*self.name;
        let addr = self.addr.as_str();
        tracing::info!(service = name, addr, "connecting");

        let stream = retry(&self.policy, &self.cancel, name, |attempt| async move {
            tracing::debug!(service = name, addr, attempt, "connect attempt");
            TcpStream::connect(addr)
                .await
                .map_err(|e| Error::Connection(format!("{name} at {addr}: {e}")))
        })
        .await?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(service = name, error = %e, "failed to set TCP_NODELAY");
        }
        tracing::info!(service = name, addr, "connected");
        Ok(stream)
    }
}

async fn write(stream: &mut TcpStream, frame: &[u8]) -> std::io::Result<()> {
    stream.write_all(frame).await?;
    stream.flush().await
}
