//! Listening sockets with bind retry
//!
//! A restarted service often finds its port still held by the previous
//! process. "Address in use" is retried on a bounded schedule; any other
//! bind error is fatal immediately.

use std::io::ErrorKind;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::retry::{RetryPolicy, retry_if};
use crate::{Error, Result};

/// Ten attempts, one second apart
pub const DEFAULT_BIND_POLICY: RetryPolicy = RetryPolicy::bounded(10, Duration::from_secs(1));

/// Bind a listener at `addr`, retrying while the address is in use
///
/// # Errors
///
/// Returns [`Error::Bind`] once attempts are exhausted or on any other bind
/// failure, and [`Error::Cancelled`] on shutdown
pub async fn bind_with_retry(
    addr: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<TcpListener> {
    let result = retry_if(policy, cancel, addr, is_addr_in_use, |_| async move {
        TcpListener::bind(addr).await.map_err(Error::from)
    })
    .await;

    match result {
        Ok(listener) => {
            let local = listener
                .local_addr()
                .map_or_else(|_| addr.to_string(), |a| a.to_string());
            tracing::info!(addr = %local, "listening");
            Ok(listener)
        }
        Err(Error::Cancelled) => Err(Error::Cancelled),
        Err(e) if is_addr_in_use(&e) => Err(Error::Bind(format!(
            "{addr} still in use after {} attempts",
            policy.max_attempts.unwrap_or_default()
        ))),
        Err(e) => Err(Error::Bind(format!("{addr}: {e}"))),
    }
}

fn is_addr_in_use(err: &Error) -> bool {
    matches!(err, Error::Io(e) if e.kind() == ErrorKind::AddrInUse)
}
