//! Socket plumbing: retry loops, listeners and resilient outbound connections

pub mod connection;
pub mod listener;
pub mod retry;

pub use connection::{ConnectionHandle, ResilientConnection};
pub use listener::{DEFAULT_BIND_POLICY, bind_with_retry};
pub use retry::{DEFAULT_RECONNECT_DELAY, RetryPolicy, retry, retry_if};
