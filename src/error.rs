//! Error types for the voice hub

use thiserror::Error;

/// Result type alias for voice hub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice hub services
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed frame or event on the wire
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Frame length prefix exceeds the receiver's limit
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Length announced by the prefix
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// Downstream connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Listening socket could not be bound
    #[error("bind error: {0}")]
    Bind(String),

    /// Completion endpoint error
    #[error("llm error: {0}")]
    Llm(String),

    /// A retry loop or task was cancelled during shutdown
    #[error("operation cancelled")]
    Cancelled,

    /// Session store error
    #[error("session error: {0}")]
    Session(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Build the diagnostic for a required configuration key that is absent
    #[must_use]
    pub fn missing_key(path: &str) -> Self {
        Self::Config(format!("missing configuration key: {path}"))
    }
}
