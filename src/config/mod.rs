//! Configuration management for the voice hub services

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use self::file::PipelineConfigFile;
use crate::llm::DEFAULT_REQUEST_TIMEOUT;
use crate::net::DEFAULT_RECONNECT_DELAY;
use crate::protocol::DEFAULT_MAX_FRAME_BYTES;
use crate::{Error, Result};

/// A `host:port` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Address string accepted by tokio's connect and bind
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct CentralConfig {
    /// Case-sensitive wake phrases
    pub wake_words: Vec<String>,

    /// Where transcripts arrive
    pub listen: Endpoint,

    /// TTS speaker service
    pub speaker: Endpoint,

    /// Session logger service
    pub session: Endpoint,

    /// Status display service
    pub ui: Endpoint,

    /// Completion endpoint URL
    pub llm_endpoint: String,

    /// Model identifier sent with each request
    pub llm_model: String,

    /// Completion request timeout
    pub request_timeout: Duration,

    /// Delay between downstream connect attempts
    pub reconnect_delay: Duration,

    /// Cap on simultaneous dispatches; `None` is unbounded
    pub max_concurrent_dispatches: Option<usize>,

    /// Largest transcript frame accepted
    pub max_frame_bytes: usize,
}

/// Session logger configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub listen: Endpoint,
    pub log_dir: PathBuf,
    pub timeout: Duration,
    pub max_frame_bytes: usize,
}

/// Console display configuration
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub listen: Endpoint,
    pub max_frame_bytes: usize,
}

impl CentralConfig {
    /// Resolve from a parsed file, with environment overrides for the
    /// completion endpoint (`VOICE_HUB_OLLAMA_ENDPOINT`) and model
    /// (`VOICE_HUB_OLLAMA_MODEL`)
    ///
    /// # Errors
    ///
    /// Returns error naming the first missing required key
    pub fn from_file(fc: PipelineConfigFile) -> Result<Self> {
        let ports = fc.ports.central;

        let wake_words = required(fc.wake_words, "wake_words")?;
        let listen = endpoint(
            ports.transcriber_host,
            ports.transcriber_port,
            "ports.central.transcriber_host",
            "ports.central.transcriber_port",
        )?;
        let speaker = endpoint(
            ports.speaker_host,
            ports.speaker_port,
            "ports.central.speaker_host",
            "ports.central.speaker_port",
        )?;
        let session = endpoint(
            ports.session_host,
            ports.session_port,
            "ports.central.session_host",
            "ports.central.session_port",
        )?;
        let ui = endpoint(
            ports.ui_host,
            ports.ui_port,
            "ports.central.ui_host",
            "ports.central.ui_port",
        )?;

        let llm_model = required(
            std::env::var("VOICE_HUB_OLLAMA_MODEL").ok().or(fc.models.ollama),
            "models.ollama",
        )?;
        let llm_endpoint = required(
            std::env::var("VOICE_HUB_OLLAMA_ENDPOINT")
                .ok()
                .or(fc.models.ollama_endpoint),
            "models.ollama_endpoint",
        )?;

        if wake_words.iter().all(String::is_empty) {
            return Err(Error::Config("wake_words must contain a non-empty phrase".to_string()));
        }

        Ok(Self {
            wake_words,
            listen,
            speaker,
            session,
            ui,
            llm_endpoint,
            llm_model,
            request_timeout: fc
                .models
                .request_timeout_secs
                .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs),
            reconnect_delay: fc
                .central
                .reconnect_delay_secs
                .map_or(DEFAULT_RECONNECT_DELAY, Duration::from_secs),
            max_concurrent_dispatches: fc.central.max_concurrent_dispatches,
            max_frame_bytes: fc.central.max_frame_bytes.unwrap_or(DEFAULT_MAX_FRAME_BYTES),
        })
    }

    /// Locate, load and resolve
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be found or loaded, or a key is missing
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::from_file(load_file(explicit)?)
    }
}

impl SessionConfig {
    /// Resolve from a parsed file
    ///
    /// # Errors
    ///
    /// Returns error naming the first missing required key
    pub fn from_file(fc: PipelineConfigFile) -> Result<Self> {
        let ports = fc.ports.session_manager;
        let listen = endpoint(
            ports.host,
            ports.port,
            "ports.session_manager.host",
            "ports.session_manager.port",
        )?;
        let log_dir = required(fc.paths.session_log_directory, "paths.session_log_directory")?;
        let minutes = required(fc.session.timeout_minutes, "session.timeout_minutes")?;

        if !minutes.is_finite() || minutes < 0.0 {
            return Err(Error::Config(format!(
                "session.timeout_minutes must be a non-negative number, got {minutes}"
            )));
        }

        let timeout = Duration::try_from_secs_f64(minutes * 60.0).map_err(|_| {
            Error::Config(format!("session.timeout_minutes out of range: {minutes}"))
        })?;

        Ok(Self {
            listen,
            log_dir: PathBuf::from(log_dir),
            timeout,
            max_frame_bytes: fc.central.max_frame_bytes.unwrap_or(DEFAULT_MAX_FRAME_BYTES),
        })
    }

    /// Locate, load and resolve
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be found or loaded, or a key is missing
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::from_file(load_file(explicit)?)
    }
}

impl DisplayConfig {
    /// Resolve from a parsed file
    ///
    /// # Errors
    ///
    /// Returns error naming the first missing required key
    pub fn from_file(fc: PipelineConfigFile) -> Result<Self> {
        let ports = fc.ports.ui;
        Ok(Self {
            listen: endpoint(ports.host, ports.port, "ports.ui.host", "ports.ui.port")?,
            max_frame_bytes: fc.central.max_frame_bytes.unwrap_or(DEFAULT_MAX_FRAME_BYTES),
        })
    }

    /// Locate, load and resolve
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be found or loaded, or a key is missing
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::from_file(load_file(explicit)?)
    }
}

fn load_file(explicit: Option<&Path>) -> Result<PipelineConfigFile> {
    let path = file::resolve_config_path(explicit).ok_or_else(|| {
        Error::Config(format!("{} not found", file::CONFIG_FILE_NAME))
    })?;
    file::load_config_file(&path)
}

fn required<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| Error::missing_key(key))
}

fn endpoint(
    host: Option<String>,
    port: Option<u16>,
    host_key: &str,
    port_key: &str,
) -> Result<Endpoint> {
    Ok(Endpoint {
        host: required(host, host_key)?,
        port: required(port, port_key)?,
    })
}
