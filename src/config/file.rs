//! YAML configuration file loading
//!
//! The whole pipeline shares one `config.yaml`. Every field is optional
//! here; each service resolves the keys it needs and fails on the first
//! missing one.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// File name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Top-level configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct PipelineConfigFile {
    /// Phrases that wake the assistant
    #[serde(default)]
    pub wake_words: Option<Vec<String>>,

    /// Addresses for every service
    #[serde(default)]
    pub ports: PortsFileConfig,

    /// Completion endpoint settings
    #[serde(default)]
    pub models: ModelsFileConfig,

    /// Filesystem locations
    #[serde(default)]
    pub paths: PathsFileConfig,

    /// Session log behavior
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Orchestrator tuning; `max_frame_bytes` here is shared by every service
    #[serde(default)]
    pub central: CentralFileConfig,
}

/// Service addresses, grouped by the service that uses them
#[derive(Debug, Default, Deserialize)]
pub struct PortsFileConfig {
    #[serde(default)]
    pub central: CentralPortsFileConfig,

    #[serde(default)]
    pub session_manager: HostPortFileConfig,

    #[serde(default)]
    pub ui: HostPortFileConfig,
}

/// Addresses the orchestrator listens on and connects to
#[derive(Debug, Default, Deserialize)]
pub struct CentralPortsFileConfig {
    pub transcriber_host: Option<String>,
    pub transcriber_port: Option<u16>,
    pub speaker_host: Option<String>,
    pub speaker_port: Option<u16>,
    pub session_host: Option<String>,
    pub session_port: Option<u16>,
    pub ui_host: Option<String>,
    pub ui_port: Option<u16>,
}

/// A listening address
#[derive(Debug, Default, Deserialize)]
pub struct HostPortFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Completion endpoint configuration
#[derive(Debug, Default, Deserialize)]
pub struct ModelsFileConfig {
    /// Model identifier (e.g. "llama3")
    pub ollama: Option<String>,

    /// Generate endpoint URL
    pub ollama_endpoint: Option<String>,

    /// Request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Filesystem locations
#[derive(Debug, Default, Deserialize)]
pub struct PathsFileConfig {
    pub session_log_directory: Option<String>,
}

/// Session log configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Minutes of inactivity before a session is closed
    pub timeout_minutes: Option<f64>,
}

/// Orchestrator tuning
#[derive(Debug, Default, Deserialize)]
pub struct CentralFileConfig {
    /// Delay between downstream connect attempts
    pub reconnect_delay_secs: Option<u64>,

    /// Cap on simultaneous command dispatches (unbounded when absent)
    pub max_concurrent_dispatches: Option<usize>,

    /// Largest frame accepted from a peer, by the orchestrator as well as
    /// the session logger and display
    pub max_frame_bytes: Option<usize>,
}

/// Load and parse the configuration file at `path`
///
/// # Errors
///
/// Returns error if the file is missing, unreadable or not valid YAML
pub fn load_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    let config = serde_yaml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Locate the configuration file
///
/// An explicit path wins; otherwise `./config.yaml`, then the platform
/// config directory (`~/.config/voice-hub/config.yaml` on Linux).
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    directories::BaseDirs::new()
        .map(|d| d.config_dir().join("voice-hub").join(CONFIG_FILE_NAME))
        .filter(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let config: PipelineConfigFile = serde_yaml::from_str(
            r"
wake_words: [hey assistant, computer]
ports:
  central:
    ui_host: 127.0.0.1
    ui_port: 5003
",
        )
        .unwrap();

        assert_eq!(
            config.wake_words.as_deref(),
            Some(&["hey assistant".to_string(), "computer".to_string()][..])
        );
        assert_eq!(config.ports.central.ui_port, Some(5003));
        assert!(config.ports.central.speaker_host.is_none());
        assert!(config.models.ollama.is_none());
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/etc/voice-hub/custom.yaml");
        assert_eq!(resolve_config_path(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_config_file(Path::new("/nonexistent/voice-hub.yaml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
