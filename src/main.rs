use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use voice_hub::{CentralConfig, Daemon, DisplayConfig, SessionConfig, daemon};

/// Voice Hub - orchestrator and support services for a voice assistant pipeline
#[derive(Parser)]
#[command(name = "voice-hub", version, about)]
struct Cli {
    /// Path to the shared pipeline config file
    #[arg(short, long, env = "VOICE_HUB_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the orchestrator (default)
    Central,
    /// Run the session logger
    SessionLog,
    /// Run the console status display
    Display,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,voice_hub=info",
        1 => "info,voice_hub=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            on_signal.cancel();
        }
    });

    match cli.command.unwrap_or(Command::Central) {
        Command::Central => {
            let config = CentralConfig::load(config_path)?;
            tracing::debug!(?config, "loaded configuration");
            Daemon::new(config).run(cancel).await?;
        }
        Command::SessionLog => {
            let config = SessionConfig::load(config_path)?;
            tracing::debug!(?config, "loaded configuration");
            daemon::run_session_log(config, cancel).await?;
        }
        Command::Display => {
            let config = DisplayConfig::load(config_path)?;
            tracing::debug!(?config, "loaded configuration");
            daemon::run_display(config, cancel).await?;
        }
    }

    Ok(())
}
