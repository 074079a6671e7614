//! dirwatch CLI - network share change monitor

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dirwatch_core::MonitorConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cmd;
mod daemon;
mod locks;
mod process;
mod util;

/// dirwatch - Scheduled change reports for a shared directory
#[derive(Parser)]
#[command(name = "dirwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the monitor in the background
    Start {
        /// Run in foreground (reports go to this terminal)
        #[arg(long)]
        foreground: bool,

        /// Set by the background launcher; log to a file instead of stderr
        #[arg(long, hide = true)]
        detached: bool,
    },
    /// Stop the background monitor
    Stop,
    /// Show monitor process status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = MonitorConfig::load().context("Invalid monitor configuration")?;

    let detached = matches!(cli.command, Commands::Start { detached: true, .. });
    init_tracing(&config, detached);

    match cli.command {
        Commands::Start { foreground, .. } => cmd::start::run(config, foreground).await,
        Commands::Stop => cmd::stop::run(config).await,
        Commands::Status => cmd::status::run(config).await,
    }
}

/// Logs go to stderr, or `<state>/logs/dirwatch.log` for the detached daemon
///
/// stdout stays reserved for reports and operator messages.
fn init_tracing(config: &MonitorConfig, detached: bool) {
    let default_level = if detached { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if detached {
        let log_dir = config.log_dir();
        std::fs::create_dir_all(&log_dir).ok();
        let file_appender = tracing_appender::rolling::never(log_dir, "dirwatch.log");
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(file_appender),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
