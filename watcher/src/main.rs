//! Octowatch Watcher - GitHub repository activity notifier.
//!
//! This binary polls GitHub for repository changes and posts webhook
//! notifications.
//!
//! # Commands
//!
//! - `octowatch-watcher run`: start the watcher daemon
//! - `octowatch-watcher check`: run a single detection pass and print the
//!   events as JSON lines (no notifications are sent)
//!
//! # Environment Variables
//!
//! See the [`octowatch_watcher::config`] module for available options.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use octowatch_watcher::config::Config;
use octowatch_watcher::control::{create_router, AppState};
use octowatch_watcher::runner::Watcher;
use octowatch_watcher::session::{shared_settings, ControlCommand};

/// Capacity of the control command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Octowatch Watcher - GitHub repository activity notifier.
///
/// Polls the configured account's repositories, classifies changes, and
/// delivers webhook notifications.
#[derive(Parser, Debug)]
#[command(name = "octowatch-watcher")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    OCTOWATCH_GITHUB_USER        Account to watch (required)
    OCTOWATCH_GITHUB_TOKEN       API token (optional)
    OCTOWATCH_WEBHOOK_URL        Destination webhook (optional)
    OCTOWATCH_INTERVAL_SECS      Poll interval, minimum 60 (default: 3600)
    OCTOWATCH_CURSOR_PATH        Cursor file (default: ~/.octowatch/cursors.json)
    OCTOWATCH_CONTROL_ADDR       Control API address (default: 127.0.0.1:8787)

EXAMPLES:
    # Start the daemon
    export OCTOWATCH_GITHUB_USER=octocat
    export OCTOWATCH_WEBHOOK_URL=https://discord.com/api/webhooks/...
    octowatch-watcher run

    # One-shot pass, events on stdout
    octowatch-watcher check
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the watcher daemon.
    ///
    /// Runs detection passes on a timer and serves the control API.
    Run,

    /// Run a single detection pass and print events as JSON lines.
    ///
    /// No notifications are delivered; cursors are advanced and persisted
    /// exactly as in the daemon.
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    match cli.command {
        Command::Run => runtime.block_on(run_daemon()),
        Command::Check => runtime.block_on(run_check()),
    }
}

/// Runs the watcher daemon: control API, timer loop, graceful shutdown.
async fn run_daemon() -> Result<()> {
    init_logging();

    info!("Starting Octowatch Watcher");

    let config = Config::from_env().context("Failed to load configuration")?;

    info!(
        github_user = %config.github_user,
        interval_secs = config.interval_secs,
        control_addr = %config.control_addr,
        cursor_path = %config.cursor_path.display(),
        authenticated = config.github_token.is_some(),
        "Configuration loaded"
    );

    let settings = shared_settings(
        config.webhook_url.clone(),
        Duration::from_secs(config.interval_secs),
    );
    let mut watcher = Watcher::new(&config, settings.clone());

    // Control API
    let (command_tx, mut command_rx) = mpsc::channel::<ControlCommand>(COMMAND_CHANNEL_CAPACITY);
    let state = AppState {
        commands: command_tx,
        settings: settings.clone(),
    };
    let listener = TcpListener::bind(config.control_addr)
        .await
        .context(format!("Failed to bind control API to {}", config.control_addr))?;
    info!(addr = %config.control_addr, "Control API listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, create_router(state)).await {
            error!(error = %e, "Control API server stopped");
        }
    });

    // Initial pass records the baseline (and seeds cursors on first run).
    let report = watcher.run_pass().await;
    log_report(&report);

    info!("Watcher running. Press Ctrl+C to stop.");

    // Main loop: one timeline for timer ticks and control commands, so
    // passes never overlap. The interval is re-read on every iteration.
    loop {
        let interval = settings.read().await.interval;

        tokio::select! {
            _ = wait_for_shutdown() => {
                info!("Shutdown signal received");
                break;
            }

            _ = tokio::time::sleep(interval) => {
                let report = watcher.run_pass().await;
                log_report(&report);
            }

            Some(command) = command_rx.recv() => {
                watcher.handle_command(command).await;
            }
        }
    }

    // Cursor saves are atomic, so stopping here cannot corrupt the table.
    info!("Watcher stopped");
    Ok(())
}

/// Runs a single pass and prints its events to stdout as JSON lines.
async fn run_check() -> Result<()> {
    init_logging();

    let config = Config::from_env().context("Failed to load configuration")?;

    // No destination: the pass classifies and persists but delivers nothing.
    let settings = shared_settings(None, Duration::from_secs(config.interval_secs));
    let mut watcher = Watcher::new(&config, settings);

    let (report, events) = watcher.run_once().await;

    for event in &events {
        println!("{}", serde_json::to_string(event)?);
    }

    if let Some(note) = &report.note {
        info!(note = %note, "Pass finished");
    }
    info!(events = report.events, "Check complete");

    Ok(())
}

/// Logs a pass report at the appropriate level.
fn log_report(report: &octowatch_watcher::session::PassReport) {
    match &report.note {
        Some(note) => warn!(
            events = report.events,
            delivered = report.delivered,
            note = %note,
            "Pass finished with note"
        ),
        None => info!(
            events = report.events,
            delivered = report.delivered,
            "Pass finished"
        ),
    }
}

/// Initializes the logging subsystem.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
