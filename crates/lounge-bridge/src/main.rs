//! # Lounge Bridge
//!
//! Forwards highlighted chat lines from a Socket.IO chat server to Gotify.
//!
//! ## Usage
//!
//! ```bash
//! # Run with the first config file found
//! lounge-bridge
//!
//! # Run with a custom config
//! lounge-bridge --config /path/to/lounge-bridge.toml
//!
//! # Run with environment variables
//! LOUNGE_HOST=chat.example.org GOTIFY_URL=https://push.example.org lounge-bridge
//! ```

mod config;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use lounge_core::{Bridge, GotifyNotifier};
use lounge_transport::SessionEnd;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::metrics::MeteredNotifier;

/// Forward highlighted chat messages to Gotify.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (default: first of lounge-bridge.toml,
    /// /etc/lounge-bridge/config.toml, ~/.config/lounge-bridge/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chat server host[:port], overrides lounge.host
    #[arg(long)]
    addr: Option<String>,

    /// Gotify base URL, overrides gotify.url
    #[arg(long)]
    gotify_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lounge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(end) if end.is_clean() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<SessionEnd> {
    // Load configuration
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.lounge.host = addr;
    }
    if let Some(url) = args.gotify_url {
        config.gotify.url = url;
    }

    if config.metrics.enabled {
        metrics::init_metrics();
        metrics::start_metrics_server(config.metrics.port)
            .context("Failed to start metrics server")?;
    }

    let settings = config.into_settings().context("Invalid configuration")?;
    info!(
        host = %settings.endpoint.host(),
        gotify = %settings.gotify.url,
        "Starting lounge bridge"
    );

    let gotify = GotifyNotifier::new(
        reqwest::Client::new(),
        &settings.gotify.url,
        settings.gotify.key.as_str(),
    );
    let bridge = Bridge::with_notifier(settings, MeteredNotifier::new(gotify));

    metrics::record_session_start();
    let end = bridge.run(shutdown_signal()).await?;
    metrics::record_session_end(&end);

    match &end {
        SessionEnd::Cancelled => info!("Shut down"),
        SessionEnd::PeerClosed => info!("Server closed the connection"),
        SessionEnd::Failed(e) => warn!(error = %e, "Session failed"),
    }

    Ok(end)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
