//! gamehub-server: game session relay.
//!
//! Accepts WebSocket connections from game processes and their controllers,
//! pairs them up by game id, and relays messages between them.

use clap::Parser;
use gamehub_server::config::ServerConfig;
use gamehub_server::server::GameHubServer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// gamehub-server: game session relay
#[derive(Parser, Debug)]
#[command(name = "gamehub-server", version, about = "Game session relay")]
struct Cli {
    /// Listen port (repeat to listen on several ports)
    #[arg(short, long = "port")]
    ports: Vec<u16>,

    /// Address to bind listeners on
    #[arg(long)]
    bind: Option<String>,

    /// Host name advertised in game listings
    #[arg(long)]
    host_name: Option<String>,

    /// Config file path
    #[arg(long, default_value = "~/.gamehub/config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    use tracing_subscriber::EnvFilter;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting gamehub-server");

    let config_path = PathBuf::from(&cli.config);
    let server_config = match ServerConfig::load(
        Some(&config_path),
        &cli.ports,
        cli.bind.as_deref(),
        cli.host_name.as_deref(),
    ) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let server = match GameHubServer::new(server_config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "failed to create server");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.listen().await {
        error!(error = %e, "failed to start listeners");
        std::process::exit(1);
    }

    shutdown_signal().await;
    info!("received shutdown signal");
    server.shutdown();

    info!("gamehub-server stopped");
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                ctrl_c.await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
