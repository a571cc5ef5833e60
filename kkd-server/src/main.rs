//! kkd-server - Kkodurami community and damage-report backend
//!
//! Startup order:
//! 1. Tracing and build identification
//! 2. TOML bootstrap config, configured log level, root folder resolution
//! 3. Database open + schema
//! 4. Services (tokens, uploads, detector, seminar scraper)
//! 5. HTTP server with graceful shutdown

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kkd_common::config::{RootFolder, RootFolderResolver, TomlConfig};
use tokio::signal;
use tracing::{info, warn};

use kkd_server::api::BuildInfo;
use kkd_server::{build_router, AppState};

/// Command-line arguments for kkd-server
#[derive(Parser, Debug)]
#[command(name = "kkd-server")]
#[command(about = "Kkodurami community and damage-report backend")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config)
    #[arg(short, long, env = "KKD_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(long, env = "KKD_HOST")]
    host: Option<String>,

    /// Root folder holding the database and uploaded files
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = kkd_server::logging::init();

    let build = BuildInfo::CURRENT;
    info!(
        version = build.version,
        git = build.git_hash,
        built = build.build_timestamp,
        profile = build.build_profile,
        "Starting kkd-server"
    );

    let config =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    match log_filter.apply_level(&config.logging.level) {
        Ok(true) => info!(filter = %log_filter.current(), "Applied configured log level"),
        Ok(false) => info!(
            filter = %log_filter.current(),
            "RUST_LOG overrides configured log level"
        ),
        Err(e) => warn!("{:#}, keeping {}", e, log_filter.current()),
    }

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder.clone())
        .with_toml(&config)
        .resolve();
    let root = RootFolder::new(root_folder);
    root.ensure_directories()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", root.path().display());

    let db_path = root.database_path();
    let pool = kkd_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;
    info!("Database: {}", db_path.display());

    let state = AppState::from_config(pool, &config, &root).await?;
    let app = build_router(state);

    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
