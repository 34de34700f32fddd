//! envo-ov - Observation Validation Service
//!
//! Validates crowd-sourced environmental observations and serves the
//! submission, review and model-management HTTP API.

use anyhow::{Context, Result};
use clap::Parser;
use envo_common::config::{load_toml_config, ConfigResolver};
use envo_ov::config::ServiceConfig;
use envo_ov::ensemble::OutlierEnsemble;
use envo_ov::store::MemoryObservationStore;
use envo_ov::{build_engine, build_router, AppState};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for envo-ov
#[derive(Parser, Debug)]
#[command(name = "envo-ov")]
#[command(about = "Envo Observation Validation Service")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "ENVO_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP server port (overrides config file)
    #[arg(short, long, env = "ENVO_OV_PORT")]
    port: Option<u16>,

    /// Bind address (overrides config file)
    #[arg(long)]
    host: Option<String>,

    /// Skip every external provider
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = ConfigResolver::new("envo-ov", "ENVO_CONFIG");
    let config_path = resolver.resolve(args.config.as_deref());
    let mut config: ServiceConfig = load_toml_config(config_path.as_deref())
        .context("Failed to load configuration")?;

    init_tracing(&config)?;

    info!("Starting envo-ov (Observation Validation Service)");
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: compiled defaults"),
    }

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if args.offline {
        config.providers.enabled = false;
    }

    let ensemble = OutlierEnsemble::new(config.ensemble.clone());
    let engine = build_engine(&config, &ensemble)?;
    let state = AppState::new(engine, ensemble.clone(), Arc::new(MemoryObservationStore::new()));

    if config.ensemble.warm_start {
        spawn_warm_start(ensemble, state.clone());
    }

    let app = build_router(state);

    let bind = (config.server.host.as_str(), config.server.port);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}:{}", bind.0, bind.1))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("envo-ov shut down");
    Ok(())
}

/// Initialize tracing: RUST_LOG wins, otherwise the configured level
fn init_tracing(config: &ServiceConfig) -> Result<()> {
    let level = &config.logging.level;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("envo_ov={level},envo_common={level},tower_http={level}").into());

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

/// Fit the cold-start ensemble off the request path
///
/// Submissions arriving earlier trigger the same fit on demand.
fn spawn_warm_start(ensemble: OutlierEnsemble, state: AppState) {
    tokio::spawn(async move {
        match tokio::task::spawn_blocking(move || ensemble.cold_start()).await {
            Ok(Ok(fitted)) => info!(rows = fitted.training_rows(), "Outlier ensemble warm start complete"),
            Ok(Err(e)) => {
                warn!(error = %e, "Outlier ensemble warm start failed");
                *state.last_error.write().await = Some(format!("warm start failed: {}", e));
            }
            Err(e) => error!(error = %e, "Warm start task panicked"),
        }
    });
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
