//! sicop-api - property valuation and market segmentation service
//!
//! Startup is strictly ordered and fails fast: configuration, data folder,
//! curated segments, dataset, model, standardizer and clustering are all
//! built before the listener binds. Nothing is served from a partial engine.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sicop_api::{build_router, AppState, ValuationEngine};
use sicop_common::config::{load_config, resolve_data_dir};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for sicop-api
#[derive(Parser, Debug)]
#[command(name = "sicop-api")]
#[command(about = "Property valuation and market segmentation service")]
#[command(version)]
struct Args {
    /// Config file (overrides SICOP_CONFIG and the well-known locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder holding the dataset, segment table and model (overrides SICOP_DATA_DIR)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "SICOP_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides the config file)
    #[arg(long, env = "SICOP_HOST")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise start at info and switch to the configured level once loaded
    let rust_log = EnvFilter::try_from_default_env().ok();
    let has_rust_log = rust_log.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(rust_log.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any slow initialization
    info!(
        "Starting SICOP valuation service (sicop-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if !has_rust_log {
        let level = EnvFilter::try_new(&config.logging.level)
            .with_context(|| format!("Invalid logging.level '{}'", config.logging.level))?;
        filter_handle
            .reload(level)
            .context("Failed to apply logging.level")?;
    }

    let data_dir = resolve_data_dir(args.data_dir.as_deref(), &config);
    info!("Data folder: {}", data_dir.display());
    let files = config.data.resolve(&data_dir);

    let engine = ValuationEngine::load(&files, &config)
        .context("Failed to initialize valuation engine")?;
    info!(
        "✓ Valuation engine ready: {} properties, prices {:.1}..{:.1} UF, {} global segments",
        engine.dataset().len(),
        engine.blender().min(),
        engine.blender().max(),
        engine.segmenter().n_clusters()
    );

    let app = build_router(AppState::new(engine));

    let host = args.host.unwrap_or(config.server.host);
    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("sicop-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
