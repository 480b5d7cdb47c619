//! ns-server: NeuroShield assessment backend
//!
//! Startup: parse args, load TOML, init logging, open the database, load the
//! token secret, serve until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use ns_common::config::{
    load_toml_or_default, report_config_warning, RootFolderInitializer, RootFolderResolver,
};
use ns_common::db::init::{init_database, load_or_init_token_secret};
use ns_common::logging::{default_directives, init_tracing};
use ns_server::config::{Args, ServerSettings, ServerToml, MODULE_NAME};
use ns_server::services::InferenceClient;
use ns_server::{build_router, AppState};
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .or_else(|| RootFolderResolver::new(MODULE_NAME).config_file_path());
    let (toml, config_warning): (ServerToml, _) = load_toml_or_default(config_path.as_deref());
    let settings = ServerSettings::resolve(&args, toml);

    let directives = default_directives(&["ns_server", "ns_common", "tower_http"], &settings.logging.level);
    init_tracing(&directives, &settings.logging).context("Failed to initialize logging")?;

    info!(
        "Starting NeuroShield backend ({}) v{}",
        MODULE_NAME,
        env!("CARGO_PKG_VERSION")
    );
    report_config_warning(config_warning);

    let initializer = RootFolderInitializer::new(settings.root_folder.clone());
    initializer.ensure_directory_exists()?;

    info!("Database path: {}", settings.database_path.display());
    let pool = match init_database(&settings.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let token_secret = match &settings.token_secret {
        Some(secret) => {
            info!("Using configured token secret");
            secret.clone()
        }
        None => load_or_init_token_secret(&pool).await?,
    };

    let inference = InferenceClient::new(
        &settings.ml_service_url,
        Duration::from_secs(settings.ml_timeout_secs),
    )?;
    info!("Inference service: {}", inference.base_url());

    let listen_addr = settings.listen_addr();
    let state = AppState::new(pool, settings, token_secret, inference);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?;
    info!("ns-server listening on http://{}", listen_addr);
    info!("Health check: http://{}/health", listen_addr);

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
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
