//! avs-validator - Address Verification Microservice
//!
//! Accepts free-form postal addresses over HTTP and returns a
//! valid / corrected / unverifiable / invalid verdict from an external
//! verification provider guarded by a circuit breaker.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avs_validator::breaker::CircuitBreaker;
use avs_validator::config::{resolve_bind, resolve_service_config};
use avs_validator::provider::{AddressProvider, SmartyClient};
use avs_validator::service::ValidationService;
use avs_validator::validator::AddressValidator;
use avs_validator::AppState;

/// Command-line arguments for avs-validator
#[derive(Parser, Debug)]
#[command(name = "avs-validator")]
#[command(about = "Address verification microservice")]
#[command(version)]
struct Args {
    /// Socket address to listen on (default 127.0.0.1:5780)
    #[arg(short, long, env = "AVS_BIND")]
    bind: Option<String>,

    /// TOML config file
    #[arg(short, long, env = "AVS_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "AVS_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config file is read before logging is up; its [logging] level feeds the filter
    let config_path =
        avs_common::config::resolve_config_path(args.config.as_deref(), "avs-validator");
    let toml_config = avs_common::config::load_toml_config(config_path.as_deref())
        .context("Failed to load configuration file")?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| toml_config.logging.level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("avs_validator={level},avs_common={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting avs-validator (Address Verification) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Configuration errors halt startup
    let config = resolve_service_config(&toml_config)
        .context("Invalid service configuration")?;

    let provider: Arc<dyn AddressProvider> = Arc::new(
        SmartyClient::new(config.provider.clone())
            .context("Failed to create address provider client")?,
    );

    let breaker = Arc::new(CircuitBreaker::new(provider.name(), config.breaker.clone()));
    info!(
        timeout_ms = config.breaker.call_timeout.as_millis() as u64,
        reset_ms = config.breaker.reset_timeout.as_millis() as u64,
        threshold = config.breaker.error_threshold_percentage,
        "Circuit breaker initialized"
    );

    let validator = AddressValidator::new(provider, breaker, config.max_candidates);
    let service = Arc::new(ValidationService::new(validator));
    let state = AppState::new(service, config.request_timeout);

    let app = avs_validator::build_router(state);

    let bind = resolve_bind(args.bind.as_deref(), &toml_config);
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", bind))?;

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
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
