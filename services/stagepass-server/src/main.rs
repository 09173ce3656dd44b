//! StagePass Server
//!
//! Ticketing backend: inventory, purchases with async payment settlement,
//! resale marketplace, transfers, and refunds.
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings (mock processor, in-memory store)
//! stagepass-server
//!
//! # Start with custom config
//! stagepass-server --config /path/to/config.toml
//!
//! # Start with environment overrides
//! STAGEPASS__SERVER__PORT=8080 stagepass-server
//! ```

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stagepass_api::{create_router, ApiConfig, AppState};
use stagepass_core::{PurchaseEngine, Store};
use stagepass_processor::{HttpProcessor, MockProcessor, PaymentProcessor, WebhookVerifier};
use stagepass_types::Currency;

use crate::config::ServerConfig;

// =============================================================================
// CLI Arguments
// =============================================================================

/// StagePass Server - ticketing with async payment settlement
#[derive(Parser, Debug)]
#[command(name = "stagepass-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "STAGEPASS_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "STAGEPASS_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "STAGEPASS_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "STAGEPASS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (json, pretty)
    #[arg(long, env = "STAGEPASS_LOG_FORMAT", default_value = "pretty")]
    log_format: String,

    /// Processor bearer key
    #[arg(long, env = "PROCESSOR_API_KEY")]
    processor_api_key: Option<String>,

    /// Webhook signing secret
    #[arg(long, env = "WEBHOOK_SECRET")]
    webhook_secret: Option<String>,

    /// Enable development mode (relaxed secret validation)
    #[arg(long, env = "STAGEPASS_DEV_MODE")]
    dev_mode: bool,
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;

    // Override with CLI arguments
    if let Some(host) = args.host {
        server_config.server.host = host;
    }
    if let Some(port) = args.port {
        server_config.server.port = port;
    }
    if let Some(key) = args.processor_api_key {
        server_config.processor.api_key = key;
    }
    if let Some(secret) = args.webhook_secret {
        server_config.webhook.secret = secret;
    }
    server_config.logging.level = args.log_level;
    server_config.logging.format = args.log_format;

    init_logging(&server_config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting StagePass Server"
    );

    validate_config(&server_config, args.dev_mode)?;

    let currency = Currency::parse(&server_config.ticketing.currency)
        .map_err(|e| anyhow::anyhow!("invalid ticketing.currency: {e}"))?;

    // The processor seam: real HTTP client or the recording mock
    let processor: Arc<dyn PaymentProcessor> = if server_config.processor.use_mock {
        tracing::warn!("Using mock payment processor; settlements must be delivered by hand");
        Arc::new(MockProcessor::new())
    } else {
        tracing::info!(base_url = %server_config.processor.base_url, "Using HTTP payment processor");
        Arc::new(HttpProcessor::new(
            server_config.processor.base_url.clone(),
            server_config.processor.api_key.clone(),
        ))
    };

    let verifier = WebhookVerifier::new(
        server_config.webhook.secret.clone(),
        server_config.webhook.tolerance_secs,
    );

    let state = Arc::new(AppState::new(
        Store::new(),
        processor,
        currency,
        verifier,
        server_config.ticketing.admin_key.clone(),
    ));

    // Background janitor: expire checkouts abandoned past the TTL
    spawn_expiry_janitor(state.purchases.clone(), &server_config.ticketing);

    if server_config.metrics.enabled {
        start_metrics_exporter(&server_config.metrics)?;
    }

    let api_config = ApiConfig {
        enable_cors: server_config.api.enable_cors,
        enable_tracing: server_config.api.enable_tracing,
    };
    let app = create_router(state, api_config);

    let addr = server_config.server.socket_addr()?;
    tracing::info!(
        host = %server_config.server.host,
        port = %server_config.server.port,
        "Server listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(server_config.server.shutdown_timeout()))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

/// Initialize tracing/logging
fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber.with(fmt::layer().json().with_target(true)).init();
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true))
                .init();
        }
    }

    Ok(())
}

/// Validate configuration
fn validate_config(config: &ServerConfig, dev_mode: bool) -> anyhow::Result<()> {
    if !dev_mode && config.webhook.secret == "change-me-in-production" {
        anyhow::bail!(
            "Webhook secret must be changed in production. Set WEBHOOK_SECRET environment variable."
        );
    }
    if !dev_mode && !config.processor.use_mock && config.processor.api_key.is_empty() {
        anyhow::bail!("processor.api_key is required when the HTTP processor is enabled");
    }
    if config.ticketing.admin_key.is_empty() {
        tracing::warn!("ticketing.admin_key is empty; operator endpoints are disabled");
    }
    Ok(())
}

/// Run the pending-checkout janitor on its configured interval
fn spawn_expiry_janitor(purchases: PurchaseEngine, ticketing: &config::TicketingSettings) {
    let ttl = chrono::Duration::seconds(ticketing.checkout_ttl_secs);
    let interval = Duration::from_secs(ticketing.janitor_interval_secs);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let expired = purchases.expire_pending(ttl).await;
            if expired > 0 {
                tracing::info!(expired, "expired stale pending checkouts");
            }
        }
    });
}

/// Install the Prometheus exporter on its own port
fn start_metrics_exporter(config: &config::MetricsConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(port = config.port, "Metrics exporter started");
    Ok(())
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal(timeout: Duration) {
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
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    tracing::info!(
        timeout_secs = timeout.as_secs(),
        "Waiting for in-flight requests to complete..."
    );
    tokio::time::sleep(timeout).await;
}

// =============================================================================
// Tests
// =============================================================================
