//! Server configuration
//!
//! Layered: optional config file, then environment variables with the
//! `STAGEPASS` prefix (`STAGEPASS__SERVER__PORT=8080` style), then CLI
//! overrides applied in main.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server binding configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Payment processor configuration
    #[serde(default)]
    pub processor: ProcessorSettings,

    /// Inbound webhook verification
    #[serde(default)]
    pub webhook: WebhookSettings,

    /// Ticketing behavior
    #[serde(default)]
    pub ticketing: TicketingSettings,

    /// API configuration
    #[serde(default)]
    pub api: ApiSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server binding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ServerSettings {
    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Payment processor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorSettings {
    /// Processor API base URL
    #[serde(default = "default_processor_url")]
    pub base_url: String,

    /// Bearer key for outbound calls
    #[serde(default)]
    pub api_key: String,

    /// Use the in-memory mock instead of the HTTP client (local development)
    #[serde(default = "default_true")]
    pub use_mock: bool,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            base_url: default_processor_url(),
            api_key: String::new(),
            use_mock: true,
        }
    }
}

/// Inbound webhook verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSettings {
    /// Shared HMAC secret for envelope signatures
    #[serde(default = "default_webhook_secret")]
    pub secret: String,

    /// Accepted timestamp skew in seconds
    #[serde(default = "default_webhook_tolerance")]
    pub tolerance_secs: i64,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            secret: default_webhook_secret(),
            tolerance_secs: default_webhook_tolerance(),
        }
    }
}

/// Ticketing behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketingSettings {
    /// Settlement currency (ISO 4217)
    #[serde(default = "default_currency")]
    pub currency: String,

    /// How long a checkout may stay pending before the janitor expires it
    #[serde(default = "default_checkout_ttl")]
    pub checkout_ttl_secs: i64,

    /// How often the expiry janitor runs
    #[serde(default = "default_janitor_interval")]
    pub janitor_interval_secs: u64,

    /// Operator key for admin endpoints
    #[serde(default = "default_admin_key")]
    pub admin_key: String,
}

impl Default for TicketingSettings {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            checkout_ttl_secs: default_checkout_ttl(),
            janitor_interval_secs: default_janitor_interval(),
            admin_key: default_admin_key(),
        }
    }
}

/// API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Enable request tracing
    #[serde(default = "default_true")]
    pub enable_tracing: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            enable_cors: true,
            enable_tracing: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Exporter port (separate from main server)
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

// =============================================================================
// Default Functions
// =============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_processor_url() -> String {
    "https://api.processor.example".to_string()
}

fn default_webhook_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_webhook_tolerance() -> i64 {
    300
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_checkout_ttl() -> i64 {
    900 // 15 minutes
}

fn default_janitor_interval() -> u64 {
    60
}

fn default_admin_key() -> String {
    String::new()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl ServerConfig {
    /// Load configuration from environment and optional config file
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        // Environment variables with STAGEPASS prefix
        builder = builder.add_source(
            config::Environment::with_prefix("STAGEPASS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;

        let server_config: ServerConfig = config.try_deserialize().unwrap_or_else(|_| {
            tracing::warn!("Using default configuration - some settings may need adjustment");
            ServerConfig::default()
        });

        Ok(server_config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            processor: ProcessorSettings::default(),
            webhook: WebhookSettings::default(),
            ticketing: TicketingSettings::default(),
            api: ApiSettings::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}
