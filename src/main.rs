//! Events Analytics Service
//!
//! Bulk ingestion of user-activity events with:
//! - Per-client token-bucket admission control
//! - Idempotent batch inserts keyed by event_id
//! - Query-time analytics: DAU, top event types, retention cohorts

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};

use api::middleware::rate_limit::RateLimitConfig;
use api::{router, AppState};
use event_store::{health::init_schema, PgStore, StoreConfig};
use telemetry::{health, init_tracing_from_env};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    /// Maximum rows per ingestion batch
    #[serde(default = "default_max_batch_size")]
    max_batch_size: usize,

    #[serde(default)]
    rate_limit: RateLimitConfig,

    #[serde(default)]
    database: StoreConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_batch_size() -> usize {
    analytics_core::limits::DEFAULT_MAX_BATCH_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_batch_size: default_max_batch_size(),
            rate_limit: RateLimitConfig::default(),
            database: StoreConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    info!(
        "Starting Events Analytics Service v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = load_config()?;

    info!(
        max_batch_size = config.max_batch_size,
        rate_limit_rps = config.rate_limit.rps,
        rate_limit_burst = config.rate_limit.burst,
        "Loaded configuration"
    );

    // Connect the Postgres store
    let store = Arc::new(
        PgStore::connect(config.database.clone())
            .await
            .context("Failed to connect to Postgres")?,
    );

    // Initialize schema
    if let Err(e) = init_schema(&store).await {
        error!("Failed to initialize Postgres schema: {}", e);
        // Continue anyway - schema might already exist
    }

    // Check health and update status
    check_health(&store).await;

    // Create application state
    let state = AppState::with_rate_limit(
        store.clone(),
        config.max_batch_size,
        config.rate_limit.clone(),
    );

    // Start rate limiter cleanup background task
    let _rate_limiter_cleanup = state.start_rate_limiter_cleanup();
    info!("Started rate limiter cleanup task (every 5 minutes)");

    // Create router
    let app = router(state);

    // Start HTTP server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("ANALYTICS")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Manual overrides for nested config from environment
    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(url) = std::env::var("ANALYTICS_DATABASE_URL") {
        config.database.url = url;
    }
    if let Ok(rps) = std::env::var("ANALYTICS_RATE_LIMIT_RPS") {
        if let Ok(rps) = rps.parse() {
            config.rate_limit.rps = rps;
        }
    }
    if let Ok(burst) = std::env::var("ANALYTICS_RATE_LIMIT_BURST") {
        if let Ok(burst) = burst.parse() {
            config.rate_limit.burst = burst;
        }
    }
    if let Ok(max) = std::env::var("ANALYTICS_MAX_BATCH_SIZE") {
        if let Ok(max) = max.parse() {
            config.max_batch_size = max;
        }
    }

    Ok(config)
}

/// Check store health on startup.
async fn check_health(store: &PgStore) {
    let pg_healthy = event_store::health::check_connection(store).await;
    if pg_healthy {
        health().postgres.set_healthy();
        info!("Postgres connection: healthy");
    } else {
        health().postgres.set_unhealthy("Connection failed");
        error!("Postgres connection: unhealthy");
    }
}

/// Graceful shutdown signal handler.
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
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
