// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Append Upload Service
//!
//! Accepts keyed, throttled form posts and appends each payload to a named
//! file under the storage root.
//!
//! ## Endpoints
//!
//! - `POST /upload` (and `POST /`): fields `key`, `data`, `fname`; replies
//!   `OK.` or an `Error: ...` line
//! - `GET /health`, `GET /healthz`
//! - `GET /metrics` when metrics are enabled
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `UPLOAD_KEY`: Pre-shared upload key (required)
//! - `MIN_INTERVAL_SECS`: Minimum seconds between accepted uploads (default: 100)
//! - `MAX_DATA_BYTES`: Maximum payload size (default: 1000)
//! - `MAX_NAME_BYTES`: Maximum file name length (default: 20)
//! - `ALLOWED_NAME_PATTERN`: Optional file name allow-list regex
//! - `STORAGE_ROOT`: Directory receiving uploads (default: data)
//! - `RATE_STATE_PATH`: Last upload time file (default: ptime.txt)
//! - `METRICS_ENABLED`: Serve Prometheus metrics (default: true)

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use append_upload_service::{
    clock::SystemClock,
    config::{Config, MetricsConfig, RateLimitConfig, StorageConfig, ValidationConfig},
    handlers::{router, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = load_config();
    info!(
        bind_addr = %config.bind_addr,
        min_interval_secs = config.rate_limit.min_interval_secs,
        max_data_bytes = config.validation.max_data_bytes,
        max_name_bytes = config.validation.max_name_bytes,
        allow_list = config.validation.allowed_name_pattern.is_some(),
        storage_root = %config.storage.root.display(),
        "Starting append upload service"
    );

    let addr: SocketAddr = config.bind_addr.parse()?;
    let state = Arc::new(AppState::from_config(config, Arc::new(SystemClock)).await?);

    // Spawn lock cleanup task
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let pruned = cleanup_state.pipeline.store().prune_locks().await;
            if pruned > 0 {
                debug!(pruned, "Pruned idle file locks");
            }
        }
    });

    let app = router(state).layer(TraceLayer::new_for_http());

    // Start server
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Load configuration from environment variables.
fn load_config() -> Config {
    let defaults = Config::default();
    Config {
        bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
        rate_limit: RateLimitConfig {
            min_interval_secs: env_or("MIN_INTERVAL_SECS", defaults.rate_limit.min_interval_secs),
            state_path: std::env::var("RATE_STATE_PATH")
                .map(Into::into)
                .unwrap_or(defaults.rate_limit.state_path),
        },
        validation: ValidationConfig {
            shared_key: std::env::var("UPLOAD_KEY").unwrap_or_default(),
            max_data_bytes: env_or("MAX_DATA_BYTES", defaults.validation.max_data_bytes),
            max_name_bytes: env_or("MAX_NAME_BYTES", defaults.validation.max_name_bytes),
            allowed_name_pattern: std::env::var("ALLOWED_NAME_PATTERN")
                .ok()
                .filter(|p| !p.is_empty()),
        },
        storage: StorageConfig {
            root: std::env::var("STORAGE_ROOT")
                .map(Into::into)
                .unwrap_or(defaults.storage.root),
        },
        metrics: MetricsConfig {
            enabled: env_or("METRICS_ENABLED", defaults.metrics.enabled),
            ..defaults.metrics
        },
    }
}

/// Parse an environment variable, falling back to `default`.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
