//! Call Client probe
//!
//! Checks that a room is joinable from this machine without opening any
//! media: loads configuration, fetches a credential pair for the room named
//! on the command line and reports the outcome. Tokens are never printed.
//!
//! ```text
//! call-client <room-name>
//! ```
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing (plain or JSON)
//! 3. Initialize Prometheus metrics recorder when enabled
//! 4. Fetch credentials for a fresh local ID
//! 5. Log the outcome (and rendered metrics at debug level)

#![warn(clippy::pedantic)]

use std::time::Instant;

use call_client::broker::CredentialSource;
use call_client::config::Config;
use call_client::errors::SessionError;
use call_client::observability::{init_metrics_recorder, metrics};
use common::config::DEFAULT_LOG_FILTER;
use common::types::LocalId;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let filter = EnvFilter::try_new(&config.observability.log_level)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!(
        token_service_url = %config.token_service_url,
        http_timeout_seconds = config.http_timeout.as_secs(),
        "Starting call client probe"
    );

    let metrics_handle = if config.observability.metrics_enabled {
        Some(init_metrics_recorder()?)
    } else {
        None
    };

    let room_name = std::env::args()
        .nth(1)
        .map(|room| room.trim().to_string())
        .filter(|room| !room.is_empty())
        .ok_or_else(|| SessionError::InvalidArgument("usage: call-client <room-name>".to_string()))?;

    let broker = config.token_broker()?;
    let local_id = LocalId::generate();

    let started = Instant::now();
    let result = broker.fetch_credentials(&local_id, &room_name).await;
    let outcome = if result.is_ok() { "success" } else { "error" };
    metrics::record_credential_fetch(outcome, started.elapsed());

    match result {
        Ok(_credentials) => info!(
            local_id = %local_id,
            room = %room_name,
            elapsed_ms = started.elapsed().as_millis(),
            "Credential pair acquired, room is joinable"
        ),
        Err(e) => {
            error!(
                local_id = %local_id,
                room = %room_name,
                endpoint = e.endpoint().unwrap_or("-"),
                error = %e,
                "Credential fetch failed"
            );
            return Err(e.into());
        }
    }

    if let Some(handle) = metrics_handle {
        debug!(metrics = %handle.render(), "Probe metrics");
    }

    Ok(())
}
