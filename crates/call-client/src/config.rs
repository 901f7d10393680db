//! Call client configuration.
//!
//! Loaded from environment variables. The media App ID is held as a secret
//! and redacted in Debug output.

use common::config::{parsed_var, required_var, ConfigError, ObservabilityConfig, DEFAULT_LOG_FILTER};
use common::secret::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::broker::TokenBrokerClient;
use crate::errors::BrokerError;
use crate::media::MediaPlatform;
use crate::messaging::MessagingPlatform;
use crate::session::SessionParts;

/// Default HTTP request timeout for the token service.
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;

/// Default TCP connect timeout for the token service.
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 5;

/// Default capacity of the outward session event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Call client configuration.
#[derive(Clone)]
pub struct Config {
    /// Token service base URL (e.g. `https://tokens.example.com`).
    pub token_service_url: String,

    /// Media platform application ID. Expose only when joining.
    pub media_app_id: SecretString,

    /// Whole-request timeout for token requests (default: 10s).
    pub http_timeout: Duration,

    /// Connect timeout for token requests (default: 5s).
    pub connect_timeout: Duration,

    /// Capacity of the `SessionEvent` channel (default: 256).
    pub event_buffer: usize,

    pub observability: ObservabilityConfig,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token_service_url", &self.token_service_url)
            .field("media_app_id", &"[REDACTED]")
            .field("http_timeout", &self.http_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("event_buffer", &self.event_buffer)
            .field("observability", &self.observability)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`Config::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// `MissingEnvVar` for an absent required key, `InvalidValue` for a value
    /// that does not parse or is out of range.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let token_service_url = required_var(vars, "CALL_TOKEN_SERVICE_URL")?;
        if !(token_service_url.starts_with("http://") || token_service_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "CALL_TOKEN_SERVICE_URL".to_string(),
                value: token_service_url,
            });
        }

        let media_app_id = SecretString::from(required_var(vars, "CALL_MEDIA_APP_ID")?);

        let http_timeout_seconds: u64 = parsed_var(
            vars,
            "CALL_HTTP_TIMEOUT_SECONDS",
            DEFAULT_HTTP_TIMEOUT_SECONDS,
        )?;
        let connect_timeout_seconds: u64 = parsed_var(
            vars,
            "CALL_CONNECT_TIMEOUT_SECONDS",
            DEFAULT_CONNECT_TIMEOUT_SECONDS,
        )?;

        let event_buffer: usize = parsed_var(vars, "CALL_EVENT_BUFFER", DEFAULT_EVENT_BUFFER)?;
        if event_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CALL_EVENT_BUFFER".to_string(),
                value: "0".to_string(),
            });
        }

        let observability = ObservabilityConfig {
            log_level: vars
                .get("RUST_LOG")
                .cloned()
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            json_logs: parsed_var(vars, "CALL_LOG_JSON", false)?,
            metrics_enabled: parsed_var(vars, "CALL_METRICS_ENABLED", false)?,
        };

        Ok(Config {
            token_service_url,
            media_app_id,
            http_timeout: Duration::from_secs(http_timeout_seconds),
            connect_timeout: Duration::from_secs(connect_timeout_seconds),
            event_buffer,
            observability,
        })
    }

    /// Token service client with the configured timeouts.
    ///
    /// # Errors
    ///
    /// `BrokerError::Configuration` if the HTTP client cannot be built.
    pub fn token_broker(&self) -> Result<TokenBrokerClient, BrokerError> {
        let http_client = reqwest::Client::builder()
            .timeout(self.http_timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| BrokerError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        TokenBrokerClient::with_http_client(self.token_service_url.clone(), http_client)
    }

    /// Session collaborators: the configured token broker and app ID plus
    /// the given platform bindings. Pass `event_buffer` to
    /// `SessionActor::spawn` alongside.
    ///
    /// # Errors
    ///
    /// See [`token_broker`](Self::token_broker).
    pub fn session_parts(
        &self,
        messaging: Arc<dyn MessagingPlatform>,
        media: Arc<dyn MediaPlatform>,
    ) -> Result<SessionParts, BrokerError> {
        Ok(SessionParts::new(
            self.media_app_id.expose_secret(),
            Arc::new(self.token_broker()?),
            messaging,
            media,
        ))
    }
}
