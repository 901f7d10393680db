//! Token Broker Client.
//!
//! Fetches the two short-lived credentials a session needs from the token
//! service:
//!
//! - `GET {base}/rtm-token?uid={local_id}` for the messaging network
//! - `GET {base}/media-token?channelName={room}&uid={local_id}` for the media channel
//!
//! Both must succeed. There is no retry and no caching: a fresh pair is
//! fetched for every join attempt. Timeouts belong to the `reqwest::Client`
//! supplied by the caller.
//!
//! # Security
//!
//! - Tokens are held as `SecretString` and never logged
//! - Request URLs are logged at debug level; response bodies are not

use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use common::types::LocalId;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::errors::BrokerError;

/// Messaging token endpoint path.
pub const RTM_TOKEN_PATH: &str = "/rtm-token";

/// Media token endpoint path.
pub const MEDIA_TOKEN_PATH: &str = "/media-token";

/// Credentials for one join attempt. Never reused across sessions.
#[derive(Debug, Clone)]
pub struct CredentialPair {
    /// Bearer token for the messaging network login.
    pub messaging_token: SecretString,
    /// Bearer token for the media channel join.
    pub media_token: SecretString,
}

/// Source of credential pairs (enables mocking).
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Fetch a fresh credential pair for `local_id` in `room_name`.
    async fn fetch_credentials(
        &self,
        local_id: &LocalId,
        room_name: &str,
    ) -> Result<CredentialPair, BrokerError>;
}

/// Token service response body.
///
/// The service may include extra fields (`uid`, `channelName`, `expiresAt`);
/// only `token` is read.
#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<SecretString>,
}

/// HTTP client for the token service.
#[derive(Debug, Clone)]
pub struct TokenBrokerClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl TokenBrokerClient {
    /// Create a client with a default `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Configuration` if the URL is not http(s) or the
    /// HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, BrokerError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| BrokerError::Configuration(format!("Failed to build HTTP client: {e}")))?;
        Self::with_http_client(base_url, http_client)
    }

    /// Create a client around a caller-configured `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Configuration` if the URL is not http(s).
    pub fn with_http_client(
        base_url: impl Into<String>,
        http_client: reqwest::Client,
    ) -> Result<Self, BrokerError> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(BrokerError::Configuration(
                "Token service URL must use http or https".to_string(),
            ));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one token from `endpoint`.
    #[instrument(skip_all, fields(endpoint = endpoint))]
    async fn fetch_token(
        &self,
        endpoint: &'static str,
        query: &[(&str, &str)],
    ) -> Result<SecretString, BrokerError> {
        let url = format!("{}{}", self.base_url, endpoint);

        debug!(target: "call.broker", url = %url, "Requesting token");

        let response = self
            .http_client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "call.broker", error = %e, "HTTP request failed");
                BrokerError::Request {
                    endpoint,
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                target: "call.broker",
                endpoint = endpoint,
                status = %status,
                "Token service returned non-success status"
            );
            return Err(BrokerError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            warn!(target: "call.broker", endpoint = endpoint, error = %e, "Failed to parse token response");
            BrokerError::InvalidResponse {
                endpoint,
                reason: e.to_string(),
            }
        })?;

        match body.token {
            Some(token) if !token.expose_secret().is_empty() => Ok(token),
            _ => {
                warn!(target: "call.broker", endpoint = endpoint, "Token response has no token");
                Err(BrokerError::MissingToken { endpoint })
            }
        }
    }
}

#[async_trait]
impl CredentialSource for TokenBrokerClient {
    #[instrument(skip_all, fields(local_id = %local_id))]
    async fn fetch_credentials(
        &self,
        local_id: &LocalId,
        room_name: &str,
    ) -> Result<CredentialPair, BrokerError> {
        let messaging_query = [("uid", local_id.as_str())];
        let media_query = [("channelName", room_name), ("uid", local_id.as_str())];

        let messaging = self.fetch_token(RTM_TOKEN_PATH, &messaging_query);
        let media = self.fetch_token(MEDIA_TOKEN_PATH, &media_query);

        // Independent requests; the first failure wins.
        let (messaging_token, media_token) = tokio::try_join!(messaging, media)?;

        debug!(target: "call.broker", "Credential pair acquired");

        Ok(CredentialPair {
            messaging_token,
            media_token,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_token(server: &MockServer, endpoint: &str, status: u16, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fetch_credentials_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(RTM_TOKEN_PATH))
            .and(query_param("uid", "local-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "rtm-abc" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(MEDIA_TOKEN_PATH))
            .and(query_param("channelName", "standup room"))
            .and(query_param("uid", "local-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "media-xyz",
                "uid": "local-1",
                "channelName": "standup room"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TokenBrokerClient::new(server.uri()).unwrap();
        let pair = client
            .fetch_credentials(&LocalId::from("local-1"), "standup room")
            .await
            .unwrap();

        assert_eq!(pair.messaging_token.expose_secret(), "rtm-abc");
        assert_eq!(pair.media_token.expose_secret(), "media-xyz");
    }

    #[tokio::test]
    async fn test_media_token_server_error() {
        let server = MockServer::start().await;
        mount_token(&server, RTM_TOKEN_PATH, 200, serde_json::json!({ "token": "rtm" })).await;
        mount_token(&server, MEDIA_TOKEN_PATH, 500, serde_json::json!({ "error": "boom" })).await;

        let client = TokenBrokerClient::new(server.uri()).unwrap();
        let result = client
            .fetch_credentials(&LocalId::from("u"), "room")
            .await;

        assert_eq!(
            result.unwrap_err(),
            BrokerError::Status {
                endpoint: MEDIA_TOKEN_PATH,
                status: 500
            }
        );
    }

    #[tokio::test]
    async fn test_missing_token_field() {
        let server = MockServer::start().await;
        mount_token(&server, RTM_TOKEN_PATH, 200, serde_json::json!({ "uid": "u" })).await;
        mount_token(&server, MEDIA_TOKEN_PATH, 200, serde_json::json!({ "token": "m" })).await;

        let client = TokenBrokerClient::new(server.uri()).unwrap();
        let result = client.fetch_credentials(&LocalId::from("u"), "room").await;

        assert_eq!(
            result.unwrap_err(),
            BrokerError::MissingToken {
                endpoint: RTM_TOKEN_PATH
            }
        );
    }

    #[tokio::test]
    async fn test_empty_token_is_missing() {
        let server = MockServer::start().await;
        mount_token(&server, RTM_TOKEN_PATH, 200, serde_json::json!({ "token": "r" })).await;
        mount_token(&server, MEDIA_TOKEN_PATH, 200, serde_json::json!({ "token": "" })).await;

        let client = TokenBrokerClient::new(server.uri()).unwrap();
        let result = client.fetch_credentials(&LocalId::from("u"), "room").await;

        assert!(matches!(
            result,
            Err(BrokerError::MissingToken { endpoint }) if endpoint == MEDIA_TOKEN_PATH
        ));
    }

    #[tokio::test]
    async fn test_non_json_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(RTM_TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;
        mount_token(&server, MEDIA_TOKEN_PATH, 200, serde_json::json!({ "token": "m" })).await;

        let client = TokenBrokerClient::new(server.uri()).unwrap();
        let result = client.fetch_credentials(&LocalId::from("u"), "room").await;

        assert!(matches!(
            result,
            Err(BrokerError::InvalidResponse { endpoint, .. }) if endpoint == RTM_TOKEN_PATH
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_request_error() {
        // Port 9 (discard) on localhost is not listening in test environments.
        let client = TokenBrokerClient::new("http://127.0.0.1:9").unwrap();
        let result = client.fetch_credentials(&LocalId::from("u"), "room").await;

        assert!(matches!(result, Err(BrokerError::Request { .. })));
    }

    #[test]
    fn test_base_url_validation() {
        assert!(matches!(
            TokenBrokerClient::new("ftp://tokens.example.com"),
            Err(BrokerError::Configuration(_))
        ));

        let client = TokenBrokerClient::new("https://tokens.example.com/").unwrap();
        assert_eq!(client.base_url(), "https://tokens.example.com");
    }

    #[test]
    fn test_credential_pair_debug_redacts() {
        let pair = CredentialPair {
            messaging_token: SecretString::from("rtm-secret"),
            media_token: SecretString::from("media-secret"),
        };

        let debug_str = format!("{pair:?}");
        assert!(!debug_str.contains("rtm-secret"));
        assert!(!debug_str.contains("media-secret"));
    }
}
