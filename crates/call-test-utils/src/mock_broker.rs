//! Mock credential source.
//!
//! # Example
//!
//! ```rust,ignore
//! use call_test_utils::MockCredentialSource;
//!
//! let broker = MockCredentialSource::builder()
//!     .fail_with(BrokerError::Status { endpoint: "/media-token", status: 500 })
//!     .build();
//! ```

use std::sync::Mutex;

use async_trait::async_trait;
use call_client::broker::{CredentialPair, CredentialSource};
use call_client::errors::BrokerError;
use common::secret::SecretString;
use common::types::LocalId;

use crate::fixtures::CallLog;

/// Messaging token issued by default.
pub const TEST_MESSAGING_TOKEN: &str = "test-rtm-token";

/// Media token issued by default.
pub const TEST_MEDIA_TOKEN: &str = "test-media-token";

/// Credential source returning a fixed outcome.
#[derive(Debug)]
pub struct MockCredentialSource {
    failure: Option<BrokerError>,
    requests: Mutex<Vec<(LocalId, String)>>,
    log: CallLog,
}

impl MockCredentialSource {
    #[must_use]
    pub fn builder() -> MockCredentialSourceBuilder {
        MockCredentialSourceBuilder::default()
    }

    /// Source that always issues the test token pair.
    #[must_use]
    pub fn issuing() -> Self {
        Self::builder().build()
    }

    /// Source that always fails with `error`.
    #[must_use]
    pub fn failing(error: BrokerError) -> Self {
        Self::builder().fail_with(error).build()
    }

    /// `(local_id, room_name)` of every request, in order.
    pub fn requests(&self) -> Vec<(LocalId, String)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CredentialSource for MockCredentialSource {
    async fn fetch_credentials(
        &self,
        local_id: &LocalId,
        room_name: &str,
    ) -> Result<CredentialPair, BrokerError> {
        self.log.push(format!("broker.fetch:{room_name}"));
        self.requests
            .lock()
            .unwrap()
            .push((local_id.clone(), room_name.to_string()));

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(CredentialPair {
                messaging_token: SecretString::from(TEST_MESSAGING_TOKEN),
                media_token: SecretString::from(TEST_MEDIA_TOKEN),
            }),
        }
    }
}

/// Builder for `MockCredentialSource`.
#[derive(Debug, Default)]
pub struct MockCredentialSourceBuilder {
    failure: Option<BrokerError>,
    log: Option<CallLog>,
}

impl MockCredentialSourceBuilder {
    #[must_use]
    pub fn fail_with(mut self, error: BrokerError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Record calls into a log shared with other mocks.
    #[must_use]
    pub fn call_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    #[must_use]
    pub fn build(self) -> MockCredentialSource {
        MockCredentialSource {
            failure: self.failure,
            requests: Mutex::new(Vec::new()),
            log: self.log.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    #[tokio::test]
    async fn test_issuing_returns_test_tokens() {
        let broker = MockCredentialSource::issuing();
        let pair = broker
            .fetch_credentials(&LocalId::from("me"), "standup")
            .await
            .unwrap();

        assert_eq!(pair.messaging_token.expose_secret(), TEST_MESSAGING_TOKEN);
        assert_eq!(pair.media_token.expose_secret(), TEST_MEDIA_TOKEN);
        assert_eq!(broker.request_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_returns_error() {
        let broker = MockCredentialSource::failing(BrokerError::MissingToken {
            endpoint: "/rtm-token",
        });

        assert!(broker
            .fetch_credentials(&LocalId::from("me"), "standup")
            .await
            .is_err());
    }
}
