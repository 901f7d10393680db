//! Secret types for protecting credentials from accidental logging.
//!
//! Re-exports [`secrecy`] types. The messaging and media tokens issued by the
//! token service are bearer credentials and are always held as
//! [`SecretString`], so any `Debug` output (including `tracing` fields and
//! panics in tests) shows `[REDACTED]` instead of the token.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct ChannelLogin {
//!     identity: String,
//!     token: SecretString,
//! }
//!
//! let login = ChannelLogin {
//!     identity: "a1b2".to_string(),
//!     token: SecretString::from("rtm-token-value"),
//! };
//!
//! assert!(!format!("{login:?}").contains("rtm-token-value"));
//! assert_eq!(login.token.expose_secret(), "rtm-token-value");
//! ```
//!
//! Call `expose_secret()` only at the platform boundary, where the token is
//! handed to the messaging or media SDK.

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("media-token");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("media-token"));
    }

    #[test]
    fn test_token_response_deserializes_into_secret() {
        #[derive(Debug, Deserialize)]
        struct TokenBody {
            token: SecretString,
        }

        let body: TokenBody = serde_json::from_str(r#"{"token": "abc123"}"#).unwrap();

        assert_eq!(body.token.expose_secret(), "abc123");
        assert!(!format!("{body:?}").contains("abc123"));
    }
}
