//! # Call Client Test Utilities
//!
//! Mock platforms and fixtures for exercising the session controller without
//! a token service, messaging network or media devices.
//!
//! ## Modules
//!
//! - `mock_broker` - Credential source that issues or fails on demand
//! - `mock_messaging` - Messaging platform with failure injection and event injection
//! - `mock_media` - Media platform with observable local and remote tracks
//! - `fixtures` - Shared call log, `TestSession` harness and event filters
//!
//! ## Usage
//!
//! ```rust,ignore
//! use call_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let mut session = TestSession::builder()
//!         .fail_media(MediaOp::Publish)
//!         .build();
//!
//!     let result = session.controller.start_session("alice", "standup").await;
//!     assert!(result.is_err());
//!     assert!(session.log.contains("messaging.logout"));
//! }
//! ```
//!
//! ## Injecting platform callbacks
//!
//! Mocks keep the `PlatformEventSink` handed to them at login/join. Emit
//! through the mock, then call `TestSession::pump` to feed the envelopes to
//! the controller:
//!
//! ```rust,ignore
//! session.media.emit_published("bob", MediaKind::Video);
//! session.pump().await;
//! ```

pub mod fixtures;
pub mod mock_broker;
pub mod mock_media;
pub mod mock_messaging;

pub use fixtures::*;
pub use mock_broker::*;
pub use mock_media::*;
pub use mock_messaging::*;
