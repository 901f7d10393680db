//! Observability for the call client.
//!
//! Logging uses `tracing` with one target per component:
//!
//! | Target | Component |
//! |--------|-----------|
//! | `call.controller` | Session Controller |
//! | `call.actor` | Session actor loop |
//! | `call.broker` | Token Broker Client |
//! | `call.messaging` | Messaging Channel Adapter |
//! | `call.media` | Media Session Adapter |
//! | `call.registry` | Remote Participant Registry |
//!
//! Spans use `#[instrument(skip_all)]` with explicit fields. Tokens are never
//! recorded.
//!
//! # Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `call_session_starts_total` | Counter | none |
//! | `call_session_failures_total` | Counter | `phase` |
//! | `call_session_join_duration_seconds` | Histogram | none |
//! | `call_teardown_errors_total` | Counter | `step` |
//! | `call_credential_fetch_duration_seconds` | Histogram | `outcome` |
//! | `call_messages_received_total` | Counter | `kind` |
//! | `call_subscribe_failures_total` | Counter | `kind` |
//! | `call_remote_participants` | Gauge | none |
//! | `call_stale_events_total` | Counter | none |
//! | `call_events_dropped_total` | Counter | none |

pub mod metrics;

pub use self::metrics::init_metrics_recorder;
