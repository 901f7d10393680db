//! Call Client Library
//!
//! Client-side coordination for a multi-party real-time call:
//!
//! - Acquire short-lived credentials from the token service
//! - Join a presence/messaging channel and a media channel for a room
//! - Publish local microphone and camera
//! - Track remote participants and their subscribed tracks
//! - Route chat, presence and connection updates to the presentation layer
//! - Tear everything down cleanly on leave or failure
//!
//! # Architecture
//!
//! ```text
//! SessionHandle (cloneable, any task)
//! └── SessionActor (one task per session object)
//!     └── SessionController (state machine)
//!         ├── CredentialSource     (TokenBrokerClient over HTTP)
//!         ├── MessagingChannel  -> MessagingPlatform binding
//!         ├── MediaSession      -> MediaPlatform binding
//!         ├── RemoteParticipantRegistry
//!         └── PresenceRoster
//! ```
//!
//! Platform bindings push callbacks into a generation-stamped
//! `PlatformEventSink`; the actor feeds them to the controller one at a
//! time. The controller reports to the presentation layer only through
//! `SessionEvent`s.
//!
//! # Modules
//!
//! - [`broker`] - Token service client
//! - [`config`] - Configuration from environment
//! - [`errors`] - Error types with client-safe messages
//! - [`events`] - Inbound platform events and outbound session events
//! - [`media`] - Media platform traits and adapter
//! - [`messaging`] - Messaging platform traits, adapter and classification
//! - [`observability`] - Tracing targets and metrics
//! - [`registry`] - Remote participant registry
//! - [`session`] - Session controller, actor and handle

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod broker;
pub mod config;
pub mod errors;
pub mod events;
pub mod media;
pub mod messaging;
pub mod observability;
pub mod registry;
pub mod session;
