//! Session Controller.
//!
//! [`SessionController`] is the state machine; [`SessionActor`] runs it on a
//! task and [`SessionHandle`] is the cloneable front door.

mod actor;
mod controller;
mod messages;
mod state;

pub use actor::{SessionActor, SessionHandle};
pub use controller::{SessionController, SessionParts};
pub use messages::SessionMessage;
pub use state::{Session, SessionSnapshot, SessionState, SubsystemState};
