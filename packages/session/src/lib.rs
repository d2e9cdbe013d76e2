//! kizuna session core.
//!
//! Connects one participant to a real-time video channel: provisions the
//! channel with the backend, obtains a scoped credential, joins the media
//! provider, publishes local microphone and camera, and keeps a live registry
//! of remote participants until the session is left.
//!
//! - `domain`: value objects, entities, the participant registry, error
//!   taxonomy and the traits of the external capabilities
//! - `usecase`: the single-purpose collaborators (room provisioning, token
//!   issuance, local media, booking hand-off)
//! - `connection`: the `ConnectionManager` state machine tying them together
//! - `infrastructure`: HTTP / WebSocket / in-memory implementations

pub mod connection;
pub mod domain;
pub mod infrastructure;
pub mod usecase;

pub use connection::{
    ConnectionConfig, ConnectionManager, ConnectionSnapshot, JoinRequest, LeaveOutcome,
    SessionEvent, TeardownReport,
};
