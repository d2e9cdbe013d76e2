//! Connection manager: the state machine that drives one logical session
//! from provisioning to teardown.

pub mod config;
pub mod events;
pub mod manager;
pub mod teardown;

pub use config::ConnectionConfig;
pub use events::{ConnectionSnapshot, SessionEvent};
pub use manager::{ConnectionManager, JoinRequest};
pub use teardown::{LeaveOutcome, TeardownReport};
