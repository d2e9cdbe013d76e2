//! Development backend for kizuna.
//!
//! Plays the role of the production backend and the real-time provider for
//! local development and end-to-end tests:
//!
//! - `POST /api/rooms` / `POST /api/tokens`: room provisioning and token issuance
//! - `GET /ws`: a presence-only signaling relay that forwards publish,
//!   unpublish and leave events between the members of a channel
//! - `GET /api/health`, `GET /api/rooms`, `GET /api/rooms/{channel}`: inspection

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;

pub use config::ServerConfig;
pub use ui::Server;
