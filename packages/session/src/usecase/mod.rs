//! UseCase layer of the session core.
//!
//! The components the connection manager is assembled from. Each one owns a
//! single concern and depends only on domain traits.

pub mod issue_token;
pub mod local_media;
pub mod provision_room;
pub mod session_lifecycle;

pub use issue_token::TokenIssuer;
pub use local_media::{LocalMediaController, LocalMediaState, ToggleOutcome};
pub use provision_room::RoomProvisioner;
pub use session_lifecycle::{SessionLifecycleBridge, elapsed_minutes};
