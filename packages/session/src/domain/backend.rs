//! Backend trait definition.
//!
//! The session core asks a trusted backend to register channels and to issue
//! short-lived credentials. Concrete implementations live in the
//! infrastructure layer (HTTP, in-memory).

use async_trait::async_trait;
use kizuna_shared::api::{
    CreateRoomRequest, CreateRoomResponse, CreateTokenRequest, CreateTokenResponse,
};

use super::error::BackendError;

/// Trusted backend collaborator (`createRoom` / `createToken`)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Register a channel so capacity and quotas can be tracked server-side
    async fn create_room(
        &self,
        request: CreateRoomRequest,
    ) -> Result<CreateRoomResponse, BackendError>;

    /// Issue a credential scoped to one channel and one role
    async fn create_token(
        &self,
        request: CreateTokenRequest,
    ) -> Result<CreateTokenResponse, BackendError>;
}
