//! `MediaProvider` implementations.

pub mod loopback;
pub mod websocket;

use kizuna_shared::api::JoinRejection;

use crate::domain::ProviderError;

pub use loopback::{LoopbackProvider, ProviderCall};
pub use websocket::WebSocketProvider;

impl From<JoinRejection> for ProviderError {
    fn from(rejection: JoinRejection) -> Self {
        match rejection {
            JoinRejection::InvalidAppId => Self::InvalidAppId,
            JoinRejection::InvalidChannelName => Self::InvalidChannelName,
            JoinRejection::InvalidToken => Self::InvalidToken,
            JoinRejection::TokenExpired => Self::TokenExpired,
            JoinRejection::UidConflict => Self::UidConflict,
            JoinRejection::CapacityExceeded => Self::CapacityExceeded,
        }
    }
}
