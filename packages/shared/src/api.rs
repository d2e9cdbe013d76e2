//! Wire types exchanged between the session core and the kizuna backend.
//!
//! - HTTP: `createRoom` and `createToken` request/response bodies
//! - WebSocket: signaling messages relayed between channel members
//! - Rejection reasons carried in the body of a refused signaling upgrade

use serde::{Deserialize, Serialize};

/// Path of the room provisioning endpoint
pub const ROOMS_PATH: &str = "/api/rooms";
/// Path of the token issuance endpoint
pub const TOKENS_PATH: &str = "/api/tokens";
/// Path of the signaling relay endpoint
pub const SIGNALING_PATH: &str = "/ws";

/// Request body of `createRoom`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub channel_name: String,
    pub is_group: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_session_id: Option<String>,
}

/// Response body of `createRoom`
///
/// Both fields are optional on the wire so that an incomplete descriptor can
/// be detected by the caller instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    #[serde(default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
}

/// Token scope on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiRole {
    Publisher,
    Subscriber,
}

/// Request body of `createToken`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTokenRequest {
    pub channel_name: String,
    pub role: ApiRole,
}

/// Response body of `createToken`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTokenResponse {
    pub token: String,
    pub uid: u32,
}

/// Error body returned by the backend on non-2xx responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

/// Media kind on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireMediaKind {
    Audio,
    Video,
}

/// Query parameters of the signaling upgrade request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingQuery {
    pub app_id: String,
    pub channel: String,
    pub uid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Messages relayed over the signaling WebSocket.
///
/// `Publish`/`Unpublish` travel client → relay; `Published`, `Unpublished`
/// and `Left` travel relay → client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalMessage {
    Publish { kind: WireMediaKind },
    Unpublish { kind: WireMediaKind },
    Published { uid: u32, kind: WireMediaKind },
    Unpublished { uid: u32, kind: WireMediaKind },
    Left { uid: u32 },
}

/// Reasons a signaling upgrade can be refused with.
///
/// Sent as the plain-text body of the refusal response; the HTTP status is
/// given by [`JoinRejection::status_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejection {
    InvalidAppId,
    InvalidChannelName,
    InvalidToken,
    TokenExpired,
    UidConflict,
    CapacityExceeded,
}

impl JoinRejection {
    /// Machine-readable reason code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidAppId => "invalid_app_id",
            Self::InvalidChannelName => "invalid_channel_name",
            Self::InvalidToken => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::UidConflict => "uid_conflict",
            Self::CapacityExceeded => "capacity_exceeded",
        }
    }

    /// HTTP status the relay answers the upgrade request with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidAppId => 404,
            Self::InvalidChannelName => 400,
            Self::InvalidToken | Self::TokenExpired => 401,
            Self::UidConflict => 409,
            Self::CapacityExceeded => 503,
        }
    }

    /// Parse a reason code back into a rejection
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "invalid_app_id" => Some(Self::InvalidAppId),
            "invalid_channel_name" => Some(Self::InvalidChannelName),
            "invalid_token" => Some(Self::InvalidToken),
            "token_expired" => Some(Self::TokenExpired),
            "uid_conflict" => Some(Self::UidConflict),
            "capacity_exceeded" => Some(Self::CapacityExceeded),
            _ => None,
        }
    }
}
