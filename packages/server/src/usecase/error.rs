//! UseCase 層のエラー型

use kizuna_shared::api::JoinRejection;
use thiserror::Error;

use crate::domain::ValueObjectError;

/// チャンネル払い出しのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("invalid channel name: {0}")]
    InvalidChannelName(#[from] ValueObjectError),
}

/// トークン発行のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid channel name: {0}")]
    InvalidChannelName(#[from] ValueObjectError),

    #[error("channel '{0}' not found")]
    ChannelNotFound(String),
}

/// シグナリング参加のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("unknown app id '{0}'")]
    InvalidAppId(String),

    #[error("invalid channel '{0}'")]
    InvalidChannelName(String),

    #[error("token rejected")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("uid {0} is already in the channel")]
    UidConflict(u32),

    #[error("channel is full (capacity {0})")]
    CapacityExceeded(usize),
}

impl JoinError {
    /// 参加拒否のレスポンスに載せる理由
    pub fn rejection(&self) -> JoinRejection {
        match self {
            Self::InvalidAppId(_) => JoinRejection::InvalidAppId,
            Self::InvalidChannelName(_) => JoinRejection::InvalidChannelName,
            Self::InvalidToken => JoinRejection::InvalidToken,
            Self::TokenExpired => JoinRejection::TokenExpired,
            Self::UidConflict(_) => JoinRejection::UidConflict,
            Self::CapacityExceeded(_) => JoinRejection::CapacityExceeded,
        }
    }
}

/// publish / unpublish / 退出の中継エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("'{0}' is not a member of the channel")]
    NotAMember(String),

    #[error("'{0}' joined with a subscriber token and cannot publish")]
    NotPermitted(String),
}

/// チャンネル詳細取得のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetRoomDetailError {
    #[error("invalid channel name: {0}")]
    InvalidChannelName(#[from] ValueObjectError),

    #[error("room not found")]
    RoomNotFound,
}
