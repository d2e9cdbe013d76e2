//! ドメイン層のエラー型

use thiserror::Error;

/// 値オブジェクトの検証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("channel name must not be empty")]
    ChannelNameEmpty,

    #[error("channel name is {0} bytes long (max 64)")]
    ChannelNameTooLong(usize),

    #[error("channel name contains invalid character {0:?}")]
    ChannelNameInvalidChar(char),
}

/// チャンネルのメンバー管理に関するエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("uid {0} is already in the channel")]
    UidConflict(u32),

    #[error("channel is full (capacity {0})")]
    CapacityExceeded(usize),

    #[error("uid {0} is not a member of the channel")]
    MemberNotFound(u32),
}

/// Repository のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("channel '{0}' not found")]
    ChannelNotFound(String),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// MessagePusher のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("client '{0}' not found")]
    ClientNotFound(String),

    #[error("failed to push message: {0}")]
    PushFailed(String),
}
