//! Value objects of the session domain.

use std::fmt;

use kizuna_shared::api::{ApiRole, WireMediaKind};

use super::error::ValueObjectError;

/// Maximum length of a channel name in bytes
pub const CHANNEL_NAME_MAX_LEN: usize = 64;

/// Name of a real-time channel.
///
/// Non-empty, at most [`CHANNEL_NAME_MAX_LEN`] bytes, ASCII letters, digits
/// and `-_.:` only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelName(String);

impl ChannelName {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.is_empty() {
            return Err(ValueObjectError::ChannelNameEmpty);
        }
        if value.len() > CHANNEL_NAME_MAX_LEN {
            return Err(ValueObjectError::ChannelNameTooLong(value.len()));
        }
        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')))
        {
            return Err(ValueObjectError::ChannelNameInvalidChar(c));
        }
        Ok(Self(value))
    }

    /// Derive a channel name for an ad-hoc session.
    ///
    /// The result has the form `<prefix>-<user_id>-<timestamp_millis>`, which is
    /// unique per user as long as the same user does not start two sessions in
    /// the same millisecond.
    pub fn ad_hoc(
        prefix: &str,
        user_id: &str,
        timestamp_millis: i64,
    ) -> Result<Self, ValueObjectError> {
        Self::new(format!("{}-{}-{}", prefix, user_id, timestamp_millis))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for ChannelName {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ChannelName {
    type Error = ValueObjectError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a pre-booked session in the surrounding application
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookingSessionId(String);

impl BookingSessionId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValueObjectError::BookingSessionIdEmpty);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BookingSessionId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for BookingSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-assigned numeric participant id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(u32);

impl ParticipantId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ParticipantId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token scope: whether the holder may send media or only receive it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    Publisher,
    Subscriber,
}

impl Role {
    /// Whether local media is published under this role
    pub fn publishes(&self) -> bool {
        matches!(self, Self::Publisher)
    }
}

impl From<Role> for ApiRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Publisher => ApiRole::Publisher,
            Role::Subscriber => ApiRole::Subscriber,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publisher => f.write_str("publisher"),
            Self::Subscriber => f.write_str("subscriber"),
        }
    }
}

/// A single kind of media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl From<WireMediaKind> for MediaKind {
    fn from(kind: WireMediaKind) -> Self {
        match kind {
            WireMediaKind::Audio => Self::Audio,
            WireMediaKind::Video => Self::Video,
        }
    }
}

impl From<MediaKind> for WireMediaKind {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Audio => Self::Audio,
            MediaKind::Video => Self::Video,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// Handle of a render target a remote video track is drawn into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoSinkHandle(u64);

impl VideoSinkHandle {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Unix timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_accepts_valid_name() {
        // テスト項目: 英数字と記号 -_.: からなるチャンネル名は受け入れられる
        // given (前提条件):
        let value = "session_42-a.b:c".to_string();

        // when (操作):
        let result = ChannelName::new(value);

        // then (期待する結果):
        assert_eq!(result.unwrap().as_str(), "session_42-a.b:c");
    }

    #[test]
    fn test_channel_name_rejects_empty() {
        // テスト項目: 空のチャンネル名はエラーになる
        // given (前提条件):
        let value = String::new();

        // when (操作):
        let result = ChannelName::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::ChannelNameEmpty));
    }

    #[test]
    fn test_channel_name_rejects_too_long() {
        // テスト項目: 64 バイトを超えるチャンネル名はエラーになる
        // given (前提条件):
        let value = "a".repeat(CHANNEL_NAME_MAX_LEN + 1);

        // when (操作):
        let result = ChannelName::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::ChannelNameTooLong(65)));
    }

    #[test]
    fn test_channel_name_rejects_whitespace() {
        // テスト項目: 空白を含むチャンネル名はエラーになる
        // given (前提条件):
        let value = "my room".to_string();

        // when (操作):
        let result = ChannelName::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::ChannelNameInvalidChar(' ')));
    }

    #[test]
    fn test_ad_hoc_channel_name_format() {
        // テスト項目: アドホックなチャンネル名がユーザー ID とタイムスタンプから導出される
        // given (前提条件):
        let user_id = "abc123";
        let timestamp = 1_700_000_000_000;

        // when (操作):
        let name = ChannelName::ad_hoc("group", user_id, timestamp).unwrap();

        // then (期待する結果):
        assert_eq!(name.as_str(), "group-abc123-1700000000000");
    }

    #[test]
    fn test_booking_session_id_is_trimmed() {
        // テスト項目: 予約セッション ID の前後の空白は取り除かれる
        // given (前提条件):
        let value = "  bk-77 ".to_string();

        // when (操作):
        let id = BookingSessionId::new(value).unwrap();

        // then (期待する結果):
        assert_eq!(id.as_str(), "bk-77");
        assert_eq!(
            BookingSessionId::new("   ".to_string()),
            Err(ValueObjectError::BookingSessionIdEmpty)
        );
    }

    #[test]
    fn test_role_publishes_only_for_publisher() {
        // テスト項目: Publisher のみがローカルメディアを送信する
        // given (前提条件) / when (操作) / then (期待する結果):
        assert!(Role::Publisher.publishes());
        assert!(!Role::Subscriber.publishes());
        assert_eq!(ApiRole::from(Role::Subscriber), ApiRole::Subscriber);
    }
}
