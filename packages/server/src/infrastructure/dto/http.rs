//! HTTP API のレスポンス DTO

use kizuna_shared::time::timestamp_to_rfc3339;
use serde::{Deserialize, Serialize};

use crate::domain::{Channel, Member};

/// チャンネル一覧の 1 件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummaryDto {
    pub channel_name: String,
    pub is_group: bool,
    pub members: Vec<u32>,
    pub created_at: String,
}

/// チャンネル詳細のメンバー
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDetailDto {
    pub uid: u32,
    pub joined_at: String,
    pub anonymous: bool,
    pub audio: bool,
    pub video: bool,
}

/// チャンネル詳細
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDetailDto {
    pub channel_name: String,
    pub is_group: bool,
    pub booking_session_id: Option<String>,
    pub capacity: usize,
    pub created_at: String,
    pub members: Vec<MemberDetailDto>,
}

impl From<&Channel> for RoomSummaryDto {
    fn from(channel: &Channel) -> Self {
        Self {
            channel_name: channel.name.to_string(),
            is_group: channel.is_group,
            members: channel.members().iter().map(|m| m.uid.value()).collect(),
            created_at: timestamp_to_rfc3339(channel.created_at.value()),
        }
    }
}

impl From<&Member> for MemberDetailDto {
    fn from(member: &Member) -> Self {
        Self {
            uid: member.uid.value(),
            joined_at: timestamp_to_rfc3339(member.joined_at.value()),
            anonymous: member.anonymous,
            audio: member.audio,
            video: member.video,
        }
    }
}

impl From<&Channel> for RoomDetailDto {
    fn from(channel: &Channel) -> Self {
        Self {
            channel_name: channel.name.to_string(),
            is_group: channel.is_group,
            booking_session_id: channel.booking_session_id.clone(),
            capacity: channel.capacity,
            created_at: timestamp_to_rfc3339(channel.created_at.value()),
            members: channel.members().iter().map(MemberDetailDto::from).collect(),
        }
    }
}
