//! エンティティ
//!
//! - [`Channel`]: 払い出されたチャンネルと、その時点で接続中のメンバー
//! - [`Member`]: チャンネルに接続中の 1 メンバーと公開中のメディア
//! - [`TokenGrant`]: 発行済みトークンとその有効範囲

use kizuna_shared::api::{ApiRole, WireMediaKind};
use serde::Serialize;

use super::{
    error::ChannelError,
    value_object::{AccessToken, ChannelName, Timestamp, Uid},
};

/// チャンネルの既定の定員
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// チャンネルに接続中のメンバー
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub uid: Uid,
    pub joined_at: Timestamp,
    /// トークン無しで参加したかどうか
    pub anonymous: bool,
    /// トークンの権限（匿名参加の場合は公開も許可される）
    pub role: Option<ApiRole>,
    pub audio: bool,
    pub video: bool,
}

impl Member {
    pub fn new(uid: Uid, joined_at: Timestamp, role: Option<ApiRole>) -> Self {
        Self {
            uid,
            joined_at,
            anonymous: role.is_none(),
            role,
            audio: false,
            video: false,
        }
    }

    /// メディアを公開できるかどうか
    pub fn can_publish(&self) -> bool {
        !matches!(self.role, Some(ApiRole::Subscriber))
    }

    pub fn publishes(&self, kind: WireMediaKind) -> bool {
        match kind {
            WireMediaKind::Audio => self.audio,
            WireMediaKind::Video => self.video,
        }
    }

    /// 公開状態を更新し、変化があったかどうかを返す
    pub fn set_publication(&mut self, kind: WireMediaKind, published: bool) -> bool {
        let flag = match kind {
            WireMediaKind::Audio => &mut self.audio,
            WireMediaKind::Video => &mut self.video,
        };
        let changed = *flag != published;
        *flag = published;
        changed
    }

    /// 公開中のメディア（音声・映像の順）
    pub fn publications(&self) -> Vec<WireMediaKind> {
        [WireMediaKind::Audio, WireMediaKind::Video]
            .into_iter()
            .filter(|kind| self.publishes(*kind))
            .collect()
    }
}

/// 払い出されたチャンネル
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub name: ChannelName,
    pub is_group: bool,
    pub booking_session_id: Option<String>,
    pub created_at: Timestamp,
    pub capacity: usize,
    members: Vec<Member>,
}

impl Channel {
    pub fn new(
        name: ChannelName,
        is_group: bool,
        booking_session_id: Option<String>,
        created_at: Timestamp,
    ) -> Self {
        Self::with_capacity(
            name,
            is_group,
            booking_session_id,
            created_at,
            DEFAULT_CHANNEL_CAPACITY,
        )
    }

    pub fn with_capacity(
        name: ChannelName,
        is_group: bool,
        booking_session_id: Option<String>,
        created_at: Timestamp,
        capacity: usize,
    ) -> Self {
        Self {
            name,
            is_group,
            booking_session_id,
            created_at,
            capacity,
            members: Vec::new(),
        }
    }

    /// メンバーを追加する
    ///
    /// 同じ uid のメンバーが既にいる場合、または定員に達している場合はエラー。
    pub fn add_member(&mut self, member: Member) -> Result<(), ChannelError> {
        if self.member(member.uid).is_some() {
            return Err(ChannelError::UidConflict(member.uid.value()));
        }
        if self.members.len() >= self.capacity {
            return Err(ChannelError::CapacityExceeded(self.capacity));
        }
        self.members.push(member);
        Ok(())
    }

    pub fn remove_member(&mut self, uid: Uid) -> Result<Member, ChannelError> {
        let index = self
            .members
            .iter()
            .position(|m| m.uid == uid)
            .ok_or(ChannelError::MemberNotFound(uid.value()))?;
        Ok(self.members.remove(index))
    }

    pub fn member(&self, uid: Uid) -> Option<&Member> {
        self.members.iter().find(|m| m.uid == uid)
    }

    pub fn member_mut(&mut self, uid: Uid) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.uid == uid)
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// `uid` 以外のメンバーの uid
    pub fn other_uids(&self, uid: Uid) -> Vec<Uid> {
        self.members
            .iter()
            .filter(|m| m.uid != uid)
            .map(|m| m.uid)
            .collect()
    }

    /// `uid` 以外のメンバーが公開中のメディア一覧
    pub fn publications_except(&self, uid: Uid) -> Vec<(Uid, WireMediaKind)> {
        self.members
            .iter()
            .filter(|m| m.uid != uid)
            .flat_map(|m| m.publications().into_iter().map(move |kind| (m.uid, kind)))
            .collect()
    }
}

/// 発行済みトークン
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub token: AccessToken,
    pub channel: ChannelName,
    pub uid: Uid,
    pub role: ApiRole,
    pub expires_at: Timestamp,
}

impl TokenGrant {
    /// このトークンが `channel` の `uid` 向けに発行されたものか
    pub fn is_scoped_to(&self, channel: &ChannelName, uid: Uid) -> bool {
        &self.channel == channel && self.uid == uid
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}
