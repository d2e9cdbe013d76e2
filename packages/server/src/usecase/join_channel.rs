//! UseCase: シグナリングへの参加
//!
//! 参加要求を検証し、メンバーとして登録します。
//!
//! 検証の順序:
//! 1. app_id が一致するか
//! 2. チャンネル名が正しいか
//! 3. トークンが有効か（無い場合は匿名参加が許可されているか）
//! 4. 同じ uid のメンバーがいないか、定員に空きがあるか
//!
//! 参加が成立すると、他のメンバーが既に公開しているメディアを
//! `published` メッセージとして新しいメンバーに送ります。

use std::sync::Arc;

use kizuna_shared::{
    api::{ApiRole, SignalMessage, SignalingQuery},
    time::Clock,
};

use crate::domain::{
    AccessToken, ChannelError, ChannelName, ChannelRepository, Member, MemberKey, MessagePusher,
    PusherChannel, RepositoryError, Timestamp, Uid,
};

use super::{RelayLock, encode_signal, error::JoinError};

/// 参加要求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCommand {
    pub app_id: String,
    pub channel: String,
    pub uid: u32,
    pub token: Option<String>,
}

impl From<SignalingQuery> for JoinCommand {
    fn from(query: SignalingQuery) -> Self {
        Self {
            app_id: query.app_id,
            channel: query.channel,
            uid: query.uid,
            token: query.token,
        }
    }
}

pub struct JoinChannelUseCase {
    repository: Arc<dyn ChannelRepository>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
    relay_lock: RelayLock,
    app_id: String,
    allow_anonymous: bool,
}

impl JoinChannelUseCase {
    pub fn new(
        repository: Arc<dyn ChannelRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
        relay_lock: RelayLock,
        app_id: String,
        allow_anonymous: bool,
    ) -> Self {
        Self {
            repository,
            message_pusher,
            clock,
            relay_lock,
            app_id,
            allow_anonymous,
        }
    }

    /// 参加を実行
    ///
    /// # Returns
    ///
    /// * `Ok(MemberKey)` - 登録されたメンバー
    /// * `Err(JoinError)` - 参加拒否（理由は [`JoinError::rejection`] で取得）
    pub async fn execute(
        &self,
        command: JoinCommand,
        sender: PusherChannel,
    ) -> Result<MemberKey, JoinError> {
        if command.app_id != self.app_id {
            return Err(JoinError::InvalidAppId(command.app_id));
        }
        let channel = ChannelName::try_from(command.channel.as_str())
            .map_err(|_| JoinError::InvalidChannelName(command.channel.clone()))?;
        let uid = Uid::new(command.uid);
        let role = self.authorize(&channel, uid, command.token.as_deref()).await?;

        let _relay = self.relay_lock.lock().await;

        let member = Member::new(uid, Timestamp::new(self.clock.now_millis()), role);
        self.repository
            .add_member(&channel, member)
            .await
            .map_err(|e| match e {
                RepositoryError::Channel(ChannelError::UidConflict(uid)) => {
                    JoinError::UidConflict(uid)
                }
                RepositoryError::Channel(ChannelError::CapacityExceeded(capacity)) => {
                    JoinError::CapacityExceeded(capacity)
                }
                RepositoryError::ChannelNotFound(_)
                | RepositoryError::Channel(ChannelError::MemberNotFound(_)) => {
                    JoinError::InvalidChannelName(channel.to_string())
                }
            })?;

        let key = MemberKey::new(channel, uid);
        self.message_pusher
            .register_client(key.clone(), sender)
            .await;
        self.send_existing_publications(&key).await;

        tracing::info!(
            "Member '{}' joined ({})",
            key,
            if role.is_some() { "token" } else { "anonymous" }
        );
        Ok(key)
    }

    async fn authorize(
        &self,
        channel: &ChannelName,
        uid: Uid,
        token: Option<&str>,
    ) -> Result<Option<ApiRole>, JoinError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            if self.allow_anonymous {
                return Ok(None);
            }
            tracing::warn!("Anonymous join to '{}' refused", channel);
            return Err(JoinError::InvalidToken);
        };

        let grant = self
            .repository
            .find_grant(&AccessToken::new(token.to_string()))
            .await
            .ok_or(JoinError::InvalidToken)?;
        if !grant.is_scoped_to(channel, uid) {
            tracing::warn!("Token for '{}/{}' presented as '{}/{}'", grant.channel, grant.uid, channel, uid);
            return Err(JoinError::InvalidToken);
        }
        if grant.is_expired(Timestamp::new(self.clock.now_millis())) {
            return Err(JoinError::TokenExpired);
        }
        Ok(Some(grant.role))
    }

    async fn send_existing_publications(&self, key: &MemberKey) {
        let Some(channel) = self.repository.find_channel(&key.channel).await else {
            return;
        };
        for (uid, kind) in channel.publications_except(key.uid) {
            let message = SignalMessage::Published {
                uid: uid.value(),
                kind,
            };
            let Some(json) = encode_signal(&message) else {
                continue;
            };
            if let Err(e) = self.message_pusher.push_to(key, &json).await {
                tracing::warn!("Failed to send existing publication to '{}': {}", key, e);
            }
        }
    }
}
