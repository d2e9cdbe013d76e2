//! インメモリの ChannelRepository 実装
//!
//! チャンネルとトークンをプロセス内の HashMap に保持します。
//! 開発用バックエンドなので永続化はしません。

use std::collections::HashMap;

use async_trait::async_trait;
use kizuna_shared::api::WireMediaKind;
use tokio::sync::Mutex;

use crate::domain::{
    AccessToken, Channel, ChannelError, ChannelName, ChannelRepository, Member, RepositoryError,
    TokenGrant, Uid,
};

#[derive(Default)]
pub struct InMemoryChannelRepository {
    channels: Mutex<HashMap<ChannelName, Channel>>,
    grants: Mutex<HashMap<AccessToken, TokenGrant>>,
}

impl InMemoryChannelRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChannelRepository for InMemoryChannelRepository {
    async fn create_channel(&self, channel: Channel) -> (Channel, bool) {
        let mut channels = self.channels.lock().await;
        if let Some(existing) = channels.get(&channel.name) {
            return (existing.clone(), false);
        }
        channels.insert(channel.name.clone(), channel.clone());
        (channel, true)
    }

    async fn find_channel(&self, name: &ChannelName) -> Option<Channel> {
        self.channels.lock().await.get(name).cloned()
    }

    async fn list_channels(&self) -> Vec<Channel> {
        let channels = self.channels.lock().await;
        let mut list: Vec<Channel> = channels.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    async fn add_member(&self, name: &ChannelName, member: Member) -> Result<(), RepositoryError> {
        let mut channels = self.channels.lock().await;
        let channel = channels
            .get_mut(name)
            .ok_or_else(|| RepositoryError::ChannelNotFound(name.to_string()))?;
        channel.add_member(member)?;
        Ok(())
    }

    async fn remove_member(&self, name: &ChannelName, uid: Uid) -> Result<Member, RepositoryError> {
        let mut channels = self.channels.lock().await;
        let channel = channels
            .get_mut(name)
            .ok_or_else(|| RepositoryError::ChannelNotFound(name.to_string()))?;
        Ok(channel.remove_member(uid)?)
    }

    async fn set_publication(
        &self,
        name: &ChannelName,
        uid: Uid,
        kind: WireMediaKind,
        published: bool,
    ) -> Result<bool, RepositoryError> {
        let mut channels = self.channels.lock().await;
        let channel = channels
            .get_mut(name)
            .ok_or_else(|| RepositoryError::ChannelNotFound(name.to_string()))?;
        let member = channel
            .member_mut(uid)
            .ok_or(ChannelError::MemberNotFound(uid.value()))?;
        Ok(member.set_publication(kind, published))
    }

    async fn save_grant(&self, grant: TokenGrant) {
        self.grants.lock().await.insert(grant.token.clone(), grant);
    }

    async fn find_grant(&self, token: &AccessToken) -> Option<TokenGrant> {
        self.grants.lock().await.get(token).cloned()
    }
}
