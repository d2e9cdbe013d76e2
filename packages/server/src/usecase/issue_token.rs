//! UseCase: トークンの発行
//!
//! 払い出し済みのチャンネルに対して、uid と権限に紐付いた不透明な
//! トークンを発行します。トークンは設定された TTL が過ぎると失効します。

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use kizuna_shared::{api::ApiRole, time::Clock};

use crate::domain::{AccessToken, ChannelName, ChannelRepository, Timestamp, TokenGrant, Uid};

use super::error::TokenError;

/// トークンの既定の有効期間
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

pub struct IssueTokenUseCase {
    repository: Arc<dyn ChannelRepository>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    /// 次に払い出す uid
    next_uid: AtomicU32,
}

impl IssueTokenUseCase {
    pub fn new(repository: Arc<dyn ChannelRepository>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            repository,
            clock,
            ttl,
            next_uid: AtomicU32::new(1),
        }
    }

    pub async fn execute(&self, channel_name: String, role: ApiRole) -> Result<TokenGrant, TokenError> {
        let channel = ChannelName::try_from(channel_name)?;
        if self.repository.find_channel(&channel).await.is_none() {
            return Err(TokenError::ChannelNotFound(channel.into_string()));
        }

        let ttl_millis = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let grant = TokenGrant {
            token: AccessToken::generate(),
            channel,
            uid: Uid::new(self.next_uid.fetch_add(1, Ordering::Relaxed)),
            role,
            expires_at: Timestamp::new(self.clock.now_millis()).plus_millis(ttl_millis),
        };
        self.repository.save_grant(grant.clone()).await;

        tracing::info!(
            "Issued {:?} token for uid {} in '{}'",
            grant.role,
            grant.uid,
            grant.channel
        );
        Ok(grant)
    }
}
