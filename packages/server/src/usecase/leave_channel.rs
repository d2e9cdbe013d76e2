//! UseCase: 退出の中継
//!
//! WebSocket が閉じたメンバーを登録解除し、残りのメンバーに
//! `left` を通知します。

use std::sync::Arc;

use kizuna_shared::api::SignalMessage;

use crate::domain::{ChannelRepository, MemberKey, MessagePusher, Uid};

use super::{RelayLock, encode_signal, error::RelayError};

pub struct LeaveChannelUseCase {
    repository: Arc<dyn ChannelRepository>,
    message_pusher: Arc<dyn MessagePusher>,
    relay_lock: RelayLock,
}

impl LeaveChannelUseCase {
    pub fn new(
        repository: Arc<dyn ChannelRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        relay_lock: RelayLock,
    ) -> Self {
        Self {
            repository,
            message_pusher,
            relay_lock,
        }
    }

    /// 退出を実行し、通知したメンバーの uid を返す
    pub async fn execute(&self, key: &MemberKey) -> Result<Vec<Uid>, RelayError> {
        let _relay = self.relay_lock.lock().await;

        self.message_pusher.unregister_client(key).await;
        self.repository
            .remove_member(&key.channel, key.uid)
            .await
            .map_err(|_| RelayError::NotAMember(key.to_string()))?;

        let remaining = match self.repository.find_channel(&key.channel).await {
            Some(channel) => channel.other_uids(key.uid),
            None => Vec::new(),
        };
        if let Some(json) = encode_signal(&SignalMessage::Left { uid: key.uid.value() }) {
            let targets = remaining
                .iter()
                .map(|uid| MemberKey::new(key.channel.clone(), *uid))
                .collect();
            if let Err(e) = self.message_pusher.broadcast(targets, &json).await {
                tracing::warn!("Failed to broadcast left for '{}': {}", key, e);
            }
        }

        tracing::info!("Member '{}' left, notified {} member(s)", key, remaining.len());
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Channel, ChannelName, Member, Timestamp},
        infrastructure::{
            message_pusher::WebSocketMessagePusher, repository::InMemoryChannelRepository,
        },
        usecase::relay_lock,
    };
    use tokio::sync::mpsc;

    fn key(uid: u32) -> MemberKey {
        MemberKey::new(ChannelName::try_from("room-a").unwrap(), Uid::new(uid))
    }

    #[tokio::test]
    async fn test_leave_notifies_remaining_members() {
        // テスト項目: 退出したメンバーの left が残りのメンバーだけに届く
        // given (前提条件):
        let repository = Arc::new(InMemoryChannelRepository::new());
        let pusher = Arc::new(WebSocketMessagePusher::new());
        repository
            .create_channel(Channel::new(
                ChannelName::try_from("room-a").unwrap(),
                true,
                None,
                Timestamp::new(0),
            ))
            .await;
        let mut receivers = Vec::new();
        for uid in [1, 2] {
            repository
                .add_member(&key(uid).channel, Member::new(Uid::new(uid), Timestamp::new(0), None))
                .await
                .unwrap();
            let (tx, rx) = mpsc::unbounded_channel();
            pusher.register_client(key(uid), tx).await;
            receivers.push(rx);
        }
        let usecase = LeaveChannelUseCase::new(repository.clone(), pusher.clone(), relay_lock());

        // when (操作):
        let notified = usecase.execute(&key(1)).await.unwrap();

        // then (期待する結果):
        assert_eq!(notified, vec![Uid::new(2)]);
        assert_eq!(
            receivers[1].recv().await.as_deref(),
            Some(r#"{"type":"left","uid":1}"#)
        );
        assert!(receivers[0].try_recv().is_err());
        assert_eq!(pusher.client_count().await, 1);
        let channel = repository.find_channel(&key(1).channel).await.unwrap();
        assert!(channel.member(Uid::new(1)).is_none());
    }

    #[tokio::test]
    async fn test_leave_of_unknown_member_fails() {
        // テスト項目: 登録されていないメンバーの退出はエラーになる
        // given (前提条件):
        let usecase = LeaveChannelUseCase::new(
            Arc::new(InMemoryChannelRepository::new()),
            Arc::new(WebSocketMessagePusher::new()),
            relay_lock(),
        );

        // when (操作):
        let result = usecase.execute(&key(9)).await;

        // then (期待する結果):
        assert_eq!(result, Err(RelayError::NotAMember("room-a/9".to_string())));
    }
}
