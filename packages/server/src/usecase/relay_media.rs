//! UseCase: publish / unpublish の中継
//!
//! メンバーの公開状態を更新し、変化があった場合だけ他のメンバーに
//! `published` / `unpublished` を通知します。

use std::sync::Arc;

use kizuna_shared::api::{SignalMessage, WireMediaKind};

use crate::domain::{ChannelRepository, MemberKey, MessagePusher};

use super::{RelayLock, encode_signal, error::RelayError};

pub struct RelayMediaUseCase {
    repository: Arc<dyn ChannelRepository>,
    message_pusher: Arc<dyn MessagePusher>,
    relay_lock: RelayLock,
}

impl RelayMediaUseCase {
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

    /// 公開状態の変更を中継し、変化があったかどうかを返す
    pub async fn execute(
        &self,
        key: &MemberKey,
        kind: WireMediaKind,
        published: bool,
    ) -> Result<bool, RelayError> {
        let _relay = self.relay_lock.lock().await;

        let channel = self
            .repository
            .find_channel(&key.channel)
            .await
            .ok_or_else(|| RelayError::NotAMember(key.to_string()))?;
        let member = channel
            .member(key.uid)
            .ok_or_else(|| RelayError::NotAMember(key.to_string()))?;
        if published && !member.can_publish() {
            return Err(RelayError::NotPermitted(key.to_string()));
        }

        let changed = self
            .repository
            .set_publication(&key.channel, key.uid, kind, published)
            .await
            .map_err(|_| RelayError::NotAMember(key.to_string()))?;
        if !changed {
            return Ok(false);
        }

        let uid = key.uid.value();
        let message = if published {
            SignalMessage::Published { uid, kind }
        } else {
            SignalMessage::Unpublished { uid, kind }
        };
        if let Some(json) = encode_signal(&message) {
            let targets = channel
                .other_uids(key.uid)
                .into_iter()
                .map(|uid| MemberKey::new(key.channel.clone(), uid))
                .collect();
            if let Err(e) = self.message_pusher.broadcast(targets, &json).await {
                tracing::warn!("Failed to relay {:?} from '{}': {}", message, key, e);
            }
        }
        tracing::debug!("Relayed {:?} from '{}'", message, key);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Channel, ChannelName, Member, Timestamp, Uid},
        infrastructure::{
            message_pusher::WebSocketMessagePusher, repository::InMemoryChannelRepository,
        },
        usecase::relay_lock,
    };
    use kizuna_shared::api::ApiRole;
    use tokio::sync::mpsc;

    fn key(uid: u32) -> MemberKey {
        MemberKey::new(ChannelName::try_from("room-a").unwrap(), Uid::new(uid))
    }

    struct Fixture {
        usecase: RelayMediaUseCase,
        receivers: Vec<mpsc::UnboundedReceiver<String>>,
    }

    async fn fixture(members: &[(u32, Option<ApiRole>)]) -> Fixture {
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
        for (uid, role) in members {
            repository
                .add_member(&key(*uid).channel, Member::new(Uid::new(*uid), Timestamp::new(0), *role))
                .await
                .unwrap();
            let (tx, rx) = mpsc::unbounded_channel();
            pusher.register_client(key(*uid), tx).await;
            receivers.push(rx);
        }
        Fixture {
            usecase: RelayMediaUseCase::new(repository, pusher, relay_lock()),
            receivers,
        }
    }

    #[tokio::test]
    async fn test_publish_is_relayed_to_others_only() {
        // テスト項目: publish は自分以外のメンバーに published として届く
        // given (前提条件):
        let mut fixture = fixture(&[(1, Some(ApiRole::Publisher)), (2, None), (3, None)]).await;

        // when (操作):
        let changed = fixture
            .usecase
            .execute(&key(1), WireMediaKind::Audio, true)
            .await
            .unwrap();

        // then (期待する結果):
        assert!(changed);
        let expected = r#"{"type":"published","uid":1,"kind":"audio"}"#;
        assert_eq!(fixture.receivers[1].recv().await.as_deref(), Some(expected));
        assert_eq!(fixture.receivers[2].recv().await.as_deref(), Some(expected));
        assert!(fixture.receivers[0].try_recv().is_err());
    }

    #[tokio::test]
    async fn test_repeated_publish_is_not_relayed_twice() {
        // テスト項目: 同じメディアの重複した publish は一度しか中継されない
        // given (前提条件):
        let mut fixture = fixture(&[(1, None), (2, None)]).await;
        fixture
            .usecase
            .execute(&key(1), WireMediaKind::Video, true)
            .await
            .unwrap();

        // when (操作):
        let changed = fixture
            .usecase
            .execute(&key(1), WireMediaKind::Video, true)
            .await
            .unwrap();

        // then (期待する結果):
        assert!(!changed);
        assert!(fixture.receivers[1].recv().await.is_some());
        assert!(fixture.receivers[1].try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unpublish_is_relayed() {
        // テスト項目: unpublish は unpublished として中継される
        // given (前提条件):
        let mut fixture = fixture(&[(1, None), (2, None)]).await;
        fixture
            .usecase
            .execute(&key(1), WireMediaKind::Video, true)
            .await
            .unwrap();
        fixture.receivers[1].recv().await.unwrap();

        // when (操作):
        fixture
            .usecase
            .execute(&key(1), WireMediaKind::Video, false)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(
            fixture.receivers[1].recv().await.as_deref(),
            Some(r#"{"type":"unpublished","uid":1,"kind":"video"}"#)
        );
    }

    #[tokio::test]
    async fn test_subscriber_cannot_publish() {
        // テスト項目: 視聴専用トークンで参加したメンバーの publish は拒否される
        // given (前提条件):
        let mut fixture = fixture(&[(1, Some(ApiRole::Subscriber)), (2, None)]).await;

        // when (操作):
        let result = fixture
            .usecase
            .execute(&key(1), WireMediaKind::Audio, true)
            .await;

        // then (期待する結果):
        assert_eq!(result, Err(RelayError::NotPermitted("room-a/1".to_string())));
        assert!(fixture.receivers[1].try_recv().is_err());
    }
}
