//! WebSocket を使った MessagePusher 実装
//!
//! WebSocket 接続の受付と送信チャンネルの生成は UI 層
//! （`ui/handler/websocket.rs`）で行い、この実装は受け取った
//! `UnboundedSender` を管理してメッセージ送信に使用します。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{MemberKey, MessagePushError, MessagePusher, PusherChannel};

#[derive(Default)]
pub struct WebSocketMessagePusher {
    /// 接続中のメンバーの送信チャンネル
    clients: Mutex<HashMap<MemberKey, PusherChannel>>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登録中のメンバー数
    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_client(&self, key: MemberKey, sender: PusherChannel) {
        tracing::debug!("Member '{}' registered to MessagePusher", key);
        self.clients.lock().await.insert(key, sender);
    }

    async fn unregister_client(&self, key: &MemberKey) {
        self.clients.lock().await.remove(key);
        tracing::debug!("Member '{}' unregistered from MessagePusher", key);
    }

    async fn push_to(&self, key: &MemberKey, content: &str) -> Result<(), MessagePushError> {
        let clients = self.clients.lock().await;
        let sender = clients
            .get(key)
            .ok_or_else(|| MessagePushError::ClientNotFound(key.to_string()))?;
        sender
            .send(content.to_string())
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
        tracing::debug!("Pushed message to member '{}'", key);
        Ok(())
    }

    async fn broadcast(
        &self,
        targets: Vec<MemberKey>,
        content: &str,
    ) -> Result<(), MessagePushError> {
        let clients = self.clients.lock().await;

        for target in targets {
            match clients.get(&target) {
                Some(sender) => {
                    // ブロードキャストでは一部の送信失敗を許容
                    if let Err(e) = sender.send(content.to_string()) {
                        tracing::warn!("Failed to push message to member '{}': {}", target, e);
                    }
                }
                None => {
                    tracing::warn!("Member '{}' not found during broadcast, skipping", target);
                }
            }
        }

        Ok(())
    }
}
