//! MessagePusher trait 定義
//!
//! 接続中のメンバーへのメッセージ送信を抽象化します。
//! 送信チャンネルの生成は UI 層、管理と送信は Infrastructure 層が担当します。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ChannelName, MessagePushError, Uid};

/// メンバーへの送信チャンネル
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// 送信先のメンバー（チャンネル名 + uid）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub channel: ChannelName,
    pub uid: Uid,
}

impl MemberKey {
    pub fn new(channel: ChannelName, uid: Uid) -> Self {
        Self { channel, uid }
    }
}

impl std::fmt::Display for MemberKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.channel, self.uid)
    }
}

#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// メンバーの送信チャンネルを登録
    async fn register_client(&self, key: MemberKey, sender: PusherChannel);

    /// メンバーの送信チャンネルを登録解除
    async fn unregister_client(&self, key: &MemberKey);

    /// 特定のメンバーにメッセージを送信
    async fn push_to(&self, key: &MemberKey, content: &str) -> Result<(), MessagePushError>;

    /// 複数のメンバーにメッセージを送信
    ///
    /// 一部の送信失敗は許容し、ログに残すだけとする。
    async fn broadcast(&self, targets: Vec<MemberKey>, content: &str)
    -> Result<(), MessagePushError>;
}
