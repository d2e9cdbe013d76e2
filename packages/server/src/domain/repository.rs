//! Repository trait 定義
//!
//! UseCase 層が必要とするデータアクセスのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します。

use async_trait::async_trait;
use kizuna_shared::api::WireMediaKind;

use super::{
    AccessToken, Channel, ChannelName, Member, RepositoryError, TokenGrant, Uid,
};

/// チャンネルとトークンのストア
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelRepository: Send + Sync {
    /// チャンネルを登録する
    ///
    /// 同名のチャンネルが既にある場合は何も変更せず、既存のチャンネルを返す。
    /// 戻り値の bool は新規に登録したかどうか。
    async fn create_channel(&self, channel: Channel) -> (Channel, bool);

    /// チャンネルを取得
    async fn find_channel(&self, name: &ChannelName) -> Option<Channel>;

    /// 全チャンネルを名前順で取得
    async fn list_channels(&self) -> Vec<Channel>;

    /// メンバーを追加
    async fn add_member(&self, name: &ChannelName, member: Member) -> Result<(), RepositoryError>;

    /// メンバーを削除し、削除したメンバーを返す
    async fn remove_member(&self, name: &ChannelName, uid: Uid) -> Result<Member, RepositoryError>;

    /// メンバーの公開状態を更新し、変化があったかどうかを返す
    async fn set_publication(
        &self,
        name: &ChannelName,
        uid: Uid,
        kind: WireMediaKind,
        published: bool,
    ) -> Result<bool, RepositoryError>;

    /// 発行したトークンを保存
    async fn save_grant(&self, grant: TokenGrant);

    /// トークンから発行記録を取得
    async fn find_grant(&self, token: &AccessToken) -> Option<TokenGrant>;
}
