//! ドメイン層
//!
//! チャンネル・メンバー・トークンのドメインモデルと、
//! UseCase 層が依存する trait（Repository / MessagePusher）を定義します。

pub mod entity;
pub mod error;
pub mod message_pusher;
pub mod repository;
pub mod value_object;

pub use entity::{Channel, Member, TokenGrant};
pub use error::{ChannelError, MessagePushError, RepositoryError, ValueObjectError};
pub use message_pusher::{MemberKey, MessagePusher, PusherChannel};
pub use repository::ChannelRepository;
#[cfg(test)]
pub use repository::MockChannelRepository;
pub use value_object::{AccessToken, ChannelName, Timestamp, Uid};
