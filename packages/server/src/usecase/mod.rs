//! UseCase 層
//!
//! - [`CreateRoomUseCase`]: チャンネルの払い出し（`POST /api/rooms`）
//! - [`IssueTokenUseCase`]: トークンの発行（`POST /api/tokens`）
//! - [`JoinChannelUseCase`]: シグナリングへの参加
//! - [`RelayMediaUseCase`]: publish / unpublish の中継
//! - [`LeaveChannelUseCase`]: 退出の中継
//! - [`GetRoomsUseCase`] / [`GetRoomDetailUseCase`]: 参照 API

mod create_room;
mod error;
mod get_rooms;
mod issue_token;
mod join_channel;
mod leave_channel;
mod relay_media;

use std::sync::Arc;

use kizuna_shared::api::SignalMessage;
use tokio::sync::Mutex;

pub use create_room::{CreateRoomCommand, CreateRoomUseCase, ProvisionedRoom};
pub use error::{GetRoomDetailError, JoinError, RelayError, RoomError, TokenError};
pub use get_rooms::{GetRoomDetailUseCase, GetRoomsUseCase};
pub use issue_token::{DEFAULT_TOKEN_TTL, IssueTokenUseCase};
pub use join_channel::{JoinChannelUseCase, JoinCommand};
pub use leave_channel::LeaveChannelUseCase;
pub use relay_media::RelayMediaUseCase;

/// メンバーの増減と公開状態の変更を直列化するロック
///
/// 参加時に送る既存の公開状態と、同時に起きた publish / unpublish / left の
/// 通知が入れ替わって届かないよう、中継系の UseCase で共有する。
pub type RelayLock = Arc<Mutex<()>>;

pub fn relay_lock() -> RelayLock {
    Arc::new(Mutex::new(()))
}

/// シグナリングメッセージを JSON に変換する
pub(crate) fn encode_signal(message: &SignalMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!("Failed to encode signal message {:?}: {}", message, e);
            None
        }
    }
}
