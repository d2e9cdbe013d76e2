//! UseCase: チャンネルの払い出し
//!
//! 同名のチャンネルが既にある場合は何も変更せずに同じ記述子を返します。
//! グループ通話では複数の参加者が同じ名前で払い出しを要求するため、
//! この冪等性が必要です。

use std::sync::Arc;

use kizuna_shared::time::Clock;

use crate::domain::{Channel, ChannelName, ChannelRepository, Timestamp};

use super::error::RoomError;

/// 払い出し要求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoomCommand {
    pub channel_name: String,
    pub is_group: bool,
    pub booking_session_id: Option<String>,
}

/// 払い出し結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedRoom {
    pub channel: Channel,
    pub app_id: String,
    /// 今回の要求で新規に登録されたかどうか
    pub created: bool,
}

pub struct CreateRoomUseCase {
    repository: Arc<dyn ChannelRepository>,
    clock: Arc<dyn Clock>,
    app_id: String,
    channel_capacity: usize,
}

impl CreateRoomUseCase {
    pub fn new(
        repository: Arc<dyn ChannelRepository>,
        clock: Arc<dyn Clock>,
        app_id: String,
        channel_capacity: usize,
    ) -> Self {
        Self {
            repository,
            clock,
            app_id,
            channel_capacity,
        }
    }

    pub async fn execute(&self, command: CreateRoomCommand) -> Result<ProvisionedRoom, RoomError> {
        let name = ChannelName::try_from(command.channel_name)?;
        let booking_session_id = command
            .booking_session_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        let channel = Channel::with_capacity(
            name,
            command.is_group,
            booking_session_id,
            Timestamp::new(self.clock.now_millis()),
            self.channel_capacity,
        );
        let (channel, created) = self.repository.create_channel(channel).await;

        if created {
            tracing::info!(
                "Channel '{}' provisioned (group: {}, booking: {:?})",
                channel.name,
                channel.is_group,
                channel.booking_session_id
            );
        } else {
            tracing::debug!("Channel '{}' already provisioned", channel.name);
        }

        Ok(ProvisionedRoom {
            channel,
            app_id: self.app_id.clone(),
            created,
        })
    }
}
