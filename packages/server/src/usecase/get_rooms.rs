//! UseCase: チャンネルの参照

use std::sync::Arc;

use crate::domain::{Channel, ChannelName, ChannelRepository};

use super::error::GetRoomDetailError;

/// チャンネル一覧取得のユースケース
pub struct GetRoomsUseCase {
    repository: Arc<dyn ChannelRepository>,
}

impl GetRoomsUseCase {
    pub fn new(repository: Arc<dyn ChannelRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self) -> Vec<Channel> {
        self.repository.list_channels().await
    }
}

/// チャンネル詳細取得のユースケース
pub struct GetRoomDetailUseCase {
    repository: Arc<dyn ChannelRepository>,
}

impl GetRoomDetailUseCase {
    pub fn new(repository: Arc<dyn ChannelRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self, channel_name: String) -> Result<Channel, GetRoomDetailError> {
        let name = ChannelName::try_from(channel_name)?;
        self.repository
            .find_channel(&name)
            .await
            .ok_or(GetRoomDetailError::RoomNotFound)
    }
}
