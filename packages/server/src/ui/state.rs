//! Shared application state.

use std::sync::Arc;

use kizuna_shared::time::Clock;

use crate::{
    config::ServerConfig,
    domain::{ChannelRepository, MessagePusher},
    infrastructure::{message_pusher::WebSocketMessagePusher, repository::InMemoryChannelRepository},
    usecase::{
        CreateRoomUseCase, GetRoomDetailUseCase, GetRoomsUseCase, IssueTokenUseCase,
        JoinChannelUseCase, LeaveChannelUseCase, RelayMediaUseCase, relay_lock,
    },
};

/// Shared application state
pub struct AppState {
    /// CreateRoomUseCase（チャンネル払い出しのユースケース）
    pub create_room_usecase: Arc<CreateRoomUseCase>,
    /// IssueTokenUseCase（トークン発行のユースケース）
    pub issue_token_usecase: Arc<IssueTokenUseCase>,
    /// JoinChannelUseCase（シグナリング参加のユースケース）
    pub join_channel_usecase: Arc<JoinChannelUseCase>,
    /// RelayMediaUseCase（publish / unpublish 中継のユースケース）
    pub relay_media_usecase: Arc<RelayMediaUseCase>,
    /// LeaveChannelUseCase（退出中継のユースケース）
    pub leave_channel_usecase: Arc<LeaveChannelUseCase>,
    /// GetRoomsUseCase（チャンネル一覧取得のユースケース）
    pub get_rooms_usecase: Arc<GetRoomsUseCase>,
    /// GetRoomDetailUseCase（チャンネル詳細取得のユースケース）
    pub get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
}

impl AppState {
    /// Wire every usecase against the given repository and pusher
    pub fn new(
        config: &ServerConfig,
        repository: Arc<dyn ChannelRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let relay = relay_lock();
        Self {
            create_room_usecase: Arc::new(CreateRoomUseCase::new(
                repository.clone(),
                clock.clone(),
                config.app_id.clone(),
                config.channel_capacity,
            )),
            issue_token_usecase: Arc::new(IssueTokenUseCase::new(
                repository.clone(),
                clock.clone(),
                config.token_ttl,
            )),
            join_channel_usecase: Arc::new(JoinChannelUseCase::new(
                repository.clone(),
                message_pusher.clone(),
                clock,
                relay.clone(),
                config.app_id.clone(),
                config.allow_anonymous,
            )),
            relay_media_usecase: Arc::new(RelayMediaUseCase::new(
                repository.clone(),
                message_pusher.clone(),
                relay.clone(),
            )),
            leave_channel_usecase: Arc::new(LeaveChannelUseCase::new(
                repository.clone(),
                message_pusher,
                relay,
            )),
            get_rooms_usecase: Arc::new(GetRoomsUseCase::new(repository.clone())),
            get_room_detail_usecase: Arc::new(GetRoomDetailUseCase::new(repository)),
        }
    }

    /// In-memory repository and WebSocket pusher
    pub fn in_memory(config: &ServerConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryChannelRepository::new()),
            Arc::new(WebSocketMessagePusher::new()),
            clock,
        )
    }
}
