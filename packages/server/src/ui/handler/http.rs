//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use kizuna_shared::api::{
    ApiErrorBody, CreateRoomRequest, CreateRoomResponse, CreateTokenRequest, CreateTokenResponse,
};

use crate::{
    infrastructure::dto::http::{RoomDetailDto, RoomSummaryDto},
    ui::state::AppState,
    usecase::{CreateRoomCommand, GetRoomDetailError, TokenError},
};

/// Error response: status plus an [`ApiErrorBody`]
type ApiError = (StatusCode, Json<ApiErrorBody>);

fn api_error(status: StatusCode, message: impl ToString) -> ApiError {
    (
        status,
        Json(ApiErrorBody {
            error: message.to_string(),
        }),
    )
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// `createRoom`: provision a channel
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Json<CreateRoomResponse>, ApiError> {
    let command = CreateRoomCommand {
        channel_name: request.channel_name,
        is_group: request.is_group,
        booking_session_id: request.booking_session_id,
    };
    match state.create_room_usecase.execute(command).await {
        Ok(room) => Ok(Json(CreateRoomResponse {
            channel_name: Some(room.channel.name.into_string()),
            app_id: Some(room.app_id),
        })),
        Err(e) => {
            tracing::warn!("createRoom rejected: {}", e);
            Err(api_error(StatusCode::BAD_REQUEST, e))
        }
    }
}

/// `createToken`: issue a token for a provisioned channel
pub async fn create_token(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTokenRequest>,
) -> Result<Json<CreateTokenResponse>, ApiError> {
    match state
        .issue_token_usecase
        .execute(request.channel_name, request.role)
        .await
    {
        Ok(grant) => Ok(Json(CreateTokenResponse {
            token: grant.token.as_str().to_string(),
            uid: grant.uid.value(),
        })),
        Err(e @ TokenError::ChannelNotFound(_)) => {
            tracing::warn!("createToken rejected: {}", e);
            Err(api_error(StatusCode::NOT_FOUND, e))
        }
        Err(e @ TokenError::InvalidChannelName(_)) => {
            tracing::warn!("createToken rejected: {}", e);
            Err(api_error(StatusCode::BAD_REQUEST, e))
        }
    }
}

/// Get list of channels
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummaryDto>> {
    let channels = state.get_rooms_usecase.execute().await;
    Json(channels.iter().map(RoomSummaryDto::from).collect())
}

/// Get channel detail by name
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(channel_name): Path<String>,
) -> Result<Json<RoomDetailDto>, StatusCode> {
    match state.get_room_detail_usecase.execute(channel_name).await {
        Ok(channel) => Ok(Json(RoomDetailDto::from(&channel))),
        Err(GetRoomDetailError::RoomNotFound) => Err(StatusCode::NOT_FOUND),
        Err(GetRoomDetailError::InvalidChannelName(_)) => Err(StatusCode::BAD_REQUEST),
    }
}
