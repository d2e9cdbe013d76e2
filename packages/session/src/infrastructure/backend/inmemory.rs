//! In-memory implementation of `SessionBackend`.
//!
//! Used by the offline harness: rooms are kept in a map and tokens are
//! sequential strings. Behaves like the development server for the subset
//! the session core sees (token for an unknown channel is a 404).

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicU32, Ordering},
    },
};

use async_trait::async_trait;
use kizuna_shared::api::{
    CreateRoomRequest, CreateRoomResponse, CreateTokenRequest, CreateTokenResponse,
};

use crate::domain::{BackendError, SessionBackend};

pub const DEFAULT_APP_ID: &str = "kizuna-local";

/// `SessionBackend` that never leaves the process
#[derive(Debug)]
pub struct InMemorySessionBackend {
    app_id: String,
    rooms: Mutex<HashMap<String, bool>>,
    next_uid: AtomicU32,
}

impl Default for InMemorySessionBackend {
    fn default() -> Self {
        Self::new(DEFAULT_APP_ID)
    }
}

impl InMemorySessionBackend {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            rooms: Mutex::new(HashMap::new()),
            next_uid: AtomicU32::new(1),
        }
    }

    /// Number of registered rooms
    pub fn room_count(&self) -> usize {
        self.rooms.lock().map(|rooms| rooms.len()).unwrap_or(0)
    }
}

#[async_trait]
impl SessionBackend for InMemorySessionBackend {
    async fn create_room(
        &self,
        request: CreateRoomRequest,
    ) -> Result<CreateRoomResponse, BackendError> {
        let mut rooms = self
            .rooms
            .lock()
            .map_err(|e| BackendError::Unreachable(format!("room table poisoned: {}", e)))?;
        rooms
            .entry(request.channel_name.clone())
            .or_insert(request.is_group);
        tracing::debug!("Room registered: {}", request.channel_name);
        Ok(CreateRoomResponse {
            channel_name: Some(request.channel_name),
            app_id: Some(self.app_id.clone()),
        })
    }

    async fn create_token(
        &self,
        request: CreateTokenRequest,
    ) -> Result<CreateTokenResponse, BackendError> {
        let known = self
            .rooms
            .lock()
            .map_err(|e| BackendError::Unreachable(format!("room table poisoned: {}", e)))?
            .contains_key(&request.channel_name);
        if !known {
            return Err(BackendError::Status {
                status: 404,
                message: format!("channel {} not found", request.channel_name),
            });
        }
        let uid = self.next_uid.fetch_add(1, Ordering::SeqCst);
        Ok(CreateTokenResponse {
            token: format!("local-{}-{}", request.channel_name, uid),
            uid,
        })
    }
}
