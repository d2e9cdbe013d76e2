//! Server configuration.

use std::time::Duration;

use crate::{domain::entity::DEFAULT_CHANNEL_CAPACITY, usecase::DEFAULT_TOKEN_TTL};

/// App id the development backend answers to by default
pub const DEFAULT_APP_ID: &str = "kizuna-local";

/// Settings of the development backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// App id returned by `createRoom` and required on signaling joins
    pub app_id: String,
    /// Lifetime of issued tokens
    pub token_ttl: Duration,
    /// Accept signaling joins that carry no token
    pub allow_anonymous: bool,
    /// Maximum number of members per channel
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            token_ttl: DEFAULT_TOKEN_TTL,
            allow_anonymous: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    pub fn with_token_ttl(mut self, token_ttl: Duration) -> Self {
        self.token_ttl = token_ttl;
        self
    }

    pub fn with_allow_anonymous(mut self, allow_anonymous: bool) -> Self {
        self.allow_anonymous = allow_anonymous;
        self
    }

    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }
}
