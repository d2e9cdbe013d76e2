//! HTTP implementation of `SessionBackend`.
//!
//! Talks to the kizuna backend (`POST /api/rooms`, `POST /api/tokens`) with
//! JSON bodies from `kizuna_shared::api`.

use std::time::Duration;

use async_trait::async_trait;
use kizuna_shared::api::{
    ApiErrorBody, CreateRoomRequest, CreateRoomResponse, CreateTokenRequest, CreateTokenResponse,
    ROOMS_PATH, TOKENS_PATH,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::domain::{BackendError, SessionBackend};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration of [`HttpSessionBackend`]
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL of the backend, e.g. `http://127.0.0.1:8080`
    pub base_url: String,
    /// Timeout of one request, connect included
    pub timeout: Duration,
}

impl HttpBackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8080")
    }
}

/// `SessionBackend` over HTTP
pub struct HttpSessionBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSessionBackend {
    pub fn new(config: HttpBackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(config.timeout))
            .build()
            .map_err(|e| BackendError::Unreachable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, BackendError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Sending backend request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "Backend request failed");
                BackendError::Unreachable(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<Resp>().await.map_err(|e| {
                tracing::warn!(error = %e, "Failed to parse backend response");
                BackendError::InvalidResponse(e.to_string())
            });
        }

        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) => body.error,
            Err(_) if text.is_empty() => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
            Err(_) => text,
        };
        tracing::warn!(status = %status, "Backend returned an error: {}", message);
        Err(BackendError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SessionBackend for HttpSessionBackend {
    async fn create_room(
        &self,
        request: CreateRoomRequest,
    ) -> Result<CreateRoomResponse, BackendError> {
        self.post(ROOMS_PATH, &request).await
    }

    async fn create_token(
        &self,
        request: CreateTokenRequest,
    ) -> Result<CreateTokenResponse, BackendError> {
        self.post(TOKENS_PATH, &request).await
    }
}
