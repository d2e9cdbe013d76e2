//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use kizuna_shared::{
    api::{ROOMS_PATH, SIGNALING_PATH, TOKENS_PATH},
    time::Clock,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

use super::{
    handler::{
        create_room, create_token, get_room_detail, get_rooms, health_check, websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Development backend server
///
/// # Example
///
/// ```ignore
/// let server = Server::from_config(&ServerConfig::default(), Arc::new(SystemClock));
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Server backed by the in-memory repository
    pub fn from_config(config: &ServerConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(AppState::in_memory(config, clock))
    }

    /// Build the router with every endpoint
    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route(SIGNALING_PATH, get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route(ROOMS_PATH, get(get_rooms).post(create_room))
            .route("/api/rooms/{channel_name}", get(get_room_detail))
            .route(TOKENS_PATH, post(create_token))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }

    /// Bind to `host:port` and serve until Ctrl+C / SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        let local_addr = listener.local_addr()?;
        tracing::info!("kizuna development backend listening on {}", local_addr);
        tracing::info!("Signaling relay: ws://{}{}", local_addr, SIGNALING_PATH);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}
