//! Client execution logic: assemble a connection manager, join, run the
//! interactive session and leave.

use std::{sync::Arc, time::Duration};

use kizuna_session::{
    ConnectionConfig, ConnectionManager, JoinRequest, LeaveOutcome,
    domain::{BookingSessionId, ChannelName, MediaDevices, MediaProvider, Role, SessionBackend},
    infrastructure::{
        backend::{HttpBackendConfig, HttpSessionBackend, InMemorySessionBackend},
        media::{DeviceAvailability, HeadlessSurface, VirtualMediaDevices},
        provider::{LoopbackProvider, WebSocketProvider},
    },
};
use kizuna_shared::time::{Clock, SystemClock};

use super::{
    domain::user_message_for, error::ClientError, formatter::SessionFormatter,
    session::run_session,
};

/// Prefix of generated channel names for group sessions
const GROUP_PREFIX: &str = "group";
/// Prefix of generated channel names for one-to-one sessions
const DIRECT_PREFIX: &str = "session";

/// Everything the harness needs to run one session
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub backend_url: String,
    pub signaling_url: String,
    /// Join this channel instead of generating one
    pub channel: Option<String>,
    pub user_id: String,
    pub group: bool,
    pub booking_session_id: Option<String>,
    pub role: Role,
    pub join_link_origin: String,
    /// Leave automatically after this long
    pub duration: Option<Duration>,
    pub join_timeout: Duration,
    /// Use the in-memory backend and loopback provider
    pub offline: bool,
    /// Simulate a machine without a camera
    pub no_camera: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8080".to_string(),
            signaling_url: "ws://127.0.0.1:8080/ws".to_string(),
            channel: None,
            user_id: "guest".to_string(),
            group: false,
            booking_session_id: None,
            role: Role::Publisher,
            join_link_origin: "http://localhost:3000".to_string(),
            duration: None,
            join_timeout: Duration::from_secs(15),
            offline: false,
            no_camera: false,
        }
    }
}

/// Build a connection manager for `options`.
///
/// Online mode talks HTTP to the backend and WebSocket to the signaling
/// relay; offline mode keeps everything in process.
pub fn build_manager(
    options: &ClientOptions,
    clock: Arc<dyn Clock>,
) -> Result<ConnectionManager, ClientError> {
    let (backend, provider): (Arc<dyn SessionBackend>, Arc<dyn MediaProvider>) = if options.offline
    {
        (
            Arc::new(InMemorySessionBackend::default()),
            Arc::new(LoopbackProvider::new()),
        )
    } else {
        (
            Arc::new(HttpSessionBackend::new(HttpBackendConfig::new(
                options.backend_url.clone(),
            ))?),
            Arc::new(WebSocketProvider::new(options.signaling_url.clone())),
        )
    };

    let mut devices = VirtualMediaDevices::new();
    if options.no_camera {
        devices = devices.with_camera(DeviceAvailability::Missing);
    }
    let devices: Arc<dyn MediaDevices> = Arc::new(devices);

    let config = ConnectionConfig::default().with_join_link_origin(options.join_link_origin.clone());
    Ok(ConnectionManager::new(
        backend,
        provider,
        devices,
        Arc::new(HeadlessSurface::new()),
        clock,
        config,
    ))
}

/// Build the join request, generating an ad-hoc channel name if none was given
pub fn build_request(options: &ClientOptions, clock: &dyn Clock) -> Result<JoinRequest, ClientError> {
    let channel_name = match &options.channel {
        Some(name) => ChannelName::try_from(name.as_str())?,
        None => {
            let prefix = if options.group { GROUP_PREFIX } else { DIRECT_PREFIX };
            ChannelName::ad_hoc(prefix, &options.user_id, clock.now_millis())?
        }
    };

    let mut request = JoinRequest::new(channel_name).with_role(options.role);
    if options.group {
        request = request.group();
    }
    if let Some(id) = &options.booking_session_id {
        request = request.with_booking_session(BookingSessionId::new(id.clone())?);
    }
    Ok(request)
}

/// Join, run the interactive session, and leave.
///
/// A join that does not settle within `join_timeout` is abandoned; the
/// manager moves to `Failed` and releases whatever the attempt held.
pub async fn run_client(options: ClientOptions) -> Result<LeaveOutcome, ClientError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let manager = Arc::new(build_manager(&options, clock.clone())?);
    let request = build_request(&options, clock.as_ref())?;

    tracing::info!(
        "Joining '{}' as {} ({})",
        request.channel_name,
        options.user_id,
        if options.offline { "offline" } else { "online" }
    );

    let descriptor = match tokio::time::timeout(options.join_timeout, manager.join(request)).await {
        Ok(Ok(descriptor)) => descriptor,
        Ok(Err(e)) => {
            eprintln!("{}", user_message_for(&e));
            return Err(e.into());
        }
        Err(_) => {
            eprintln!("Joining took too long. Check your connection and try again.");
            return Err(ClientError::JoinTimeout(options.join_timeout));
        }
    };

    print!(
        "{}",
        SessionFormatter::format_joined(&descriptor, manager.join_link().as_deref())
    );
    println!(
        "{}",
        SessionFormatter::format_local_media(&manager.snapshot().local_media)
    );

    let outcome = run_session(manager, descriptor.channel_name.to_string(), options.duration).await;
    print!("{}", SessionFormatter::format_left(&outcome));
    Ok(outcome)
}
