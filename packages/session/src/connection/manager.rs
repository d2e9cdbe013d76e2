//! The connection state machine.
//!
//! One `ConnectionManager` drives one logical session at a time:
//! provision the channel, get a credential, join the provider (retrying once
//! without the token if the token is refused), acquire and publish local
//! media, then track remote participants until `leave()`.
//!
//! Everything a connection attempt holds is owned by the attempt itself until
//! the connection commits to `Connected`, so an abandoned or cancelled attempt
//! releases its resources wherever it stops.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use kizuna_shared::time::Clock;
use tokio::{
    sync::{Mutex as AsyncMutex, broadcast, mpsc, watch},
    task::JoinSet,
};

use super::{
    config::ConnectionConfig,
    events::{ConnectionSnapshot, SessionEvent},
    teardown::{HeldResources, LeaveOutcome},
};
use crate::{
    domain::{
        BookingSessionId, ChannelDescriptor, ChannelName, CompletionDirective, ConnectionState,
        JoinAttempt, MediaDevices, MediaKind, MediaProvider, ParticipantId, ProviderEvent,
        ProviderSession, RemoteParticipantRegistry, Role, SessionBackend, SessionError,
        SessionLinkage, VideoSurface,
    },
    usecase::{
        LocalMediaController, RoomProvisioner, SessionLifecycleBridge, ToggleOutcome, TokenIssuer,
    },
};

/// Parameters of one `join()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub channel_name: ChannelName,
    pub role: Role,
    pub is_group: bool,
    pub booking_session_id: Option<BookingSessionId>,
}

impl JoinRequest {
    /// One-to-one publisher session, not linked to a booking
    pub fn new(channel_name: ChannelName) -> Self {
        Self {
            channel_name,
            role: Role::Publisher,
            is_group: false,
            booking_session_id: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn group(mut self) -> Self {
        self.is_group = true;
        self
    }

    pub fn with_booking_session(mut self, booking_session_id: BookingSessionId) -> Self {
        self.booking_session_id = Some(booking_session_id);
        self
    }
}

#[derive(Default)]
struct Phase {
    state: ConnectionState,
    /// Bumped by every accepted `join()`; stale attempts compare against it
    generation: u64,
    leave_requested: bool,
    descriptor: Option<ChannelDescriptor>,
    local_participant_id: Option<ParticipantId>,
    linkage: Option<SessionLinkage>,
    last_outcome: Option<(u64, LeaveOutcome)>,
}

enum LeavePlan {
    Teardown(Option<SessionLinkage>),
    AwaitAttempt,
    Nothing,
}

pub struct ConnectionManager {
    provisioner: RoomProvisioner,
    issuer: TokenIssuer,
    provider: Arc<dyn MediaProvider>,
    devices: Arc<dyn MediaDevices>,
    surface: Arc<dyn VideoSurface>,
    bridge: SessionLifecycleBridge,
    config: ConnectionConfig,
    phase: Mutex<Phase>,
    state_tx: watch::Sender<ConnectionState>,
    events: broadcast::Sender<SessionEvent>,
    registry: Arc<Mutex<RemoteParticipantRegistry>>,
    media: Mutex<Option<LocalMediaController>>,
    active: AsyncMutex<Option<HeldResources>>,
}

impl ConnectionManager {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        provider: Arc<dyn MediaProvider>,
        devices: Arc<dyn MediaDevices>,
        surface: Arc<dyn VideoSurface>,
        clock: Arc<dyn Clock>,
        config: ConnectionConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            provisioner: RoomProvisioner::new(Arc::clone(&backend)),
            issuer: TokenIssuer::new(backend),
            provider,
            devices,
            surface,
            bridge: SessionLifecycleBridge::new(clock),
            config,
            phase: Mutex::new(Phase::default()),
            state_tx,
            events,
            registry: Arc::new(Mutex::new(RemoteParticipantRegistry::new())),
            media: Mutex::new(None),
            active: AsyncMutex::new(None),
        }
    }

    /// Provision, authenticate and join a channel.
    ///
    /// Rejected with `AlreadyActive` (and no backend or provider call) unless
    /// the manager is `Idle`, `Ended` or `Failed`. Local media failure does
    /// not fail the join: the connection comes up without local media and a
    /// `LocalMediaUnavailable` event is emitted.
    ///
    /// If `leave()` is called before this settles, the attempt tears down as
    /// soon as its in-flight call resolves and `Cancelled` is returned. If
    /// the returned future is dropped before it settles, the manager moves
    /// to `Failed`.
    pub async fn join(&self, request: JoinRequest) -> Result<ChannelDescriptor, SessionError> {
        let generation = self.begin_join()?;
        let mut guard = AttemptGuard {
            manager: self,
            generation,
            settled: false,
        };
        let result = self.run_join(generation, request).await;
        guard.settled = true;
        result
    }

    fn begin_join(&self) -> Result<u64, SessionError> {
        let mut phase = self.lock_phase();
        if !phase.state.accepts_join() {
            tracing::warn!("join() rejected: connection is {}", phase.state);
            return Err(SessionError::AlreadyActive(phase.state));
        }
        phase.generation += 1;
        phase.leave_requested = false;
        phase.descriptor = None;
        phase.local_participant_id = None;
        phase.linkage = None;
        self.set_state(&mut phase, ConnectionState::Provisioning);
        Ok(phase.generation)
    }

    async fn run_join(
        &self,
        generation: u64,
        request: JoinRequest,
    ) -> Result<ChannelDescriptor, SessionError> {
        let JoinRequest {
            channel_name,
            role,
            is_group,
            booking_session_id,
        } = request;

        let descriptor = match self
            .provisioner
            .provision(&channel_name, is_group, booking_session_id.as_ref())
            .await
        {
            Ok(descriptor) => descriptor,
            Err(e) => return Err(self.fail(generation, e)),
        };
        if self.leave_requested(generation) {
            return self.cancel(generation, HeldResources::default()).await;
        }

        let credential = match self.issuer.issue(&descriptor.channel_name, role).await {
            Ok(credential) => credential,
            Err(e) => return Err(self.fail(generation, e)),
        };
        if !self.advance(generation, ConnectionState::CredentialAcquired) {
            return self.cancel(generation, HeldResources::default()).await;
        }

        let mut attempt = JoinAttempt::WithToken;
        let session = loop {
            if !self.advance(generation, ConnectionState::Joining(attempt)) {
                return self.cancel(generation, HeldResources::default()).await;
            }
            let token = match attempt {
                JoinAttempt::WithToken => Some(credential.token.as_str()),
                JoinAttempt::WithoutToken => None,
            };
            match self
                .provider
                .join(
                    &descriptor.provider_app_id,
                    &descriptor.channel_name,
                    token,
                    credential.local_participant_id,
                )
                .await
            {
                Ok(session) => break session,
                Err(e) => match attempt.next_after(&e) {
                    Some(next) => {
                        tracing::warn!("Join {} rejected ({}), retrying {}", attempt, e, next);
                        attempt = next;
                    }
                    None => {
                        return Err(self.fail(
                            generation,
                            SessionError::JoinRejected { attempt, source: e },
                        ));
                    }
                },
            }
        };

        let ProviderSession { connection, events } = session;
        let mut held = HeldResources::default();
        held.connection = Some(connection);
        if self.leave_requested(generation) {
            return self.cancel(generation, held).await;
        }

        if role.publishes() {
            self.acquire_and_publish(&mut held).await;
            if self.leave_requested(generation) {
                return self.cancel(generation, held).await;
            }
        }

        let linkage = self.bridge.on_start(booking_session_id);
        self.lock_registry().clear();
        held.pump = Some(tokio::spawn(pump_events(
            events,
            Arc::clone(&self.registry),
            self.events.clone(),
            Arc::clone(&self.surface),
            self.config.sink_attach_attempts,
            self.config.sink_attach_interval,
        )));
        *self.lock_media() = held.media.take();
        *self.active.lock().await = Some(held);

        let committed = {
            let mut phase = self.lock_phase();
            if phase.generation == generation && !phase.leave_requested {
                phase.descriptor = Some(descriptor.clone());
                phase.local_participant_id = Some(credential.local_participant_id);
                phase.linkage = linkage;
                self.set_state(&mut phase, ConnectionState::Connected);
                true
            } else {
                false
            }
        };
        if !committed {
            let held = self.take_held().await;
            return self.cancel(generation, held).await;
        }

        let join_link = self.config.join_link(&descriptor.channel_name);
        tracing::info!(
            channel = %descriptor.channel_name,
            uid = %credential.local_participant_id,
            "Connected, invite link: {}",
            join_link
        );
        let _ = self.events.send(SessionEvent::Joined {
            descriptor: descriptor.clone(),
            join_link,
        });
        Ok(descriptor)
    }

    // Media is supplementary to presence: failures degrade, never abort.
    async fn acquire_and_publish(&self, held: &mut HeldResources) {
        let mut media = LocalMediaController::new(Arc::clone(&self.devices));
        match media.acquire().await {
            Ok(_) => held.media = Some(media),
            Err(e) => {
                tracing::warn!("Continuing without local media: {}", e);
                let _ = self.events.send(SessionEvent::LocalMediaUnavailable(e));
                return;
            }
        }

        let kinds = held
            .media
            .as_ref()
            .map(LocalMediaController::track_kinds)
            .unwrap_or_default();
        let Some(connection) = held.connection.as_mut() else {
            return;
        };
        match connection.publish(&kinds).await {
            Ok(()) => held.published = true,
            Err(e) => {
                tracing::warn!("Failed to publish local media, continuing without it: {}", e);
                // Part of the publish may have gone through before the failure.
                if let Err(unpublish_err) = connection.unpublish().await {
                    tracing::warn!("Failed to withdraw partial publish: {}", unpublish_err);
                    held.published = true;
                }
                if let Some(mut media) = held.media.take()
                    && let Err(errors) = media.release()
                {
                    for err in errors {
                        tracing::warn!("Failed to release unpublished media: {}", err);
                    }
                }
                let _ = self.events.send(SessionEvent::PublishFailed(e));
            }
        }
    }

    /// Leave the channel, or abandon the join in flight.
    ///
    /// From `Connected` this runs the full teardown (unpublish, release local
    /// media, leave the provider, clear participants); every step runs even if
    /// an earlier one failed, and the failures are in the returned report.
    /// Mid-join, it waits until the attempt has torn itself down. In any other
    /// state it only makes sure local media is released.
    pub async fn leave(&self) -> LeaveOutcome {
        let (generation, plan) = {
            let mut phase = self.lock_phase();
            let state = phase.state;
            let plan = match state {
                ConnectionState::Connected => {
                    self.set_state(&mut phase, ConnectionState::Leaving);
                    LeavePlan::Teardown(phase.linkage.take())
                }
                state if state.is_joining() => {
                    phase.leave_requested = true;
                    self.set_state(&mut phase, ConnectionState::Leaving);
                    LeavePlan::AwaitAttempt
                }
                ConnectionState::Leaving => LeavePlan::AwaitAttempt,
                _ => LeavePlan::Nothing,
            };
            (phase.generation, plan)
        };

        match plan {
            LeavePlan::Teardown(linkage) => {
                let held = self.take_held().await;
                let teardown = held.release(&self.registry).await;
                let directive = self.bridge.on_leave(linkage.as_ref());
                let outcome = LeaveOutcome {
                    directive,
                    teardown,
                };
                self.finish(generation, outcome.clone());
                outcome
            }
            LeavePlan::AwaitAttempt => {
                let mut state_rx = self.state_tx.subscribe();
                // The sender lives as long as `self`, so this only returns on a terminal state.
                let _ = state_rx.wait_for(ConnectionState::is_terminal).await;
                match &self.lock_phase().last_outcome {
                    Some((g, outcome)) if *g == generation => outcome.clone(),
                    _ => LeaveOutcome::default(),
                }
            }
            LeavePlan::Nothing => {
                let mut held = HeldResources::default();
                held.media = self.lock_media().take();
                LeaveOutcome {
                    directive: CompletionDirective::None,
                    teardown: held.release(&self.registry).await,
                }
            }
        }
    }

    /// Pause or resume the local microphone; only effective while connected
    pub fn set_audio_enabled(&self, enabled: bool) -> ToggleOutcome {
        self.toggle(MediaKind::Audio, enabled)
    }

    /// Pause or resume the local camera; only effective while connected
    pub fn set_video_enabled(&self, enabled: bool) -> ToggleOutcome {
        self.toggle(MediaKind::Video, enabled)
    }

    fn toggle(&self, kind: MediaKind, enabled: bool) -> ToggleOutcome {
        if self.state() != ConnectionState::Connected {
            tracing::debug!("Ignoring {} toggle outside of a connection", kind);
            return ToggleOutcome::NoEffect;
        }
        let mut media = self.lock_media();
        match (media.as_mut(), kind) {
            (Some(media), MediaKind::Audio) => media.set_audio_enabled(enabled),
            (Some(media), MediaKind::Video) => media.set_video_enabled(enabled),
            (None, _) => ToggleOutcome::NoEffect,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.lock_phase().state
    }

    /// Receiver that always holds the current state
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Invite link for the current channel, once connected
    pub fn join_link(&self) -> Option<String> {
        let phase = self.lock_phase();
        match (&phase.state, &phase.descriptor) {
            (ConnectionState::Connected, Some(descriptor)) => {
                Some(self.config.join_link(&descriptor.channel_name))
            }
            _ => None,
        }
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        let (state, channel_name, local_participant_id) = {
            let phase = self.lock_phase();
            (
                phase.state,
                phase.descriptor.as_ref().map(|d| d.channel_name.clone()),
                phase.local_participant_id,
            )
        };
        let mut participants = self.lock_registry().snapshot();
        participants.sort_by_key(|p| p.id);
        let local_media = self
            .lock_media()
            .as_ref()
            .map(LocalMediaController::status)
            .unwrap_or_default();
        ConnectionSnapshot {
            state,
            channel_name,
            local_participant_id,
            participants,
            local_media,
        }
    }

    fn set_state(&self, phase: &mut Phase, to: ConnectionState) {
        let from = phase.state;
        if from == to {
            return;
        }
        phase.state = to;
        self.state_tx.send_replace(to);
        tracing::info!("Connection state: {} -> {}", from, to);
        let _ = self.events.send(SessionEvent::StateChanged { from, to });
    }

    /// Move the current attempt forward unless it was cancelled or superseded
    fn advance(&self, generation: u64, to: ConnectionState) -> bool {
        let mut phase = self.lock_phase();
        if phase.generation != generation || phase.leave_requested {
            return false;
        }
        self.set_state(&mut phase, to);
        true
    }

    fn leave_requested(&self, generation: u64) -> bool {
        let phase = self.lock_phase();
        phase.generation != generation || phase.leave_requested
    }

    fn fail(&self, generation: u64, error: SessionError) -> SessionError {
        tracing::error!("Join failed: {}", error);
        let mut phase = self.lock_phase();
        if phase.generation == generation {
            self.set_state(&mut phase, ConnectionState::Failed);
        }
        error
    }

    async fn cancel(
        &self,
        generation: u64,
        held: HeldResources,
    ) -> Result<ChannelDescriptor, SessionError> {
        tracing::info!("Join cancelled by leave(), tearing down");
        let teardown = held.release(&self.registry).await;
        self.finish(
            generation,
            LeaveOutcome {
                directive: CompletionDirective::None,
                teardown,
            },
        );
        Err(SessionError::Cancelled)
    }

    fn finish(&self, generation: u64, outcome: LeaveOutcome) {
        {
            let mut phase = self.lock_phase();
            if phase.generation != generation {
                return;
            }
            phase.descriptor = None;
            phase.local_participant_id = None;
            phase.linkage = None;
            phase.last_outcome = Some((generation, outcome.clone()));
            self.set_state(&mut phase, ConnectionState::Ended);
        }
        let _ = self.events.send(SessionEvent::Ended {
            directive: outcome.directive,
        });
    }

    async fn take_held(&self) -> HeldResources {
        let mut held = self.active.lock().await.take().unwrap_or_default();
        held.media = self.lock_media().take();
        held
    }

    // Called from `AttemptGuard::drop`, so nothing here may await.
    fn abandon(&self, generation: u64) {
        tracing::warn!("Join abandoned before it settled, marking the connection failed");
        if let Ok(mut active) = self.active.try_lock() {
            active.take();
        }
        self.lock_media().take();
        self.lock_registry().clear();
        let mut phase = self.lock_phase();
        if phase.generation == generation && !phase.state.is_terminal() {
            phase.descriptor = None;
            phase.local_participant_id = None;
            phase.linkage = None;
            self.set_state(&mut phase, ConnectionState::Failed);
        }
    }

    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_media(&self) -> MutexGuard<'_, Option<LocalMediaController>> {
        self.media.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_registry(&self) -> MutexGuard<'_, RemoteParticipantRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks the attempt failed if the join future is dropped before it settles
struct AttemptGuard<'a> {
    manager: &'a ConnectionManager,
    generation: u64,
    settled: bool,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.manager.abandon(self.generation);
        }
    }
}

/// Apply provider events to the registry in arrival order
async fn pump_events(
    mut events: mpsc::UnboundedReceiver<ProviderEvent>,
    registry: Arc<Mutex<RemoteParticipantRegistry>>,
    notify: broadcast::Sender<SessionEvent>,
    surface: Arc<dyn VideoSurface>,
    attach_attempts: u32,
    attach_interval: Duration,
) {
    let mut attach_tasks = JoinSet::new();

    while let Some(event) = events.recv().await {
        let (change, count) = {
            let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
            let change = registry.apply(&event);
            (change, registry.len())
        };
        tracing::debug!("Provider event {:?}: {:?}", event, change);
        if change.is_change() {
            let _ = notify.send(SessionEvent::ParticipantsChanged { count });
        }

        if let ProviderEvent::Published {
            id,
            kind: MediaKind::Video,
        } = event
        {
            attach_tasks.spawn(attach_video_sink(
                id,
                Arc::clone(&registry),
                Arc::clone(&surface),
                attach_attempts,
                attach_interval,
            ));
        }
        while attach_tasks.try_join_next().is_some() {}
    }

    tracing::warn!("Provider event stream ended");
    let _ = notify.send(SessionEvent::ProviderDisconnected);
}

/// Poll the surface for a sink, giving up after `attempts` tries
async fn attach_video_sink(
    id: ParticipantId,
    registry: Arc<Mutex<RemoteParticipantRegistry>>,
    surface: Arc<dyn VideoSurface>,
    attempts: u32,
    interval: Duration,
) {
    for attempt in 0..attempts {
        if attempt > 0 {
            tokio::time::sleep(interval).await;
        }
        let mut participants = registry.lock().unwrap_or_else(PoisonError::into_inner);
        if !participants.get(id).is_some_and(|p| p.has_video) {
            tracing::debug!("Participant {} stopped publishing video before its sink was ready", id);
            return;
        }
        if let Some(sink) = surface.sink_for(id) {
            participants.attach_video_sink(id, sink);
            tracing::debug!("Video sink {:?} attached to participant {}", sink, id);
            return;
        }
    }
    tracing::warn!(
        "No video sink for participant {} after {} attempts",
        id,
        attempts
    );
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use kizuna_shared::{
        api::{CreateRoomRequest, CreateRoomResponse, CreateTokenRequest, CreateTokenResponse},
        time::ManualClock,
    };
    use tokio::sync::Semaphore;

    use super::*;
    use crate::{
        domain::{
            BackendError, MediaError, ProviderError, TeardownStep, backend::MockSessionBackend,
        },
        infrastructure::{
            backend::InMemorySessionBackend,
            media::{DeviceAvailability, HeadlessSurface, VirtualMediaDevices},
            provider::{LoopbackProvider, ProviderCall},
        },
    };

    const T0: i64 = 1_700_000_000_000;

    /// In-memory backend that counts calls and can hold provisioning
    #[derive(Default)]
    struct CountingBackend {
        inner: InMemorySessionBackend,
        room_gate: Option<Arc<Semaphore>>,
        room_calls: AtomicUsize,
        token_calls: AtomicUsize,
    }

    impl CountingBackend {
        fn gated() -> Self {
            Self {
                room_gate: Some(Arc::new(Semaphore::new(0))),
                ..Self::default()
            }
        }

        fn open_gate(&self) {
            if let Some(gate) = &self.room_gate {
                gate.add_permits(1);
            }
        }
    }

    #[async_trait]
    impl SessionBackend for CountingBackend {
        async fn create_room(
            &self,
            request: CreateRoomRequest,
        ) -> Result<CreateRoomResponse, BackendError> {
            self.room_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.room_gate {
                gate.acquire().await.unwrap().forget();
            }
            self.inner.create_room(request).await
        }

        async fn create_token(
            &self,
            request: CreateTokenRequest,
        ) -> Result<CreateTokenResponse, BackendError> {
            self.token_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.create_token(request).await
        }
    }

    struct Harness {
        manager: Arc<ConnectionManager>,
        backend: Arc<CountingBackend>,
        provider: LoopbackProvider,
        devices: VirtualMediaDevices,
        clock: Arc<ManualClock>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with(CountingBackend::default(), VirtualMediaDevices::new(), HeadlessSurface::new())
        }

        fn with(backend: CountingBackend, devices: VirtualMediaDevices, surface: HeadlessSurface) -> Self {
            let backend = Arc::new(backend);
            let provider = LoopbackProvider::new();
            let clock = Arc::new(ManualClock::new(T0));
            let config = ConnectionConfig::default()
                .with_join_link_origin("https://kizuna.example")
                .with_sink_attach(10, Duration::from_millis(5));
            let manager = Arc::new(ConnectionManager::new(
                backend.clone(),
                Arc::new(provider.clone()),
                Arc::new(devices.clone()),
                Arc::new(surface),
                clock.clone(),
                config,
            ));
            Self {
                manager,
                backend,
                provider,
                devices,
                clock,
            }
        }

        async fn wait_for_state(&self, predicate: impl Fn(&ConnectionState) -> bool) {
            let mut rx = self.manager.watch_state();
            tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| predicate(s)))
                .await
                .expect("state not reached in time")
                .unwrap();
        }
    }

    fn channel(name: &str) -> ChannelName {
        ChannelName::try_from(name).unwrap()
    }

    fn id(value: u32) -> ParticipantId {
        ParticipantId::new(value)
    }

    async fn eventually(what: &str, check: impl Fn() -> bool) {
        for _ in 0..400 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met in time: {}", what);
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_join_connects_and_publishes_local_media() {
        // テスト項目: join でプロビジョニング → トークン → 参加 → 公開まで進み Connected になる
        // given (前提条件):
        let h = Harness::new();
        let mut events = h.manager.subscribe();

        // when (操作):
        let descriptor = h
            .manager
            .join(JoinRequest::new(channel("room-a")))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(descriptor.channel_name, channel("room-a"));
        assert_eq!(h.manager.state(), ConnectionState::Connected);
        let calls = h.provider.calls();
        assert!(matches!(&calls[0], ProviderCall::Join { token: Some(_), .. }));
        assert_eq!(
            calls[1],
            ProviderCall::Publish(vec![MediaKind::Audio, MediaKind::Video])
        );
        assert!(h.devices.is_capturing(MediaKind::Audio));
        assert!(h.devices.is_capturing(MediaKind::Video));
        assert_eq!(
            h.manager.join_link().as_deref(),
            Some("https://kizuna.example/sessions?room=room-a")
        );

        let transitions: Vec<_> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::StateChanged { to, .. } => Some(to),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![
                ConnectionState::Provisioning,
                ConnectionState::CredentialAcquired,
                ConnectionState::Joining(JoinAttempt::WithToken),
                ConnectionState::Connected,
            ]
        );

        let snapshot = h.manager.snapshot();
        assert_eq!(snapshot.channel_name, Some(channel("room-a")));
        assert!(snapshot.local_participant_id.is_some());
        assert!(snapshot.local_media.audio_enabled && snapshot.local_media.video_enabled);
    }

    #[tokio::test]
    async fn test_join_while_connected_is_rejected_without_side_effects() {
        // テスト項目: Connected 中の join は拒否され、バックエンドもプロバイダも呼ばれない
        // given (前提条件):
        let h = Harness::new();
        h.manager
            .join(JoinRequest::new(channel("room-a")))
            .await
            .unwrap();
        let calls_before = h.provider.calls().len();

        // when (操作):
        let result = h.manager.join(JoinRequest::new(channel("room-b"))).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(SessionError::AlreadyActive(ConnectionState::Connected))
        );
        assert_eq!(h.backend.room_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.backend.token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.provider.calls().len(), calls_before);
        assert_eq!(h.manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_join_while_provisioning_is_rejected() {
        // テスト項目: プロビジョニング中の 2 回目の join は待たされずに拒否される
        // given (前提条件):
        let h = Harness::with(
            CountingBackend::gated(),
            VirtualMediaDevices::new(),
            HeadlessSurface::new(),
        );
        let manager = h.manager.clone();
        let first = tokio::spawn(async move { manager.join(JoinRequest::new(channel("room-a"))).await });
        h.wait_for_state(|s| *s == ConnectionState::Provisioning).await;

        // when (操作):
        let second = h.manager.join(JoinRequest::new(channel("room-a"))).await;

        // then (期待する結果):
        assert_eq!(
            second,
            Err(SessionError::AlreadyActive(ConnectionState::Provisioning))
        );
        h.backend.open_gate();
        assert!(first.await.unwrap().is_ok());
        assert_eq!(h.backend.room_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.backend.token_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_failure_never_reaches_provider() {
        // テスト項目: プロビジョニング成功後にトークン発行が失敗すると Provisioning → Failed となり、参加も公開も行われない
        // given (前提条件):
        let mut backend = MockSessionBackend::new();
        backend.expect_create_room().times(1).returning(|req| {
            Ok(CreateRoomResponse {
                channel_name: Some(req.channel_name),
                app_id: Some("app".to_string()),
            })
        });
        backend.expect_create_token().times(1).returning(|_| {
            Err(BackendError::Status {
                status: 500,
                message: "token service down".to_string(),
            })
        });
        let provider = LoopbackProvider::new();
        let devices = VirtualMediaDevices::new();
        let manager = ConnectionManager::new(
            Arc::new(backend),
            Arc::new(provider.clone()),
            Arc::new(devices.clone()),
            Arc::new(HeadlessSurface::new()),
            Arc::new(ManualClock::new(T0)),
            ConnectionConfig::default(),
        );
        let mut events = manager.subscribe();

        // when (操作):
        let result = manager.join(JoinRequest::new(channel("room-a"))).await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(SessionError::TokenIssuanceFailed(BackendError::Status { status: 500, .. }))
        ));
        assert_eq!(manager.state(), ConnectionState::Failed);
        assert!(provider.calls().is_empty());
        assert_eq!(devices.open_count(MediaKind::Audio), 0);
        let transitions: Vec<_> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::StateChanged { from, to } => Some((from, to)),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![
                (ConnectionState::Idle, ConnectionState::Provisioning),
                (ConnectionState::Provisioning, ConnectionState::Failed),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_token_is_retried_once_without_token() {
        // テスト項目: トークン不正で拒否された場合、トークン無しで 1 回だけ再試行して接続する
        // given (前提条件):
        let h = Harness::new();
        h.provider.push_join_outcome(Err(ProviderError::InvalidToken));

        // when (操作):
        let result = h.manager.join(JoinRequest::new(channel("room-a"))).await;

        // then (期待する結果):
        assert!(result.is_ok());
        let tokens = h.provider.join_tokens();
        assert_eq!(tokens.len(), 2);
        assert!(tokens[0].is_some());
        assert_eq!(tokens[1], None);
        assert_eq!(h.manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_failed_anonymous_retry_ends_in_failed() {
        // テスト項目: トークン無しの再試行も失敗すると Failed になり、それ以上再試行しない
        // given (前提条件):
        let h = Harness::new();
        h.provider.push_join_outcome(Err(ProviderError::TokenExpired));
        h.provider.push_join_outcome(Err(ProviderError::InvalidToken));

        // when (操作):
        let result = h.manager.join(JoinRequest::new(channel("room-a"))).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(SessionError::JoinRejected {
                attempt: JoinAttempt::WithoutToken,
                source: ProviderError::InvalidToken,
            })
        );
        assert_eq!(h.provider.join_tokens().len(), 2);
        assert_eq!(h.manager.state(), ConnectionState::Failed);
        assert!(!h.devices.is_open(MediaKind::Audio));
        assert!(
            !h.provider
                .calls()
                .iter()
                .any(|c| matches!(c, ProviderCall::Publish(_)))
        );
    }

    #[tokio::test]
    async fn test_non_token_rejection_is_not_retried() {
        // テスト項目: トークン以外の理由で拒否された場合は再試行しない
        // given (前提条件):
        let h = Harness::new();
        h.provider.push_join_outcome(Err(ProviderError::UidConflict));

        // when (操作):
        let result = h.manager.join(JoinRequest::new(channel("room-a"))).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(SessionError::JoinRejected {
                attempt: JoinAttempt::WithToken,
                source: ProviderError::UidConflict,
            })
        );
        assert_eq!(h.provider.join_tokens().len(), 1);
    }

    #[tokio::test]
    async fn test_media_failure_still_connects_without_local_media() {
        // テスト項目: カメラ権限が拒否されても接続は Connected になり、ローカルメディア無しとして扱われる
        // given (前提条件):
        let h = Harness::with(
            CountingBackend::default(),
            VirtualMediaDevices::new().with_camera(DeviceAvailability::PermissionDenied),
            HeadlessSurface::new(),
        );
        let mut events = h.manager.subscribe();

        // when (操作):
        let result = h.manager.join(JoinRequest::new(channel("room-a"))).await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(h.manager.state(), ConnectionState::Connected);
        assert!(drain(&mut events).contains(&SessionEvent::LocalMediaUnavailable(
            MediaError::PermissionDenied(MediaKind::Video)
        )));
        assert!(
            !h.provider
                .calls()
                .iter()
                .any(|c| matches!(c, ProviderCall::Publish(_)))
        );
        assert!(!h.devices.is_open(MediaKind::Audio));
        let local = h.manager.snapshot().local_media;
        assert!(!local.audio_available && !local.video_available);
        assert_eq!(h.manager.set_video_enabled(false), ToggleOutcome::NoEffect);
    }

    #[tokio::test]
    async fn test_publish_failure_withdraws_partial_publish() {
        // テスト項目: 公開に失敗すると PublishFailed が通知され、Connected のままデバイスが閉じられ、部分的な公開は取り消される
        // given (前提条件):
        let h = Harness::new();
        h.provider
            .fail_publish(ProviderError::Network("reset".to_string()));
        let mut events = h.manager.subscribe();

        // when (操作):
        let result = h.manager.join(JoinRequest::new(channel("room-a"))).await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(h.manager.state(), ConnectionState::Connected);
        assert!(drain(&mut events).contains(&SessionEvent::PublishFailed(
            ProviderError::Network("reset".to_string())
        )));
        assert!(!h.devices.is_open(MediaKind::Audio));
        assert!(!h.devices.is_open(MediaKind::Video));
        let calls = h.provider.calls();
        assert_eq!(
            &calls[1..],
            &[
                ProviderCall::Publish(vec![MediaKind::Audio, MediaKind::Video]),
                ProviderCall::Unpublish
            ]
        );
        let local = h.manager.snapshot().local_media;
        assert!(!local.audio_available && !local.video_available);

        // when (操作):
        let outcome = h.manager.leave().await;

        // then (期待する結果): 取り消し済みなので leave 時に再度 unpublish はしない
        assert!(outcome.teardown.is_clean());
        assert_eq!(h.manager.state(), ConnectionState::Ended);
        assert_eq!(h.provider.calls().last(), Some(&ProviderCall::Leave));
        assert_eq!(
            h.provider
                .calls()
                .iter()
                .filter(|c| matches!(c, ProviderCall::Unpublish))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_failed_withdrawal_is_retried_on_leave() {
        // テスト項目: 公開失敗後の取り消しにも失敗した場合、leave の最初の手順で unpublish が再度行われる
        // given (前提条件):
        let h = Harness::new();
        h.provider.fail_publish(ProviderError::Closed);
        h.provider.fail_unpublish(ProviderError::Closed);
        h.manager
            .join(JoinRequest::new(channel("room-a")))
            .await
            .unwrap();

        // when (操作):
        let outcome = h.manager.leave().await;

        // then (期待する結果):
        let steps: Vec<_> = outcome.teardown.failures().iter().map(|f| f.step).collect();
        assert_eq!(steps, vec![TeardownStep::Unpublish]);
        let calls = h.provider.calls();
        assert_eq!(
            &calls[calls.len() - 2..],
            &[ProviderCall::Unpublish, ProviderCall::Leave]
        );
        assert_eq!(
            calls
                .iter()
                .filter(|c| matches!(c, ProviderCall::Unpublish))
                .count(),
            2
        );
        assert_eq!(h.manager.state(), ConnectionState::Ended);
        assert!(!h.devices.is_open(MediaKind::Audio));
    }

    #[tokio::test]
    async fn test_subscriber_does_not_capture() {
        // テスト項目: subscriber ロールではデバイスを開かず、公開もしない
        // given (前提条件):
        let h = Harness::new();

        // when (操作):
        h.manager
            .join(JoinRequest::new(channel("room-a")).with_role(Role::Subscriber))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(h.devices.open_count(MediaKind::Audio), 0);
        assert_eq!(h.devices.open_count(MediaKind::Video), 0);
        assert_eq!(h.provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_toggles_only_apply_while_connected() {
        // テスト項目: 接続前の切り替えは NoEffect、接続中は映像と音声が独立して一時停止する
        // given (前提条件):
        let h = Harness::new();

        // when (操作):
        let before = h.manager.set_audio_enabled(false);

        // then (期待する結果):
        assert_eq!(before, ToggleOutcome::NoEffect);

        // when (操作):
        h.manager
            .join(JoinRequest::new(channel("room-a")))
            .await
            .unwrap();
        let video = h.manager.set_video_enabled(false);

        // then (期待する結果): 音声は止まらない
        assert_eq!(video, ToggleOutcome::Applied);
        assert!(!h.devices.is_capturing(MediaKind::Video));
        assert!(h.devices.is_capturing(MediaKind::Audio));

        // when (操作):
        let audio = h.manager.set_audio_enabled(false);

        // then (期待する結果): 両方が一時停止し、デバイスは開いたまま
        assert_eq!(audio, ToggleOutcome::Applied);
        assert!(!h.devices.is_capturing(MediaKind::Audio));
        assert!(h.devices.is_open(MediaKind::Audio));
        assert!(h.devices.is_open(MediaKind::Video));
        let local = h.manager.snapshot().local_media;
        assert!(!local.audio_enabled && !local.video_enabled);
        assert_eq!(h.devices.open_count(MediaKind::Video), 1);
    }

    #[tokio::test]
    async fn test_leave_runs_every_teardown_step_even_when_some_fail() {
        // テスト項目: unpublish と leave が失敗してもメディアは解放され、Ended に到達する
        // given (前提条件):
        let h = Harness::new();
        h.manager
            .join(JoinRequest::new(channel("room-a")))
            .await
            .unwrap();
        h.provider.inject(ProviderEvent::Published {
            id: id(2),
            kind: MediaKind::Audio,
        });
        eventually("participant registered", || {
            h.manager.snapshot().participant_count() == 1
        })
        .await;
        h.provider
            .fail_unpublish(ProviderError::Network("reset".to_string()));
        h.provider.fail_leave(ProviderError::Closed);

        // when (操作):
        let outcome = h.manager.leave().await;

        // then (期待する結果):
        let steps: Vec<_> = outcome.teardown.failures().iter().map(|f| f.step).collect();
        assert_eq!(steps, vec![TeardownStep::Unpublish, TeardownStep::LeaveChannel]);
        assert_eq!(outcome.directive, CompletionDirective::None);
        assert_eq!(h.manager.state(), ConnectionState::Ended);
        assert!(!h.devices.is_open(MediaKind::Audio));
        assert!(!h.devices.is_open(MediaKind::Video));
        assert_eq!(h.manager.snapshot().participant_count(), 0);
        assert_eq!(h.manager.join_link(), None);
    }

    #[tokio::test]
    async fn test_leave_from_idle_is_harmless() {
        // テスト項目: 接続していない状態の leave は何もせず、状態も変わらない
        // given (前提条件):
        let h = Harness::new();

        // when (操作):
        let outcome = h.manager.leave().await;

        // then (期待する結果):
        assert_eq!(outcome, LeaveOutcome::default());
        assert_eq!(h.manager.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_leave_while_joining_tears_down_once_join_resolves() {
        // テスト項目: 参加中に leave すると、参加要求が返った時点で Connected にならずに片付けられる
        // given (前提条件):
        let h = Harness::new();
        h.provider.hold_joins();
        let manager = h.manager.clone();
        let join = tokio::spawn(async move { manager.join(JoinRequest::new(channel("room-a"))).await });
        h.wait_for_state(|s| *s == ConnectionState::Joining(JoinAttempt::WithToken))
            .await;

        // when (操作):
        let manager = h.manager.clone();
        let leave = tokio::spawn(async move { manager.leave().await });
        h.wait_for_state(|s| *s == ConnectionState::Leaving).await;
        h.provider.release_joins(1);

        // then (期待する結果):
        assert_eq!(join.await.unwrap(), Err(SessionError::Cancelled));
        let outcome = leave.await.unwrap();
        assert_eq!(outcome.directive, CompletionDirective::None);
        assert!(outcome.teardown.is_clean());
        assert_eq!(h.manager.state(), ConnectionState::Ended);
        assert_eq!(h.provider.calls().last(), Some(&ProviderCall::Leave));
        assert_eq!(h.devices.open_count(MediaKind::Audio), 0);
    }

    #[tokio::test]
    async fn test_leave_while_provisioning_skips_token_issuance() {
        // テスト項目: プロビジョニング中に leave すると、トークン発行も参加も行われない
        // given (前提条件):
        let h = Harness::with(
            CountingBackend::gated(),
            VirtualMediaDevices::new(),
            HeadlessSurface::new(),
        );
        let manager = h.manager.clone();
        let join = tokio::spawn(async move { manager.join(JoinRequest::new(channel("room-a"))).await });
        h.wait_for_state(|s| *s == ConnectionState::Provisioning).await;

        // when (操作):
        let manager = h.manager.clone();
        let leave = tokio::spawn(async move { manager.leave().await });
        h.wait_for_state(|s| *s == ConnectionState::Leaving).await;
        h.backend.open_gate();

        // then (期待する結果):
        assert_eq!(join.await.unwrap(), Err(SessionError::Cancelled));
        leave.await.unwrap();
        assert_eq!(h.backend.token_calls.load(Ordering::SeqCst), 0);
        assert!(h.provider.calls().is_empty());
        assert_eq!(h.manager.state(), ConnectionState::Ended);
    }

    #[tokio::test]
    async fn test_participant_events_flow_into_registry() {
        // テスト項目: id=2 (映像) と id=3 (音声) が参加し、id=2 が映像を止めてから退出する
        // given (前提条件):
        let h = Harness::with(
            CountingBackend::default(),
            VirtualMediaDevices::new(),
            HeadlessSurface::ready_after(2),
        );
        h.manager
            .join(JoinRequest::new(channel("room-a")))
            .await
            .unwrap();

        // when (操作):
        h.provider.inject(ProviderEvent::Published {
            id: id(2),
            kind: MediaKind::Video,
        });
        h.provider.inject(ProviderEvent::Published {
            id: id(3),
            kind: MediaKind::Audio,
        });

        // then (期待する結果): 描画先は遅れて付与される
        eventually("sink attached to 2", || {
            h.manager
                .snapshot()
                .participants
                .iter()
                .any(|p| p.id == id(2) && p.video_sink.is_some())
        })
        .await;
        assert_eq!(h.manager.snapshot().participant_count(), 2);

        // when (操作):
        h.provider.inject(ProviderEvent::Unpublished {
            id: id(2),
            kind: MediaKind::Video,
        });

        // then (期待する結果):
        eventually("video of 2 cleared", || {
            h.manager
                .snapshot()
                .participants
                .iter()
                .any(|p| p.id == id(2) && !p.has_video && p.video_sink.is_none())
        })
        .await;

        // when (操作):
        h.provider.inject(ProviderEvent::Left { id: id(2) });

        // then (期待する結果): id=3 はそのまま
        eventually("2 removed", || h.manager.snapshot().participant_count() == 1).await;
        let participants = h.manager.snapshot().participants;
        assert_eq!(participants[0].id, id(3));
        assert!(participants[0].has_audio);
        assert!(!participants[0].has_video);
    }

    #[tokio::test]
    async fn test_booked_session_reports_rounded_duration() {
        // テスト項目: 予約セッションは 37 分 10 秒後の leave で 37 分の完了指示を返す
        // given (前提条件):
        let h = Harness::new();
        let booking = BookingSessionId::new("bk-42".to_string()).unwrap();
        h.manager
            .join(JoinRequest::new(channel("bk-42-room")).with_booking_session(booking.clone()))
            .await
            .unwrap();
        let mut events = h.manager.subscribe();
        h.clock.advance((37 * 60 + 10) * 1000);

        // when (操作):
        let outcome = h.manager.leave().await;

        // then (期待する結果):
        let expected = CompletionDirective::Complete {
            booking_session_id: booking,
            duration_minutes: 37,
        };
        assert_eq!(outcome.directive, expected);
        assert!(drain(&mut events).contains(&SessionEvent::Ended {
            directive: expected
        }));
    }

    #[tokio::test]
    async fn test_ad_hoc_group_session_has_no_follow_up() {
        // テスト項目: 予約に紐付かないグループセッションの leave は None を返す
        // given (前提条件):
        let h = Harness::new();
        h.manager
            .join(JoinRequest::new(channel("group-abc123-1700000000000")).group())
            .await
            .unwrap();

        // when (操作):
        let outcome = h.manager.leave().await;

        // then (期待する結果):
        assert_eq!(outcome.directive, CompletionDirective::None);
    }

    #[tokio::test]
    async fn test_provider_disconnect_is_reported() {
        // テスト項目: プロバイダのイベントストリームが切れると ProviderDisconnected が通知される
        // given (前提条件):
        let h = Harness::new();
        h.manager
            .join(JoinRequest::new(channel("room-a")))
            .await
            .unwrap();
        let mut events = h.manager.subscribe();

        // when (操作):
        h.provider.disconnect();

        // then (期待する結果):
        let event = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::ProviderDisconnected) => break true,
                    Ok(_) => continue,
                    Err(_) => break false,
                }
            }
        })
        .await
        .unwrap();
        assert!(event);
        assert_eq!(h.manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_dropped_join_future_marks_failed() {
        // テスト項目: join の Future が途中で破棄されると Failed になり、再度 join できる
        // given (前提条件):
        let h = Harness::new();
        h.provider.hold_joins();

        // when (操作):
        let timed_out = tokio::time::timeout(
            Duration::from_millis(50),
            h.manager.join(JoinRequest::new(channel("room-a"))),
        )
        .await;

        // then (期待する結果):
        assert!(timed_out.is_err());
        assert_eq!(h.manager.state(), ConnectionState::Failed);

        // when (操作):
        h.provider.release_joins(1);
        let retry = h.manager.join(JoinRequest::new(channel("room-a"))).await;

        // then (期待する結果):
        assert!(retry.is_ok());
        assert_eq!(h.manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_rejoin_after_leave_reacquires_media() {
        // テスト項目: leave 後に再度 join するとデバイスが取得し直される
        // given (前提条件):
        let h = Harness::new();
        h.manager
            .join(JoinRequest::new(channel("room-a")))
            .await
            .unwrap();
        h.manager.leave().await;

        // when (操作):
        let result = h.manager.join(JoinRequest::new(channel("room-a"))).await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(h.devices.open_count(MediaKind::Audio), 2);
        assert!(h.devices.is_open(MediaKind::Video));
    }
}
