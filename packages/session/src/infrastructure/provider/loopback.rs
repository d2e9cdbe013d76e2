//! In-process `MediaProvider`.
//!
//! Nothing is relayed anywhere: joins succeed or fail as scripted, every call
//! is recorded, and participant events are injected by the owner of the
//! provider. Used by the offline harness and by connection manager tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc};

use crate::domain::{
    ChannelName, MediaKind, MediaProvider, ParticipantId, ProviderConnection, ProviderError,
    ProviderEvent, ProviderSession,
};

/// A call made against the loopback provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Join {
        channel: String,
        token: Option<String>,
        uid: ParticipantId,
    },
    Publish(Vec<MediaKind>),
    Unpublish,
    Leave,
}

#[derive(Default)]
struct LoopbackState {
    join_outcomes: VecDeque<Result<(), ProviderError>>,
    calls: Vec<ProviderCall>,
    events: Option<mpsc::UnboundedSender<ProviderEvent>>,
    join_gate: Option<Arc<Semaphore>>,
    fail_publish: Option<ProviderError>,
    fail_unpublish: Option<ProviderError>,
    fail_leave: Option<ProviderError>,
}

/// Scriptable in-process provider.
///
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct LoopbackProvider {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue the outcome of the next join; joins succeed once the queue is empty
    pub fn push_join_outcome(&self, outcome: Result<(), ProviderError>) {
        self.lock().join_outcomes.push_back(outcome);
    }

    /// Make joins wait until [`LoopbackProvider::release_joins`] lets them through
    pub fn hold_joins(&self) {
        self.lock().join_gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `count` held joins proceed
    pub fn release_joins(&self, count: usize) {
        if let Some(gate) = &self.lock().join_gate {
            gate.add_permits(count);
        }
    }

    pub fn fail_publish(&self, error: ProviderError) {
        self.lock().fail_publish = Some(error);
    }

    pub fn fail_unpublish(&self, error: ProviderError) {
        self.lock().fail_unpublish = Some(error);
    }

    pub fn fail_leave(&self, error: ProviderError) {
        self.lock().fail_leave = Some(error);
    }

    /// Deliver a participant event to the open connection.
    ///
    /// Returns `false` if no connection is open.
    pub fn inject(&self, event: ProviderEvent) -> bool {
        match &self.lock().events {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// End the event stream of the open connection, as a dropped network would
    pub fn disconnect(&self) {
        self.lock().events = None;
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.lock().calls.clone()
    }

    /// The tokens presented by every join so far, in order
    pub fn join_tokens(&self) -> Vec<Option<String>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ProviderCall::Join { token, .. } => Some(token.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ProviderCall) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl MediaProvider for LoopbackProvider {
    async fn join(
        &self,
        _app_id: &str,
        channel: &ChannelName,
        token: Option<&str>,
        uid: ParticipantId,
    ) -> Result<ProviderSession, ProviderError> {
        self.record(ProviderCall::Join {
            channel: channel.to_string(),
            token: token.map(str::to_string),
            uid,
        });

        let gate = self.lock().join_gate.clone();
        if let Some(gate) = gate {
            let permit = gate.acquire().await.map_err(|_| ProviderError::Closed)?;
            permit.forget();
        }

        let outcome = self.lock().join_outcomes.pop_front().unwrap_or(Ok(()));
        outcome?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().events = Some(tx);
        Ok(ProviderSession {
            connection: Box::new(LoopbackConnection {
                provider: self.clone(),
            }),
            events: rx,
        })
    }
}

struct LoopbackConnection {
    provider: LoopbackProvider,
}

#[async_trait]
impl ProviderConnection for LoopbackConnection {
    async fn publish(&mut self, kinds: &[MediaKind]) -> Result<(), ProviderError> {
        self.provider.record(ProviderCall::Publish(kinds.to_vec()));
        match self.provider.lock().fail_publish.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn unpublish(&mut self) -> Result<(), ProviderError> {
        self.provider.record(ProviderCall::Unpublish);
        match self.provider.lock().fail_unpublish.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn leave(&mut self) -> Result<(), ProviderError> {
        self.provider.record(ProviderCall::Leave);
        let mut state = self.provider.lock();
        state.events = None;
        match state.fail_leave.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> ChannelName {
        ChannelName::try_from("room-a").unwrap()
    }

    #[tokio::test]
    async fn test_scripted_join_outcomes_are_used_in_order() {
        // テスト項目: キューに積んだ join 結果が順番に使われ、空になると成功する
        // given (前提条件):
        let provider = LoopbackProvider::new();
        provider.push_join_outcome(Err(ProviderError::InvalidToken));

        // when (操作):
        let first = provider
            .join("app", &channel(), Some("tok"), ParticipantId::new(1))
            .await;
        let second = provider
            .join("app", &channel(), None, ParticipantId::new(1))
            .await;

        // then (期待する結果):
        assert!(matches!(first, Err(ProviderError::InvalidToken)));
        assert!(second.is_ok());
        assert_eq!(
            provider.join_tokens(),
            vec![Some("tok".to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_injected_events_reach_the_session_until_leave() {
        // テスト項目: 注入したイベントが届き、leave 後はストリームが終わる
        // given (前提条件):
        let provider = LoopbackProvider::new();
        let ProviderSession {
            mut connection,
            mut events,
        } = provider
            .join("app", &channel(), None, ParticipantId::new(1))
            .await
            .unwrap();
        let event = ProviderEvent::Published {
            id: ParticipantId::new(2),
            kind: MediaKind::Video,
        };

        // when (操作):
        let delivered = provider.inject(event);
        connection.leave().await.unwrap();

        // then (期待する結果):
        assert!(delivered);
        assert_eq!(events.recv().await, Some(event));
        assert_eq!(events.recv().await, None);
        assert!(!provider.inject(event));
        assert_eq!(provider.calls().last(), Some(&ProviderCall::Leave));
    }
}
