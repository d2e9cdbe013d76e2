//! Realtime provider trait definitions.
//!
//! The provider SDK is an external capability: it relays media between
//! participants and reports participant churn. The session core only needs
//! join / publish / unpublish / leave and an ordered event stream.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{
    error::ProviderError,
    registry::ProviderEvent,
    value_object::{ChannelName, MediaKind, ParticipantId},
};

/// Result of a successful provider join
pub struct ProviderSession {
    /// Handle used to publish and to leave
    pub connection: Box<dyn ProviderConnection>,
    /// Participant events in the order the provider emitted them.
    ///
    /// The stream ends when the provider connection goes away.
    pub events: mpsc::UnboundedReceiver<ProviderEvent>,
}

/// Entry point of the provider SDK
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Open a connection to `channel`.
    ///
    /// `token` is `None` for an unauthenticated join.
    async fn join(
        &self,
        app_id: &str,
        channel: &ChannelName,
        token: Option<&str>,
        uid: ParticipantId,
    ) -> Result<ProviderSession, ProviderError>;
}

/// An open provider connection
#[async_trait]
pub trait ProviderConnection: Send {
    /// Publish the given local tracks to the channel
    async fn publish(&mut self, kinds: &[MediaKind]) -> Result<(), ProviderError>;

    /// Stop publishing every local track
    async fn unpublish(&mut self) -> Result<(), ProviderError>;

    /// Leave the channel; the event stream ends afterwards
    async fn leave(&mut self) -> Result<(), ProviderError>;
}
