//! What the connection manager tells the outside world.

use crate::domain::{
    ChannelDescriptor, ChannelName, CompletionDirective, ConnectionState, LocalMediaStatus,
    MediaError, ParticipantId, ProviderError, RemoteParticipant,
};

/// Lifecycle notifications, delivered through `ConnectionManager::subscribe`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// The connection is up; `join_link` invites a second participant
    Joined {
        descriptor: ChannelDescriptor,
        join_link: String,
    },
    /// The remote participant registry changed
    ParticipantsChanged { count: usize },
    /// Connected without local media (presence only)
    LocalMediaUnavailable(MediaError),
    /// Local media was acquired but the provider refused to publish it
    PublishFailed(ProviderError),
    /// The provider event stream ended while connected
    ProviderDisconnected,
    Ended { directive: CompletionDirective },
}

/// Immutable view of a connection for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub channel_name: Option<ChannelName>,
    pub local_participant_id: Option<ParticipantId>,
    /// Sorted by participant id
    pub participants: Vec<RemoteParticipant>,
    pub local_media: LocalMediaStatus,
}

impl ConnectionSnapshot {
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }
}
