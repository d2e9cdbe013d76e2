//! Remote participant registry.
//!
//! The registry is a pure fold over the provider events received so far:
//! every event goes through [`RemoteParticipantRegistry::apply`], and the
//! contents depend only on the order of those events. Video sink attachment
//! is the one mutation that does not come from an event; it never changes the
//! media flags, and it is ignored for a participant that has no video at the
//! time it lands.

use std::collections::HashMap;

use super::{
    entity::RemoteParticipant,
    value_object::{MediaKind, ParticipantId, VideoSinkHandle},
};

/// A provider participant event, as a self-contained value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEvent {
    Published { id: ParticipantId, kind: MediaKind },
    Unpublished { id: ParticipantId, kind: MediaKind },
    Left { id: ParticipantId },
}

impl ProviderEvent {
    pub fn participant_id(&self) -> ParticipantId {
        match self {
            Self::Published { id, .. } | Self::Unpublished { id, .. } | Self::Left { id } => *id,
        }
    }
}

/// Effect of applying one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryChange {
    Added(ParticipantId),
    Updated(ParticipantId),
    Removed(ParticipantId),
    Unchanged,
}

impl RegistryChange {
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Keyed collection of remote participants, at most one entry per id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteParticipantRegistry {
    participants: HashMap<ParticipantId, RemoteParticipant>,
}

impl RemoteParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry by folding `events` in order
    pub fn fold<'a>(events: impl IntoIterator<Item = &'a ProviderEvent>) -> Self {
        let mut registry = Self::new();
        for event in events {
            registry.apply(event);
        }
        registry
    }

    /// Apply one provider event; the single mutation entry point for events
    pub fn apply(&mut self, event: &ProviderEvent) -> RegistryChange {
        match *event {
            ProviderEvent::Published { id, kind } => self.on_participant_published(id, kind),
            ProviderEvent::Unpublished { id, kind } => self.on_participant_unpublished(id, kind),
            ProviderEvent::Left { id } => self.on_participant_left(id),
        }
    }

    fn on_participant_published(&mut self, id: ParticipantId, kind: MediaKind) -> RegistryChange {
        match self.participants.get_mut(&id) {
            Some(participant) if participant.has(kind) => RegistryChange::Unchanged,
            Some(participant) => {
                participant.set(kind, true);
                RegistryChange::Updated(id)
            }
            None => {
                let mut participant = RemoteParticipant::new(id);
                participant.set(kind, true);
                self.participants.insert(id, participant);
                RegistryChange::Added(id)
            }
        }
    }

    // An unpublish for an unknown id clamps to "not present": nothing is created.
    // A participant that stops publishing everything stays listed until it leaves.
    fn on_participant_unpublished(&mut self, id: ParticipantId, kind: MediaKind) -> RegistryChange {
        match self.participants.get_mut(&id) {
            Some(participant) if participant.has(kind) => {
                participant.set(kind, false);
                RegistryChange::Updated(id)
            }
            Some(_) | None => RegistryChange::Unchanged,
        }
    }

    fn on_participant_left(&mut self, id: ParticipantId) -> RegistryChange {
        match self.participants.remove(&id) {
            Some(_) => RegistryChange::Removed(id),
            None => RegistryChange::Unchanged,
        }
    }

    /// Attach a render sink to a participant's video.
    ///
    /// Returns `false` (and does nothing) if the participant is gone or no
    /// longer publishes video.
    pub fn attach_video_sink(&mut self, id: ParticipantId, sink: VideoSinkHandle) -> bool {
        match self.participants.get_mut(&id) {
            Some(participant) if participant.has_video => {
                participant.video_sink = Some(sink);
                true
            }
            Some(_) | None => false,
        }
    }

    pub fn get(&self, id: ParticipantId) -> Option<&RemoteParticipant> {
        self.participants.get(&id)
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.participants.contains_key(&id)
    }

    /// Unordered copy of the current participants
    pub fn snapshot(&self) -> Vec<RemoteParticipant> {
        self.participants.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn clear(&mut self) {
        self.participants.clear();
    }
}
