//! Entities of the session domain.

use super::value_object::{
    BookingSessionId, ChannelName, MediaKind, ParticipantId, Role, Timestamp, VideoSinkHandle,
};

/// A provisioned channel.
///
/// Created once per connection attempt and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescriptor {
    pub channel_name: ChannelName,
    pub provider_app_id: String,
}

/// Short-lived credential scoped to one channel and one role.
///
/// Issued per join attempt; the channel it was issued for is kept so it can
/// never be presented to another channel.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential {
    pub token: String,
    pub local_participant_id: ParticipantId,
    pub role: Role,
    pub channel_name: ChannelName,
}

impl AccessCredential {
    pub fn is_scoped_to(&self, channel_name: &ChannelName) -> bool {
        &self.channel_name == channel_name
    }
}

// Keeps the token out of logs.
impl std::fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessCredential")
            .field("token", &"<redacted>")
            .field("local_participant_id", &self.local_participant_id)
            .field("role", &self.role)
            .field("channel_name", &self.channel_name)
            .finish()
    }
}

/// A remote participant and the media it currently publishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteParticipant {
    pub id: ParticipantId,
    pub has_audio: bool,
    pub has_video: bool,
    pub video_sink: Option<VideoSinkHandle>,
}

impl RemoteParticipant {
    pub fn new(id: ParticipantId) -> Self {
        Self {
            id,
            has_audio: false,
            has_video: false,
            video_sink: None,
        }
    }

    pub fn has(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.has_audio,
            MediaKind::Video => self.has_video,
        }
    }

    pub(crate) fn set(&mut self, kind: MediaKind, present: bool) {
        match kind {
            MediaKind::Audio => self.has_audio = present,
            MediaKind::Video => {
                self.has_video = present;
                if !present {
                    self.video_sink = None;
                }
            }
        }
    }

    /// Whether the participant publishes nothing at the moment
    pub fn is_silent(&self) -> bool {
        !self.has_audio && !self.has_video
    }
}

/// Link between a live connection and a pre-booked session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLinkage {
    pub booking_session_id: BookingSessionId,
    pub started_at: Timestamp,
}

/// What the surrounding application should do after a connection ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionDirective {
    /// Ad-hoc session: plain teardown, no follow-up
    None,
    /// Pre-booked session: run the post-session workflow
    Complete {
        booking_session_id: BookingSessionId,
        duration_minutes: u32,
    },
}

/// Read-only view of the local capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocalMediaStatus {
    pub audio_available: bool,
    pub video_available: bool,
    pub audio_enabled: bool,
    pub video_enabled: bool,
}
