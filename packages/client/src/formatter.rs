//! Message formatting utilities for client display.

use kizuna_session::{
    ConnectionSnapshot, LeaveOutcome, SessionEvent,
    domain::{ChannelDescriptor, CompletionDirective, LocalMediaStatus},
};

/// Formatter for lifecycle output
pub struct SessionFormatter;

impl SessionFormatter {
    /// Banner shown once the connection is up
    pub fn format_joined(descriptor: &ChannelDescriptor, join_link: Option<&str>) -> String {
        let mut output = String::new();
        output.push_str("\n============================================================\n");
        output.push_str(&format!(
            "Joined channel '{}' (app {})\n",
            descriptor.channel_name, descriptor.provider_app_id
        ));
        if let Some(link) = join_link {
            output.push_str(&format!("Invite link: {}\n", link));
        }
        output.push_str("Commands: /mic on|off, /cam on|off, /who, /link, /leave\n");
        output.push_str("============================================================\n");
        output
    }

    pub fn format_local_media(status: &LocalMediaStatus) -> String {
        let describe = |available: bool, enabled: bool| match (available, enabled) {
            (false, _) => "unavailable",
            (true, true) => "on",
            (true, false) => "off",
        };
        format!(
            "mic: {}, cam: {}",
            describe(status.audio_available, status.audio_enabled),
            describe(status.video_available, status.video_enabled)
        )
    }

    /// Participant list for `/who`
    pub fn format_participants(snapshot: &ConnectionSnapshot) -> String {
        let mut output = String::new();
        output.push_str(&format!("\nState: {}\n", snapshot.state));
        if let Some(id) = snapshot.local_participant_id {
            output.push_str(&format!(
                "{} (me) - {}\n",
                id,
                Self::format_local_media(&snapshot.local_media)
            ));
        }
        if snapshot.participants.is_empty() {
            output.push_str("(No other participants)\n");
        }
        for participant in &snapshot.participants {
            let mut media = Vec::new();
            if participant.has_audio {
                media.push("audio");
            }
            if participant.has_video {
                media.push(if participant.video_sink.is_some() {
                    "video (rendering)"
                } else {
                    "video"
                });
            }
            let media = if media.is_empty() {
                "no media".to_string()
            } else {
                media.join(", ")
            };
            output.push_str(&format!("{} - {}\n", participant.id, media));
        }
        output
    }

    /// One line per event worth showing; `None` for events already logged
    pub fn format_event(event: &SessionEvent) -> Option<String> {
        match event {
            SessionEvent::ParticipantsChanged { count } => {
                Some(format!("\n* {} other participant(s) in the session\n", count))
            }
            SessionEvent::LocalMediaUnavailable(e) => Some(format!(
                "\n! Joined without camera and microphone: {}\n",
                e
            )),
            SessionEvent::PublishFailed(e) => {
                Some(format!("\n! Could not share your camera and microphone: {}\n", e))
            }
            SessionEvent::ProviderDisconnected => {
                Some("\n! Connection to the session was lost\n".to_string())
            }
            SessionEvent::StateChanged { .. }
            | SessionEvent::Joined { .. }
            | SessionEvent::Ended { .. } => None,
        }
    }

    /// Summary printed after leaving
    pub fn format_left(outcome: &LeaveOutcome) -> String {
        let mut output = String::from("\nLeft the session.\n");
        match &outcome.directive {
            CompletionDirective::None => {}
            CompletionDirective::Complete {
                booking_session_id,
                duration_minutes,
            } => output.push_str(&format!(
                "Booked session {} completed after {} minute(s).\n",
                booking_session_id.as_str(),
                duration_minutes
            )),
        }
        for failure in outcome.teardown.failures() {
            output.push_str(&format!("(cleanup warning: {})\n", failure));
        }
        output
    }
}
