//! UseCase: hand-off between a connection and its booking session

use std::sync::Arc;

use kizuna_shared::time::Clock;

use crate::domain::{BookingSessionId, CompletionDirective, SessionLinkage, Timestamp};

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Maps a connection's start and stop to an optional booking session.
///
/// The bridge only produces the hand-off; running the post-session workflow
/// (completion form, notes, billing) is up to the surrounding application.
pub struct SessionLifecycleBridge {
    clock: Arc<dyn Clock>,
}

impl SessionLifecycleBridge {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Start the linkage for a connection that just came up.
    ///
    /// Returns `None` for ad-hoc sessions.
    pub fn on_start(&self, booking_session_id: Option<BookingSessionId>) -> Option<SessionLinkage> {
        booking_session_id.map(|booking_session_id| SessionLinkage {
            booking_session_id,
            started_at: Timestamp::new(self.clock.now_millis()),
        })
    }

    /// Decide what happens after the connection ends
    pub fn on_leave(&self, linkage: Option<&SessionLinkage>) -> CompletionDirective {
        match linkage {
            Some(linkage) => {
                let duration_minutes =
                    elapsed_minutes(linkage.started_at, Timestamp::new(self.clock.now_millis()));
                tracing::info!(
                    booking_session_id = %linkage.booking_session_id,
                    duration_minutes,
                    "Booked session ended, completion workflow requested"
                );
                CompletionDirective::Complete {
                    booking_session_id: linkage.booking_session_id.clone(),
                    duration_minutes,
                }
            }
            None => CompletionDirective::None,
        }
    }
}

/// Whole minutes between `started_at` and `now`, rounded to nearest (half up).
///
/// A clock that went backwards yields 0.
pub fn elapsed_minutes(started_at: Timestamp, now: Timestamp) -> u32 {
    let elapsed = now.value().saturating_sub(started_at.value()).max(0);
    let minutes = elapsed.saturating_add(MILLIS_PER_MINUTE / 2) / MILLIS_PER_MINUTE;
    u32::try_from(minutes).unwrap_or(u32::MAX)
}
