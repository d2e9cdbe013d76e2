//! Headless video surface.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::domain::{ParticipantId, VideoSinkHandle, VideoSurface};

/// Video surface for hosts that do not render video.
///
/// Hands out one stable sink per participant, optionally only after the sink
/// has been asked for a number of times (to mimic a host that lays out its
/// tiles a little after the publish event arrives).
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    ready_after_polls: u32,
    polls: Mutex<HashMap<ParticipantId, u32>>,
    sinks: Mutex<HashMap<ParticipantId, VideoSinkHandle>>,
    next_sink: AtomicU64,
}

impl HeadlessSurface {
    /// A surface whose sinks are available immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface that answers `None` for the first `polls` requests per participant
    pub fn ready_after(polls: u32) -> Self {
        Self {
            ready_after_polls: polls,
            ..Self::default()
        }
    }
}

impl VideoSurface for HeadlessSurface {
    fn sink_for(&self, id: ParticipantId) -> Option<VideoSinkHandle> {
        {
            let mut polls = self.polls.lock().unwrap_or_else(|e| e.into_inner());
            let count = polls.entry(id).or_insert(0);
            if *count < self.ready_after_polls {
                *count += 1;
                return None;
            }
        }
        let mut sinks = self.sinks.lock().unwrap_or_else(|e| e.into_inner());
        let sink = sinks
            .entry(id)
            .or_insert_with(|| VideoSinkHandle::new(self.next_sink.fetch_add(1, Ordering::SeqCst) + 1));
        Some(*sink)
    }
}
