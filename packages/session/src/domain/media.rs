//! Local capture device and render surface traits.

use async_trait::async_trait;

use super::{
    error::MediaError,
    value_object::{MediaKind, ParticipantId, VideoSinkHandle},
};

/// An open capture track (one microphone or one camera)
pub trait CaptureTrack: Send + Sync {
    fn kind(&self) -> MediaKind;

    /// Pause or resume capture without closing the device
    fn set_enabled(&mut self, enabled: bool);

    fn is_enabled(&self) -> bool;

    /// Close the device; calling it again is a no-op
    fn stop(&mut self) -> Result<(), MediaError>;

    /// Whether the device is still open
    fn is_live(&self) -> bool;
}

/// Access to the local capture devices
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn open_microphone(&self) -> Result<Box<dyn CaptureTrack>, MediaError>;

    async fn open_camera(&self) -> Result<Box<dyn CaptureTrack>, MediaError>;
}

/// Host surface remote video is rendered into.
///
/// A sink may not exist yet when a participant starts publishing video (the
/// host has not laid out its tile); callers poll with a bounded retry.
pub trait VideoSurface: Send + Sync {
    fn sink_for(&self, id: ParticipantId) -> Option<VideoSinkHandle>;
}
