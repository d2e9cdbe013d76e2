//! Virtual capture devices.
//!
//! Stand-ins for a microphone and a camera for hosts without capture hardware
//! (the terminal client, tests). Availability is configurable per device and
//! the open/enabled state of each device can be observed from outside.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::domain::{CaptureTrack, MediaDevices, MediaError, MediaKind};

/// What happens when a device is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceAvailability {
    #[default]
    Available,
    PermissionDenied,
    Missing,
}

#[derive(Debug)]
struct DeviceState {
    kind: MediaKind,
    availability: DeviceAvailability,
    fail_stop: bool,
    open: AtomicBool,
    enabled: AtomicBool,
    opens: AtomicUsize,
}

impl DeviceState {
    fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            availability: DeviceAvailability::Available,
            fail_stop: false,
            open: AtomicBool::new(false),
            enabled: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
        }
    }

    fn open(self: &Arc<Self>) -> Result<Box<dyn CaptureTrack>, MediaError> {
        match self.availability {
            DeviceAvailability::PermissionDenied => Err(MediaError::PermissionDenied(self.kind)),
            DeviceAvailability::Missing => Err(MediaError::DeviceUnavailable(self.kind)),
            DeviceAvailability::Available => {
                // A real device can be held by one capture session at a time.
                if self.open.swap(true, Ordering::SeqCst) {
                    return Err(MediaError::DeviceFailure {
                        kind: self.kind,
                        message: "device is busy".to_string(),
                    });
                }
                self.enabled.store(true, Ordering::SeqCst);
                self.opens.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(VirtualTrack {
                    device: Arc::clone(self),
                    live: true,
                }))
            }
        }
    }
}

/// Track handed out by [`VirtualMediaDevices`]
struct VirtualTrack {
    device: Arc<DeviceState>,
    live: bool,
}

impl CaptureTrack for VirtualTrack {
    fn kind(&self) -> MediaKind {
        self.device.kind
    }

    fn set_enabled(&mut self, enabled: bool) {
        if self.live {
            self.device.enabled.store(enabled, Ordering::SeqCst);
        }
    }

    fn is_enabled(&self) -> bool {
        self.live && self.device.enabled.load(Ordering::SeqCst)
    }

    fn stop(&mut self) -> Result<(), MediaError> {
        if !self.live {
            return Ok(());
        }
        self.live = false;
        self.device.enabled.store(false, Ordering::SeqCst);
        self.device.open.store(false, Ordering::SeqCst);
        if self.device.fail_stop {
            return Err(MediaError::DeviceFailure {
                kind: self.device.kind,
                message: "device reported an error while closing".to_string(),
            });
        }
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

impl Drop for VirtualTrack {
    fn drop(&mut self) {
        if self.live {
            self.device.enabled.store(false, Ordering::SeqCst);
            self.device.open.store(false, Ordering::SeqCst);
        }
    }
}

/// A virtual microphone and camera.
///
/// Clones share the same devices, so a test can keep a clone to observe what
/// the code under test did with them.
#[derive(Debug, Clone)]
pub struct VirtualMediaDevices {
    microphone: Arc<DeviceState>,
    camera: Arc<DeviceState>,
}

impl Default for VirtualMediaDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualMediaDevices {
    /// Both devices present and permitted
    pub fn new() -> Self {
        Self {
            microphone: Arc::new(DeviceState::new(MediaKind::Audio)),
            camera: Arc::new(DeviceState::new(MediaKind::Video)),
        }
    }

    pub fn with_microphone(self, availability: DeviceAvailability) -> Self {
        self.reconfigure(MediaKind::Audio, |state| state.availability = availability)
    }

    pub fn with_camera(self, availability: DeviceAvailability) -> Self {
        self.reconfigure(MediaKind::Video, |state| state.availability = availability)
    }

    /// Make stopping the device of `kind` report an error (it still closes)
    pub fn with_failing_stop(self, kind: MediaKind) -> Self {
        self.reconfigure(kind, |state| state.fail_stop = true)
    }

    // Configuration happens before any clone is handed out, so the state is
    // rebuilt rather than shared.
    fn reconfigure(mut self, kind: MediaKind, apply: impl FnOnce(&mut DeviceState)) -> Self {
        let slot = match kind {
            MediaKind::Audio => &mut self.microphone,
            MediaKind::Video => &mut self.camera,
        };
        let mut state = DeviceState {
            kind,
            availability: slot.availability,
            fail_stop: slot.fail_stop,
            ..DeviceState::new(kind)
        };
        apply(&mut state);
        *slot = Arc::new(state);
        self
    }

    fn device(&self, kind: MediaKind) -> &Arc<DeviceState> {
        match kind {
            MediaKind::Audio => &self.microphone,
            MediaKind::Video => &self.camera,
        }
    }

    /// Whether the device of `kind` is currently open
    pub fn is_open(&self, kind: MediaKind) -> bool {
        self.device(kind).open.load(Ordering::SeqCst)
    }

    /// Whether the device of `kind` is open and not paused
    pub fn is_capturing(&self, kind: MediaKind) -> bool {
        let device = self.device(kind);
        device.open.load(Ordering::SeqCst) && device.enabled.load(Ordering::SeqCst)
    }

    /// How many times the device of `kind` has been opened
    pub fn open_count(&self, kind: MediaKind) -> usize {
        self.device(kind).opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaDevices for VirtualMediaDevices {
    async fn open_microphone(&self) -> Result<Box<dyn CaptureTrack>, MediaError> {
        self.microphone.open()
    }

    async fn open_camera(&self) -> Result<Box<dyn CaptureTrack>, MediaError> {
        self.camera.open()
    }
}
