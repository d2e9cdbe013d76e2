//! Capture device and render surface implementations.

pub mod surface;
pub mod virtual_device;

pub use surface::HeadlessSurface;
pub use virtual_device::{DeviceAvailability, VirtualMediaDevices};
