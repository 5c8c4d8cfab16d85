//! Open raw device handles.
//!
//! A [`RawDevice`] is an open handle to one physical (or virtual) device. It is
//! a resource: dropping the box closes the handle, so a failed bind or a
//! release can never leave a device open.

use crate::channel::{DeviceCaps, HatState};

pub trait RawDevice {
    /// Human-readable device name, as used for pattern matching.
    fn name(&self) -> &str;

    /// Backend-specific stable id (HID path, `virtual:N`, ...).
    fn id(&self) -> &str;

    fn caps(&self) -> DeviceCaps;

    /// Refresh the cached state from the OS. Must not block.
    fn poll(&mut self);

    /// Current button state; `false` for out-of-range indices.
    fn button(&self, index: u16) -> bool;

    /// Current axis value in `[-1.0, 1.0]`; `0.0` for out-of-range indices.
    fn axis(&self, index: u16) -> f32;

    /// Current hat direction; neutral for out-of-range indices.
    fn hat(&self, index: u16) -> HatState;
}
