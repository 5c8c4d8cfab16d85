//! Input backends for `stickmap`.
//!
//! A backend implements [`DeviceEnumerator`]: it lists attached devices
//! (without keeping them open) and opens them on request as
//! [`RawDevice`](crate::device::RawDevice) handles.
//!
//! # Feature flags
//! - **`hid`** (default): the `hidapi` backend with a cross-platform HID
//!   report-descriptor decoder.
//!
//! The [`virtual_input`] backend is always available. It is used by tests and
//! demos, and by hosts that synthesize input themselves.

use crate::device::RawDevice;
use crate::error::DeviceError;
use crate::metadata::RawDeviceInfo;

#[cfg(feature = "hid")]
#[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
pub mod hid;
pub mod report_descriptor;
pub mod virtual_input;

/// Platform device layer as seen by the matcher.
pub trait DeviceEnumerator {
    /// List attached devices in ascending index order.
    ///
    /// Must not leave any device open.
    fn enumerate(&mut self) -> Vec<RawDeviceInfo>;

    /// Open the device at `index` from the most recent enumeration.
    fn open(&mut self, index: usize) -> Result<Box<dyn RawDevice>, DeviceError>;
}

impl<E: DeviceEnumerator + ?Sized> DeviceEnumerator for Box<E> {
    fn enumerate(&mut self) -> Vec<RawDeviceInfo> {
        (**self).enumerate()
    }

    fn open(&mut self, index: usize) -> Result<Box<dyn RawDevice>, DeviceError> {
        (**self).open(index)
    }
}

/// The default enumerator for this build.
///
/// With `hid` enabled this is the HID backend, falling back to an empty
/// virtual backend if the HID layer fails to initialize.
pub fn probe_enumerator() -> Box<dyn DeviceEnumerator> {
    #[cfg(feature = "hid")]
    {
        match hid::HidEnumerator::new() {
            Ok(hid) => return Box::new(hid),
            Err(e) => tracing::warn!(error = %e, "failed to initialize HID backend"),
        }
    }

    Box::new(virtual_input::VirtualBackend::new())
}
