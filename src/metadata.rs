//! Enumerated device descriptions.
//!
//! [`RawDeviceInfo`] is what a [`DeviceEnumerator`](crate::backends::DeviceEnumerator)
//! reports for each attached device, without keeping it open. It is the input
//! to pattern matching and is cheap to clone for UI display and logging.
//!
//! # Conventions
//! - `index` is the enumerator's ascending position for this session; it is what
//!   [`DeviceEnumerator::open`](crate::backends::DeviceEnumerator::open) takes.
//! - `name` is the display name used for wildcard matching.
//! - HID-specific fields are filled by the HID backend and `None` elsewhere.
//!
//! ## Persistence notes
//! Indices and paths can change across reconnects. Device definitions identify
//! hardware by name patterns for that reason.

use crate::channel::DeviceCaps;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot of one enumerated device.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDeviceInfo {
    /// Position in the enumeration (ascending, stable within a session).
    pub index: usize,

    /// Display name reported by the driver/firmware.
    pub name: String,

    /// Capability counts, when the backend could read them.
    pub caps: Option<DeviceCaps>,

    /// USB Vendor ID (VID), if known.
    pub vid: Option<u16>,

    /// USB Product ID (PID), if known.
    pub pid: Option<u16>,

    /// OS/topology path. Diagnostic only; treat as opaque.
    pub path: Option<String>,
}

impl RawDeviceInfo {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for RawDeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index, self.name)?;
        if let (Some(vid), Some(pid)) = (self.vid, self.pid) {
            write!(f, " ({vid:04x}:{pid:04x})")?;
        }
        if let Some(caps) = self.caps {
            write!(f, " [{caps}]")?;
        }
        Ok(())
    }
}
