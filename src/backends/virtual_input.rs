//! In-memory devices.
//!
//! A [`VirtualDevice`] is a cheap, cloneable handle to shared device state:
//! keep a clone to feed input while the manager holds an open handle to the
//! same device.
//!
//! ```
//! use stickmap::backends::virtual_input::{VirtualBackend, VirtualDevice};
//! use stickmap::channel::DeviceCaps;
//!
//! let mut backend = VirtualBackend::new();
//! let pad = VirtualDevice::new("TestPad v2", DeviceCaps::new(2, 4, 1));
//! backend.add(pad.clone());
//!
//! pad.set_axis(0, 0.55);
//! pad.press_button(1);
//! ```
//!
//! The backend counts open handles, so tests can check that binds and releases
//! never leak one.

use super::DeviceEnumerator;
use crate::channel::{DeviceCaps, HatState};
use crate::device::RawDevice;
use crate::error::DeviceError;
use crate::metadata::RawDeviceInfo;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct VirtualState {
    axes: Vec<f32>,
    buttons: Vec<bool>,
    hats: Vec<HatState>,
}

/// Shared, feedable device state.
#[derive(Clone, Debug)]
pub struct VirtualDevice {
    name: String,
    caps: DeviceCaps,
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualDevice {
    pub fn new(name: &str, caps: DeviceCaps) -> Self {
        Self {
            name: name.to_string(),
            caps,
            state: Arc::new(Mutex::new(VirtualState {
                axes: vec![0.0; usize::from(caps.axes)],
                buttons: vec![false; usize::from(caps.buttons)],
                hats: vec![HatState::NEUTRAL; usize::from(caps.hats)],
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn caps(&self) -> DeviceCaps {
        self.caps
    }

    fn state(&self) -> MutexGuard<'_, VirtualState> {
        // State is plain data; a panic elsewhere cannot leave it inconsistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set an axis value (clamped to `[-1, 1]`). Out-of-range indices are ignored.
    pub fn set_axis(&self, axis: u16, value: f32) {
        if let Some(slot) = self.state().axes.get_mut(usize::from(axis)) {
            *slot = value.clamp(-1.0, 1.0);
        }
    }

    pub fn press_button(&self, button: u16) {
        self.set_button(button, true);
    }

    pub fn release_button(&self, button: u16) {
        self.set_button(button, false);
    }

    pub fn set_button(&self, button: u16, down: bool) {
        if let Some(slot) = self.state().buttons.get_mut(usize::from(button)) {
            *slot = down;
        }
    }

    /// Set a hat from a slot value (`-1` neutral, `0..7` clockwise from Up).
    pub fn set_hat(&self, hat: u16, slot: i16) {
        if let Some(h) = self.state().hats.get_mut(usize::from(hat)) {
            *h = HatState::from_slot(slot);
        }
    }

    fn read_axis(&self, axis: u16) -> f32 {
        self.state().axes.get(usize::from(axis)).copied().unwrap_or(0.0)
    }

    fn read_button(&self, button: u16) -> bool {
        self.state().buttons.get(usize::from(button)).copied().unwrap_or(false)
    }

    fn read_hat(&self, hat: u16) -> HatState {
        self.state().hats.get(usize::from(hat)).copied().unwrap_or_default()
    }
}

/// Enumerator over a fixed list of virtual devices.
#[derive(Debug, Default)]
pub struct VirtualBackend {
    devices: Vec<VirtualDevice>,
    open_handles: Arc<AtomicUsize>,
}

impl VirtualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device; returns its enumeration index.
    pub fn add(&mut self, device: VirtualDevice) -> usize {
        self.devices.push(device);
        self.devices.len() - 1
    }

    pub fn with(mut self, device: VirtualDevice) -> Self {
        self.add(device);
        self
    }

    /// Detach a device. Later devices shift down one index, like a replug.
    pub fn remove(&mut self, index: usize) -> Option<VirtualDevice> {
        (index < self.devices.len()).then(|| self.devices.remove(index))
    }

    /// Counter of currently open handles, shared with every handle this backend opens.
    pub fn open_counter(&self) -> OpenCounter {
        OpenCounter(Arc::clone(&self.open_handles))
    }
}

/// Read-only view of a backend's open-handle count.
#[derive(Clone, Debug)]
pub struct OpenCounter(Arc<AtomicUsize>);

impl OpenCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl DeviceEnumerator for VirtualBackend {
    fn enumerate(&mut self) -> Vec<RawDeviceInfo> {
        self.devices
            .iter()
            .enumerate()
            .map(|(index, dev)| RawDeviceInfo {
                caps: Some(dev.caps),
                path: Some(format!("virtual:{index}")),
                ..RawDeviceInfo::new(index, dev.name.clone())
            })
            .collect()
    }

    fn open(&mut self, index: usize) -> Result<Box<dyn RawDevice>, DeviceError> {
        let device = self.devices.get(index).ok_or(DeviceError::NotFound(index))?;
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(VirtualHandle {
            id: format!("virtual:{index}"),
            device: device.clone(),
            open_handles: Arc::clone(&self.open_handles),
        }))
    }
}

/// An open handle; closing is dropping.
struct VirtualHandle {
    id: String,
    device: VirtualDevice,
    open_handles: Arc<AtomicUsize>,
}

impl Drop for VirtualHandle {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RawDevice for VirtualHandle {
    fn name(&self) -> &str {
        &self.device.name
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn caps(&self) -> DeviceCaps {
        self.device.caps
    }

    // Virtual state is read live; nothing to drain.
    fn poll(&mut self) {}

    fn button(&self, index: u16) -> bool {
        self.device.read_button(index)
    }

    fn axis(&self, index: u16) -> f32 {
        self.device.read_axis(index)
    }

    fn hat(&self, index: u16) -> HatState {
        self.device.read_hat(index)
    }
}
