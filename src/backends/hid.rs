//! `hidapi` backend.
//!
//! Discovery keeps the list of game-control HID interfaces sorted by path so
//! enumeration indices stay stable while nothing is plugged or unplugged.
//! Names are read by opening each device briefly; nothing stays open after
//! [`enumerate`](DeviceEnumerator::enumerate).
//!
//! An opened [`HidRawDevice`] runs in non-blocking mode. Its report descriptor
//! is decoded once by [`ReportLayout`], and each `poll` drains at most
//! [`MAX_REPORTS_PER_TICK`] input reports into the current state.

use super::report_descriptor::{InputState, ReportLayout};
use super::DeviceEnumerator;
use crate::channel::{DeviceCaps, HatState};
use crate::device::RawDevice;
use crate::error::DeviceError;
use crate::metadata::RawDeviceInfo;
use hidapi::{DeviceInfo, HidApi, HidDevice};
use std::ffi::CString;
use tracing::{debug, info, trace, warn};

/// Maximum number of HID reports drained per `poll()` call.
///
/// Keeps a chatty device from stalling the tick if it produces data faster
/// than the host polls.
pub const MAX_REPORTS_PER_TICK: usize = 32;

const MAX_DESCRIPTOR_LEN: usize = 4096;
const FALLBACK_REPORT_LEN: usize = 64;

/// Decide whether a `hidapi` device entry is a game control.
///
/// Accepted usage pages:
/// - `0x01` Generic Desktop, except mouse (`0x02`) and keyboard (`0x06`)
/// - `0x02` Simulation Controls
/// - `0x0F` Physical Interface
/// - `0xFFxx` Vendor-defined
fn accept_device(info: &DeviceInfo) -> bool {
    accept_usage(info.usage_page(), info.usage())
}

fn accept_usage(page: u16, usage: u16) -> bool {
    match page {
        0x01 => !matches!(usage, 0x02 | 0x06),
        0x02 | 0x0F => true,
        p => p & 0xFF00 == 0xFF00,
    }
}

#[derive(Debug)]
struct HidEntry {
    path: CString,
    info: RawDeviceInfo,
}

/// Enumerator over attached HID game controls.
pub struct HidEnumerator {
    api: HidApi,
    entries: Vec<HidEntry>,
}

impl HidEnumerator {
    pub fn new() -> Result<Self, DeviceError> {
        Ok(Self {
            api: HidApi::new()?,
            entries: Vec::new(),
        })
    }

    fn probe(&self, info: &DeviceInfo, index: usize) -> RawDeviceInfo {
        let fallback = info.product_string().unwrap_or("Unknown HID device").to_string();
        let mut raw = RawDeviceInfo {
            vid: Some(info.vendor_id()),
            pid: Some(info.product_id()),
            path: Some(info.path().to_string_lossy().into_owned()),
            ..RawDeviceInfo::new(index, fallback)
        };

        // Opened only for the duration of this block.
        match info.open_device(&self.api) {
            Ok(device) => {
                if let Ok(Some(name)) = device.get_product_string() {
                    if !name.trim().is_empty() {
                        raw.name = name;
                    }
                }
                raw.caps = read_layout(&device).ok().map(|layout| layout.caps());
            }
            Err(e) => debug!(path = ?raw.path, error = %e, "could not open HID device for probing"),
        }
        raw
    }
}

impl DeviceEnumerator for HidEnumerator {
    fn enumerate(&mut self) -> Vec<RawDeviceInfo> {
        if let Err(e) = self.api.refresh_devices() {
            warn!(error = %e, "failed to refresh HID device list");
        }

        let mut accepted: Vec<&DeviceInfo> = self.api.device_list().filter(|d| accept_device(d)).collect();
        accepted.sort_by(|a, b| a.path().cmp(b.path()));
        // One physical interface may be listed once per top-level collection.
        accepted.dedup_by(|a, b| a.path() == b.path());

        let entries: Vec<HidEntry> = accepted
            .iter()
            .enumerate()
            .map(|(index, info)| HidEntry {
                path: info.path().to_owned(),
                info: self.probe(info, index),
            })
            .collect();

        debug!(count = entries.len(), "enumerated HID devices");
        self.entries = entries;
        self.entries.iter().map(|e| e.info.clone()).collect()
    }

    fn open(&mut self, index: usize) -> Result<Box<dyn RawDevice>, DeviceError> {
        let entry = self.entries.get(index).ok_or(DeviceError::NotFound(index))?;
        let device = self.api.open_path(&entry.path)?;
        if let Err(e) = device.set_blocking_mode(false) {
            warn!(device = %entry.info.name, error = %e, "could not switch HID device to non-blocking mode");
        }
        let layout = read_layout(&device)?;
        let id = match (entry.info.vid, entry.info.pid) {
            (Some(vid), Some(pid)) => format!("{vid:04x}:{pid:04x}:{}", entry.path.to_string_lossy()),
            _ => entry.path.to_string_lossy().into_owned(),
        };
        Ok(Box::new(HidRawDevice::new(id, entry.info.name.clone(), device, layout)))
    }
}

fn read_layout(device: &HidDevice) -> Result<ReportLayout, DeviceError> {
    let mut buf = [0u8; MAX_DESCRIPTOR_LEN];
    let len = device.get_report_descriptor(&mut buf)?;
    ReportLayout::parse(&buf[..len])
}

/// An open HID device. Dropping it closes the OS handle.
pub struct HidRawDevice {
    id: String,
    name: String,
    raw: HidDevice,
    layout: ReportLayout,
    state: InputState,
    buf: Vec<u8>,
    health: ReadHealth,
}

/// Latches read failures so an unplugged device is reported once, not every
/// tick.
#[derive(Debug, Default)]
struct ReadHealth {
    failing: bool,
}

impl ReadHealth {
    /// Returns `true` for the first failure of a run.
    fn failed(&mut self) -> bool {
        !std::mem::replace(&mut self.failing, true)
    }

    /// Returns `true` if this read ends a run of failures.
    fn recovered(&mut self) -> bool {
        std::mem::replace(&mut self.failing, false)
    }
}

impl HidRawDevice {
    fn new(id: String, name: String, raw: HidDevice, layout: ReportLayout) -> Self {
        let len = match layout.input_report_len() {
            0 => FALLBACK_REPORT_LEN,
            n => n,
        };
        Self {
            id,
            name,
            raw,
            state: InputState::new(layout.caps()),
            layout,
            buf: vec![0; len],
            health: ReadHealth::default(),
        }
    }
}

impl RawDevice for HidRawDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn caps(&self) -> DeviceCaps {
        self.layout.caps()
    }

    fn poll(&mut self) {
        for _ in 0..MAX_REPORTS_PER_TICK {
            let read = self.raw.read(&mut self.buf);
            if read.is_ok() && self.health.recovered() {
                info!(device = %self.id, "HID reads recovered");
            }
            match read {
                Ok(0) => break,
                Ok(n) => self.layout.decode(&self.buf[..n], &mut self.state),
                Err(e) => {
                    if self.health.failed() {
                        warn!(device = %self.id, error = %e, "HID read failed; device unplugged?");
                    } else {
                        trace!(device = %self.id, error = %e, "HID read still failing");
                    }
                    break;
                }
            }
        }
    }

    fn button(&self, index: u16) -> bool {
        self.state.buttons.get(usize::from(index)).copied().unwrap_or(false)
    }

    fn axis(&self, index: u16) -> f32 {
        self.state.axes.get(usize::from(index)).copied().unwrap_or(0.0)
    }

    fn hat(&self, index: u16) -> HatState {
        self.state.hats.get(usize::from(index)).copied().unwrap_or_default()
    }
}
