//! Per-source transforms.
//!
//! [`resolve_source`] turns one raw signal into the contribution of one
//! [`ValueSourceDefinition`]: dead zone and range remapping for axes, linear
//! mapping for buttons and hats, level sensing for state keys and cycling for
//! toggles.

use crate::definition::{KeyCode, RawSourceKind, ValueSourceDefinition};
use crate::device::RawDevice;
use crate::toggle::{ToggleId, ToggleState};
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

/// Inputs shared by every source resolved during one tick.
#[derive(Clone, Copy, Debug)]
pub struct TickContext<'a> {
    /// Keys held this tick.
    pub keys: &'a HashSet<KeyCode>,
    /// Keys that went down since the previous tick; toggle keys advance on these.
    pub pressed: &'a HashSet<KeyCode>,
    /// Monotonic time of this tick.
    pub now: Instant,
    /// Tick counter, used so a toggle key advances once per tick.
    pub tick: u64,
    /// Toggle-button debounce interval.
    pub debounce: Duration,
}

/// Output of one source.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Resolved {
    pub value: f32,
    /// `true` if a toggle advanced while resolving.
    pub toggled: bool,
}

impl Resolved {
    fn value(value: f32) -> Self {
        Self {
            value,
            toggled: false,
        }
    }
}

/// Resolve one source.
///
/// `handle` is the open device for the source's slot, if any; device-backed
/// kinds read as `0.0` without one. Toggle state is created on first read.
pub fn resolve_source(
    handle: Option<&dyn RawDevice>,
    source: &ValueSourceDefinition,
    toggles: &mut BTreeMap<ToggleId, ToggleState>,
    ctx: &TickContext<'_>,
) -> Resolved {
    if source.kind.is_key() {
        return resolve_key(source, toggles, ctx);
    }
    match handle {
        Some(device) => resolve_device(device, source, toggles, ctx),
        None => Resolved::default(),
    }
}

fn resolve_key(
    source: &ValueSourceDefinition,
    toggles: &mut BTreeMap<ToggleId, ToggleState>,
    ctx: &TickContext<'_>,
) -> Resolved {
    let (low, high) = source.range;
    match source.kind {
        RawSourceKind::StateKey { keycode } => {
            let held = ctx.keys.contains(&keycode);
            Resolved::value(if held { high } else { low })
        }
        RawSourceKind::ToggleKey { keycode } => {
            let pressed = ctx.pressed.contains(&keycode);
            let state = toggles.entry(toggle_id(source)).or_default();
            let toggled = state.observe_key(pressed, source.toggle_values.len(), ctx.tick, ctx.now);
            Resolved {
                value: state.current(&source.toggle_values),
                toggled,
            }
        }
        _ => Resolved::default(),
    }
}

fn resolve_device(
    device: &dyn RawDevice,
    source: &ValueSourceDefinition,
    toggles: &mut BTreeMap<ToggleId, ToggleState>,
    ctx: &TickContext<'_>,
) -> Resolved {
    let (low, high) = source.range;
    match source.kind {
        RawSourceKind::Button { index } => {
            let down = if device.button(index) { 1.0 } else { 0.0 };
            Resolved::value(remap_unit(down, low, high))
        }
        RawSourceKind::Axis { index } => {
            let raw = device.axis(index).clamp(-1.0, 1.0);
            Resolved::value(remap_signed(apply_dead_zone(raw, source.dead_zone), low, high))
        }
        RawSourceKind::Hat { index, axis } => {
            Resolved::value(remap_signed(device.hat(index).along(axis), low, high))
        }
        RawSourceKind::ToggleButton { index } => {
            let state = toggles.entry(toggle_id(source)).or_default();
            let toggled = state.observe_button(
                device.button(index),
                source.toggle_values.len(),
                ctx.now,
                ctx.debounce,
            );
            Resolved {
                value: state.current(&source.toggle_values),
                toggled,
            }
        }
        // Keys are never read from a device.
        RawSourceKind::StateKey { .. } | RawSourceKind::ToggleKey { .. } => Resolved::default(),
    }
}

/// Toggle state key for a source.
pub fn toggle_id(source: &ValueSourceDefinition) -> ToggleId {
    ToggleId {
        slot: source.subdevice_slot,
        raw_index: source.kind.raw_index(),
        keyed: source.kind.is_key(),
    }
}

/// Zero inside the dead zone; outside, rescale so the edge maps to 0 and ±1 stays ±1.
pub fn apply_dead_zone(value: f32, dead_zone: f32) -> f32 {
    let magnitude = value.abs();
    if magnitude <= dead_zone {
        return 0.0;
    }
    let scaled = ((magnitude - dead_zone) / (1.0 - dead_zone)).clamp(0.0, 1.0);
    scaled.copysign(value)
}

/// Map `[-1, 1]` linearly onto `[low, high]`.
pub fn remap_signed(value: f32, low: f32, high: f32) -> f32 {
    low + (value + 1.0) * 0.5 * (high - low)
}

/// Map `[0, 1]` linearly onto `[low, high]`.
pub fn remap_unit(value: f32, low: f32, high: f32) -> f32 {
    low + value * (high - low)
}
