//! Device definitions: how raw channels combine into named values.
//!
//! A [`DeviceTypeDefinition`] describes one device family: which enumerated
//! devices it binds to (per sub-device slot), which logical values it
//! produces and which script triggers it fires. Definitions are immutable once
//! built by the [`catalog`](crate::catalog).

use crate::channel::HatAxis;
use crate::pattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type name of the always-available keyboard definition.
pub const KEYBOARD_TYPE: &str = "keyboard";

/// Slot used by keyboard sources that have no physical sub-device.
pub const NO_SLOT: i32 = -1;

/// Platform keycode as reported by the host's key events.
pub type KeyCode = u32;

/// What raw signal a source reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawSourceKind {
    Button { index: u16 },
    Axis { index: u16 },
    Hat { index: u16, axis: HatAxis },
    ToggleButton { index: u16 },
    StateKey { keycode: KeyCode },
    ToggleKey { keycode: KeyCode },
}

impl RawSourceKind {
    /// Toggle kinds cycle through a value list instead of mapping a range.
    pub fn is_toggle(&self) -> bool {
        matches!(
            self,
            RawSourceKind::ToggleButton { .. } | RawSourceKind::ToggleKey { .. }
        )
    }

    /// Keyboard kinds read the pressed-key set and need no device handle.
    pub fn is_key(&self) -> bool {
        matches!(
            self,
            RawSourceKind::StateKey { .. } | RawSourceKind::ToggleKey { .. }
        )
    }

    /// Raw index or keycode, used to key per-source toggle state.
    pub fn raw_index(&self) -> u32 {
        match *self {
            RawSourceKind::Button { index }
            | RawSourceKind::Axis { index }
            | RawSourceKind::Hat { index, .. }
            | RawSourceKind::ToggleButton { index } => u32::from(index),
            RawSourceKind::StateKey { keycode } | RawSourceKind::ToggleKey { keycode } => keycode,
        }
    }
}

/// How a source's output joins the value it belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combine {
    #[default]
    Additive,
    Multiplicative,
}

/// One raw input feeding a logical value or trigger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueSourceDefinition {
    /// Sub-device slot within a compound device; [`NO_SLOT`] for keys.
    pub subdevice_slot: i32,
    pub kind: RawSourceKind,
    /// Axis dead zone in `[0, 1)`.
    pub dead_zone: f32,
    /// Output range `(low, high)`.
    pub range: (f32, f32),
    pub combine: Combine,
    /// Cyclic output values for toggle kinds; never empty for them.
    pub toggle_values: Vec<f32>,
}

impl ValueSourceDefinition {
    /// A source with the defaults of its kind: full range, no dead zone, additive.
    pub fn new(subdevice_slot: i32, kind: RawSourceKind) -> Self {
        let range = match kind {
            RawSourceKind::Axis { .. } | RawSourceKind::Hat { .. } => (-1.0, 1.0),
            _ => (0.0, 1.0),
        };
        let toggle_values = if kind.is_toggle() {
            vec![0.0, 1.0]
        } else {
            Vec::new()
        };
        Self {
            subdevice_slot,
            kind,
            dead_zone: 0.0,
            range,
            combine: Combine::Additive,
            toggle_values,
        }
    }

    pub fn with_dead_zone(mut self, dead_zone: f32) -> Self {
        self.dead_zone = clamp_dead_zone(dead_zone);
        self
    }

    pub fn with_range(mut self, low: f32, high: f32) -> Self {
        self.range = (low, high);
        self
    }

    pub fn with_combine(mut self, combine: Combine) -> Self {
        self.combine = combine;
        self
    }

    pub fn with_toggle_values(mut self, values: Vec<f32>) -> Self {
        self.toggle_values = values;
        self
    }
}

/// Dead zones of 1 or more would divide by zero when rescaling.
pub(crate) fn clamp_dead_zone(dead_zone: f32) -> f32 {
    if dead_zone.is_finite() {
        dead_zone.clamp(0.0, 0.999)
    } else {
        0.0
    }
}

/// A named value (or trigger) and the sources it is built from, in order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogicalValueDefinition {
    pub name: String,
    pub sources: Vec<ValueSourceDefinition>,
}

impl LogicalValueDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: ValueSourceDefinition) -> Self {
        self.sources.push(source);
        self
    }

    /// `true` if every source is a toggle, so the value only changes on toggle edges.
    pub fn is_toggle_derived(&self) -> bool {
        !self.sources.is_empty() && self.sources.iter().all(|s| s.kind.is_toggle())
    }
}

/// Everything known about one device family.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceTypeDefinition {
    pub name: String,
    /// Sub-device slot -> name patterns, tried in order.
    pub identify: BTreeMap<i32, Vec<String>>,
    /// Logical values in declaration order; names are unique.
    pub values: Vec<LogicalValueDefinition>,
    /// Script triggers in declaration order; names are unique.
    pub triggers: Vec<LogicalValueDefinition>,
}

impl DeviceTypeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_keyboard(&self) -> bool {
        self.name.eq_ignore_ascii_case(KEYBOARD_TYPE)
    }

    /// Append a pattern to a slot's identification list.
    pub fn with_pattern(mut self, slot: i32, pattern: impl Into<String>) -> Self {
        self.identify.entry(slot).or_default().push(pattern.into());
        self
    }

    pub fn with_value(mut self, value: LogicalValueDefinition) -> Self {
        upsert(&mut self.values, value);
        self
    }

    pub fn with_trigger(mut self, trigger: LogicalValueDefinition) -> Self {
        upsert(&mut self.triggers, trigger);
        self
    }

    pub fn value(&self, name: &str) -> Option<&LogicalValueDefinition> {
        self.values.iter().find(|v| v.name == name)
    }

    pub fn trigger(&self, name: &str) -> Option<&LogicalValueDefinition> {
        self.triggers.iter().find(|t| t.name == name)
    }

    /// `true` if any pattern of `slot` matches `device_name`.
    pub fn slot_matches(&self, slot: i32, device_name: &str) -> bool {
        self.identify
            .get(&slot)
            .is_some_and(|patterns| pattern::any_match(patterns, device_name))
    }
}

/// Replace a same-named entry in place, or append.
pub(crate) fn upsert(list: &mut Vec<LogicalValueDefinition>, value: LogicalValueDefinition) {
    match list.iter_mut().find(|v| v.name == value.name) {
        Some(existing) => *existing = value,
        None => list.push(value),
    }
}
