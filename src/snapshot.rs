//! Per-tick snapshot of logical values.
//!
//! [`Snapshot`] is an **owned**, read-only view of every bound device's values
//! at a point in time (typically "after this tick"). It is produced by
//! [`Manager::snapshot`](crate::manager::Manager::snapshot) and is cheap to
//! clone for fan-out to multiple consumers.
//!
//! # Semantics
//! - Keys are the caller-assigned logical device ids.
//! - Values are [`DeviceValues`]: the bound type name plus `value name -> f32`.
//! - A snapshot is **immutable** and does not tick; take a new one after the
//!   next [`Manager::tick`](crate::manager::Manager::tick).
//!
//! # Examples
//! ```no_run
//! use stickmap::Snapshot;
//!
//! fn print_roll(snap: &Snapshot) {
//!     for (id, values) in snap.iter() {
//!         println!("{id} ({}): roll={:.2}", values.type_name(), values.get("roll"));
//!     }
//! }
//! ```

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Values of one bound device.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DeviceValues {
    type_name: String,
    values: BTreeMap<String, f32>,
}

impl DeviceValues {
    pub(crate) fn new(type_name: impl Into<String>, values: BTreeMap<String, f32>) -> Self {
        Self {
            type_name: type_name.into(),
            values,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Value by name; `0.0` when not declared.
    #[inline]
    pub fn get(&self, name: &str) -> f32 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    /// Iterate `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Owned snapshot of current values (`device id -> DeviceValues`).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Snapshot(pub HashMap<u32, DeviceValues>);

impl Snapshot {
    /// Values for a specific logical device id.
    #[inline]
    pub fn get(&self, device_id: u32) -> Option<&DeviceValues> {
        self.0.get(&device_id)
    }

    /// Shorthand for `get(id)` then `get(name)`; `0.0` when either is absent.
    pub fn value(&self, device_id: u32, name: &str) -> f32 {
        self.get(device_id).map_or(0.0, |v| v.get(name))
    }

    /// Iterate `(device id, values)` pairs.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&u32, &DeviceValues)> {
        self.0.iter()
    }

    /// Consume the snapshot and return the inner map.
    #[inline]
    pub fn into_inner(self) -> HashMap<u32, DeviceValues> {
        self.0
    }
}
