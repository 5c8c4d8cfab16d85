//! Slot resolution.
//!
//! Pure functions from a [`DeviceTypeDefinition`] and the live enumeration to
//! a bind plan (`slot -> raw index`). Opening the planned handles is the
//! manager's job; nothing here touches a device.

use crate::definition::{DeviceTypeDefinition, NO_SLOT};
use crate::metadata::RawDeviceInfo;
use crate::pattern::wildcard_match;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Planned `slot -> raw device index` assignment for one type.
pub type BindPlan = BTreeMap<i32, usize>;

/// Resolve every declared slot of `definition` against `devices`.
///
/// For each slot the patterns are tried in declaration order and the first
/// pattern with a hit wins; among its hits the lowest raw index is taken.
/// Indices in `claimed`, or already taken by an earlier slot of this plan,
/// are skipped.
///
/// Returns `None` if no slot matched, except for the keyboard type, which
/// binds without any physical device.
pub fn plan_bind(
    definition: &DeviceTypeDefinition,
    devices: &[RawDeviceInfo],
    claimed: &BTreeSet<usize>,
) -> Option<BindPlan> {
    let mut by_index: Vec<&RawDeviceInfo> = devices.iter().collect();
    by_index.sort_by_key(|d| d.index);

    let mut plan = BindPlan::new();
    for (&slot, patterns) in &definition.identify {
        if slot == NO_SLOT {
            continue;
        }
        let hit = patterns.iter().find_map(|pattern| {
            by_index.iter().find(|d| {
                !claimed.contains(&d.index)
                    && !plan.values().any(|&taken| taken == d.index)
                    && wildcard_match(pattern, &d.name)
            })
        });
        if let Some(device) = hit {
            debug!(device_type = %definition.name, slot, index = device.index, name = %device.name, "slot matched");
            plan.insert(slot, device.index);
        }
    }

    if plan.is_empty() && !definition.is_keyboard() {
        None
    } else {
        Some(plan)
    }
}

/// `true` if `definition` can bind against `devices` with nothing claimed.
pub fn is_available(definition: &DeviceTypeDefinition, devices: &[RawDeviceInfo]) -> bool {
    plan_bind(definition, devices, &BTreeSet::new()).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices(names: &[&str]) -> Vec<RawDeviceInfo> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| RawDeviceInfo::new(i, *n))
            .collect()
    }

    #[test]
    fn lowest_index_wins() {
        let def = DeviceTypeDefinition::new("Stick").with_pattern(0, "*Joystick*");
        let live = devices(&["Keyboard", "ACME Joystick Pro", "Other Joystick"]);
        let plan = plan_bind(&def, &live, &BTreeSet::new()).expect("matches");
        assert_eq!(plan.get(&0), Some(&1));
    }

    #[test]
    fn pattern_order_beats_index_order() {
        let def = DeviceTypeDefinition::new("Stick")
            .with_pattern(0, "Preferred*")
            .with_pattern(0, "*");
        let live = devices(&["Anything", "Preferred Stick"]);
        let plan = plan_bind(&def, &live, &BTreeSet::new()).expect("matches");
        assert_eq!(plan[&0], 1);
    }

    #[test]
    fn claimed_and_planned_indices_are_skipped() {
        let def = DeviceTypeDefinition::new("Twin")
            .with_pattern(0, "Pad*")
            .with_pattern(1, "Pad*");
        let live = devices(&["Pad A", "Pad B", "Pad C"]);

        let plan = plan_bind(&def, &live, &BTreeSet::new()).expect("matches");
        assert_eq!((plan[&0], plan[&1]), (0, 1));

        let claimed: BTreeSet<usize> = [0].into_iter().collect();
        let plan = plan_bind(&def, &live, &claimed).expect("matches");
        assert_eq!((plan[&0], plan[&1]), (1, 2));
    }

    #[test]
    fn partial_match_still_binds() {
        let def = DeviceTypeDefinition::new("Cockpit")
            .with_pattern(0, "Stick*")
            .with_pattern(1, "Throttle*");
        let plan = plan_bind(&def, &devices(&["Stick X"]), &BTreeSet::new()).expect("one slot is enough");
        assert_eq!(plan.len(), 1);
        assert!(!plan.contains_key(&1));
    }

    #[test]
    fn keyboard_needs_no_hardware() {
        let keyboard = DeviceTypeDefinition::new("Keyboard");
        let stick = DeviceTypeDefinition::new("Stick").with_pattern(0, "Stick*");
        assert_eq!(plan_bind(&keyboard, &[], &BTreeSet::new()), Some(BindPlan::new()));
        assert!(plan_bind(&stick, &devices(&["Wheel"]), &BTreeSet::new()).is_none());
        assert!(is_available(&keyboard, &[]));
        assert!(!is_available(&stick, &[]));
    }

    #[test]
    fn slotless_patterns_never_match() {
        let def = DeviceTypeDefinition::new("Odd").with_pattern(NO_SLOT, "*");
        assert!(plan_bind(&def, &devices(&["Anything"]), &BTreeSet::new()).is_none());
    }
}
