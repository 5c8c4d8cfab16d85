use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use proptest::prelude::*;
use stickmap::backends::virtual_input::{VirtualBackend, VirtualDevice};
use stickmap::backends::DeviceEnumerator;
use stickmap::channel::DeviceCaps;
use stickmap::pattern::wildcard_match;
use stickmap::source::{apply_dead_zone, remap_signed, resolve_source, TickContext};
use stickmap::toggle::{ToggleState, TOGGLE_DEBOUNCE};
use stickmap::{RawSourceKind, ValueSourceDefinition};

proptest! {
    #[test]
    fn dead_zone_output_stays_normalized(v in -1.0f32..=1.0, dz in 0.0f32..0.99) {
        let out = apply_dead_zone(v, dz);
        prop_assert!((-1.0..=1.0).contains(&out));
        if v.abs() <= dz {
            prop_assert_eq!(out, 0.0);
        } else {
            prop_assert!(out == 0.0 || out.signum() == v.signum());
        }
    }

    #[test]
    fn dead_zone_is_continuous_at_the_edge(dz in 0.0f32..0.95) {
        let just_outside = apply_dead_zone(dz + 1e-4, dz);
        prop_assert!(just_outside.abs() < 1e-2);
    }

    #[test]
    fn dead_zone_is_monotonic(a in -1.0f32..=1.0, b in -1.0f32..=1.0, dz in 0.0f32..0.99) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(apply_dead_zone(lo, dz) <= apply_dead_zone(hi, dz));
    }

    #[test]
    fn axis_inside_dead_zone_reads_the_image_of_zero(
        frac in 0.0f32..=1.0,
        dz in 0.01f32..0.9,
        low in -10.0f32..10.0,
        high in -10.0f32..10.0,
    ) {
        let raw = (frac * 2.0 - 1.0) * dz;
        let pad = VirtualDevice::new("Pad", DeviceCaps::new(1, 0, 0));
        pad.set_axis(0, raw);
        let mut backend = VirtualBackend::new().with(pad);
        let handle = backend.open(0).expect("virtual device opens");

        let source = ValueSourceDefinition::new(0, RawSourceKind::Axis { index: 0 })
            .with_dead_zone(dz)
            .with_range(low, high);
        let keys = HashSet::new();
        let ctx = TickContext { keys: &keys, pressed: &keys, now: Instant::now(), tick: 1, debounce: TOGGLE_DEBOUNCE };
        let out = resolve_source(Some(&*handle), &source, &mut BTreeMap::new(), &ctx).value;
        prop_assert!((out - remap_signed(0.0, low, high)).abs() < 1e-4);
    }

    #[test]
    fn toggle_index_stays_in_bounds(
        len in 1usize..6,
        events in proptest::collection::vec((any::<bool>(), 0u64..400), 0..64),
    ) {
        let mut state = ToggleState::new();
        let mut now = Instant::now();
        for (down, dt) in events {
            now += Duration::from_millis(dt);
            state.observe_button(down, len, now, TOGGLE_DEBOUNCE);
            prop_assert!(state.cycle_index() < len);
        }
        if len == 1 {
            prop_assert_eq!(state.cycle_index(), 0);
        }
    }

    #[test]
    fn holding_never_advances_twice(len in 2usize..6, ticks in 1usize..200, period_ms in 1u64..50) {
        let mut state = ToggleState::new();
        let start = Instant::now();
        for i in 0..ticks {
            state.observe_button(true, len, start + Duration::from_millis(period_ms * i as u64), TOGGLE_DEBOUNCE);
        }
        prop_assert_eq!(state.cycle_index(), 1);
    }

    #[test]
    fn star_matches_any_name(name in "[ -~]{0,24}") {
        prop_assert!(wildcard_match("*", &name));
        prop_assert!(wildcard_match(&name.to_uppercase(), &name.to_lowercase()) || name.contains(['*', '?']));
    }
}
