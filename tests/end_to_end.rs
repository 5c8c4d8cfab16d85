use std::collections::HashSet;
use std::time::{Duration, Instant};

use stickmap::backends::virtual_input::{OpenCounter, VirtualBackend, VirtualDevice};
use stickmap::backends::DeviceEnumerator;
use stickmap::channel::DeviceCaps;
use stickmap::{BindError, DeviceCatalog, DeviceError, KeyCode, Manager, RawDevice, RawDeviceInfo};

const DEFINITIONS: &str = r#"
[[device]]
name = "TestPad"

[[device.identify]]
slot = 0
patterns = ["TestPad*"]

[[device.value]]
name = "roll"
  [[device.value.source]]
  kind = "axis"
  index = 0
  dead_zone = 0.1

[[device.value]]
name = "gear"
  [[device.value.source]]
  kind = "toggle_button"
  index = 0
  values = [0.0, 0.5, 1.0]

[[device.value]]
name = "mode"
  [[device.value.source]]
  kind = "toggle_key"
  keycode = 77
  values = [1, 2, 3]

[[device.trigger]]
name = "fire_script"
  [[device.trigger.source]]
  kind = "button"
  index = 1

[[device]]
name = "Twin"

[[device.identify]]
slot = 0
pattern = "Twin*"

[[device.identify]]
slot = 1
pattern = "Twin*"

[[device]]
name = "keyboard"

[[device.value]]
name = "throttle_up"
  [[device.value.source]]
  kind = "state_key"
  keycode = 87

[[device.value]]
name = "lights"
  [[device.value.source]]
  kind = "toggle_key"
  keycode = 76
  values = [0.0, 1.0]
"#;

const PAD: u32 = 1;

fn catalog() -> DeviceCatalog {
    DeviceCatalog::from_toml_str(DEFINITIONS).expect("test definitions parse")
}

fn pad_setup() -> (Manager, VirtualDevice, OpenCounter) {
    let pad = VirtualDevice::new("TestPad v2", DeviceCaps::new(2, 4, 1));
    let backend = VirtualBackend::new().with(pad.clone());
    let counter = backend.open_counter();
    let mut manager = Manager::new(catalog(), backend);
    assert!(manager.bind_best(PAD, &["TestPad"]));
    (manager, pad, counter)
}

fn no_keys() -> HashSet<KeyCode> {
    HashSet::new()
}

#[test]
fn axis_dead_zone_end_to_end() {
    let (mut manager, pad, _) = pad_setup();
    assert_eq!(manager.bound_type_name(PAD), Some("TestPad"));

    pad.set_axis(0, 0.05);
    manager.tick();
    assert_eq!(manager.get_value(PAD, "roll"), 0.0);

    pad.set_axis(0, 0.55);
    manager.tick();
    assert!((manager.get_value(PAD, "roll") - 0.5).abs() < 1e-4);

    pad.set_axis(0, -1.0);
    manager.tick();
    assert_eq!(manager.get_value(PAD, "roll"), -1.0);
}

#[test]
fn trigger_drains_once_per_rising_edge() {
    let (mut manager, pad, _) = pad_setup();

    pad.press_button(1);
    for _ in 0..3 {
        manager.tick();
    }
    assert_eq!(manager.drain_triggered_script_names(), vec!["fire_script"]);
    assert!(manager.drain_triggered_script_names().is_empty());

    pad.release_button(1);
    manager.tick();
    assert!(manager.drain_triggered_script_names().is_empty());

    pad.press_button(1);
    manager.tick();
    assert_eq!(manager.drain_triggered_script_names(), vec!["fire_script"]);
}

#[test]
fn keyboard_is_the_fallback() {
    let mut manager = Manager::new(catalog(), VirtualBackend::new());
    assert!(manager.bind_first_available(5));
    assert_eq!(manager.bound_type_name(5), Some("keyboard"));

    manager.press_key(87);
    manager.tick();
    assert_eq!(manager.get_value(5, "throttle_up"), 1.0);
    manager.tick();
    assert_eq!(manager.get_value(5, "throttle_up"), 1.0, "still held");

    manager.release_key(87);
    manager.tick();
    assert_eq!(manager.get_value(5, "throttle_up"), 0.0);

    // A tap between two ticks is read exactly once.
    manager.press_key(87);
    manager.release_key(87);
    manager.tick();
    assert_eq!(manager.get_value(5, "throttle_up"), 1.0);
    manager.tick();
    assert_eq!(manager.get_value(5, "throttle_up"), 0.0);
}

#[test]
fn held_toggle_key_advances_once_per_press() {
    let mut manager = Manager::new(catalog(), VirtualBackend::new());
    assert!(manager.bind_first_available(0));

    manager.press_key(76);
    let mut seen = Vec::new();
    for _ in 0..3 {
        manager.tick();
        seen.push(manager.get_value(0, "lights"));
    }
    // Key repeat while held is not a new press.
    manager.press_key(76);
    manager.tick();
    seen.push(manager.get_value(0, "lights"));
    manager.release_key(76);
    manager.tick();
    seen.push(manager.get_value(0, "lights"));
    assert_eq!(seen, vec![1.0, 1.0, 1.0, 1.0, 1.0]);

    manager.press_key(76);
    manager.tick();
    assert_eq!(manager.get_value(0, "lights"), 0.0);

    // A tap between two ticks still advances once.
    manager.release_key(76);
    manager.tick();
    manager.press_key(76);
    manager.release_key(76);
    manager.tick();
    manager.tick();
    assert_eq!(manager.get_value(0, "lights"), 1.0);
}

#[test]
fn shipped_keyboard_lights_hold_steady_while_held() {
    let mut catalog = DeviceCatalog::new();
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/devices/keyboard.toml");
    assert_eq!(catalog.load_file(path).expect("keyboard.toml is readable"), 0);
    let mut manager = Manager::new(catalog, VirtualBackend::new());
    assert!(manager.bind_first_available(0));

    manager.press_key(0x4C);
    let mut seen = Vec::new();
    for _ in 0..3 {
        manager.tick();
        seen.push(manager.get_value(0, "lights"));
    }
    manager.release_key(0x4C);
    manager.tick();
    seen.push(manager.get_value(0, "lights"));
    assert_eq!(seen, vec![1.0, 1.0, 1.0, 1.0]);
}

#[test]
fn first_available_prefers_physical_devices() {
    let (mut manager, _, _) = pad_setup();
    manager.release(PAD);
    assert!(manager.bind_first_available(PAD));
    assert_eq!(manager.bound_type_name(PAD), Some("TestPad"));
}

#[test]
fn release_then_rebind() {
    let (mut manager, _, counter) = pad_setup();
    assert_eq!(counter.get(), 1);

    manager.release(PAD);
    assert!(!manager.is_bound(PAD));
    assert_eq!(counter.get(), 0);
    manager.release(PAD);

    assert!(manager.bind_best(PAD, &["TestPad"]));
    assert_eq!(counter.get(), 1);

    drop(manager);
    assert_eq!(counter.get(), 0);
}

#[test]
fn already_bound_id_is_refused() {
    let (mut manager, _, counter) = pad_setup();
    assert!(!manager.bind_best(PAD, &["TestPad"]));
    assert!(matches!(
        manager.try_bind_first_available(PAD),
        Err(BindError::AlreadyBound(PAD))
    ));
    assert_eq!(manager.bound_type_name(PAD), Some("TestPad"));
    assert_eq!(counter.get(), 1);
}

/// Opens like the wrapped backend, except the device at `fail_at`.
struct FailingOpen {
    inner: VirtualBackend,
    fail_at: usize,
}

impl DeviceEnumerator for FailingOpen {
    fn enumerate(&mut self) -> Vec<RawDeviceInfo> {
        self.inner.enumerate()
    }

    fn open(&mut self, index: usize) -> Result<Box<dyn RawDevice>, DeviceError> {
        if index == self.fail_at {
            return Err(DeviceError::NotFound(index));
        }
        self.inner.open(index)
    }
}

#[test]
fn failed_bind_leaves_no_handle_open() {
    let inner = VirtualBackend::new()
        .with(VirtualDevice::new("Twin Left", DeviceCaps::new(1, 1, 0)))
        .with(VirtualDevice::new("Twin Right", DeviceCaps::new(1, 1, 0)));
    let counter = inner.open_counter();
    let mut manager = Manager::new(catalog(), FailingOpen { inner, fail_at: 1 });

    assert!(matches!(manager.try_bind_best(3, &["Twin"]), Err(BindError::NoMatch(3))));
    assert!(!manager.is_bound(3));
    assert_eq!(counter.get(), 0);

    assert!(!manager.bind_best(3, &["TestPad"]));
    assert_eq!(counter.get(), 0);
}

#[test]
fn unmatched_preferences_fall_through_in_order() {
    let (mut manager, _, _) = pad_setup();
    manager.release(PAD);
    assert!(manager.bind_best(PAD, &["Unknown", "Twin", "TestPad"]));
    assert_eq!(manager.bound_type_name(PAD), Some("TestPad"));
}

#[test]
fn toggle_button_advances_once_per_press() {
    let (mut manager, pad, _) = pad_setup();
    let t0 = Instant::now();
    let at = |ms: u64| t0 + Duration::from_millis(ms);

    manager.tick_with(&no_keys(), at(0));
    assert_eq!(manager.get_value(PAD, "gear"), 0.0);

    pad.press_button(0);
    for ms in (0..1000).step_by(16) {
        manager.tick_with(&no_keys(), at(ms));
        assert_eq!(manager.get_value(PAD, "gear"), 0.5);
    }

    pad.release_button(0);
    manager.tick_with(&no_keys(), at(1100));
    pad.press_button(0);
    manager.tick_with(&no_keys(), at(1150));
    assert_eq!(manager.get_value(PAD, "gear"), 1.0);

    // Bounce inside the debounce window.
    pad.release_button(0);
    manager.tick_with(&no_keys(), at(1200));
    pad.press_button(0);
    manager.tick_with(&no_keys(), at(1250));
    assert_eq!(manager.get_value(PAD, "gear"), 1.0);

    pad.release_button(0);
    manager.tick_with(&no_keys(), at(1500));
    pad.press_button(0);
    manager.tick_with(&no_keys(), at(1600));
    assert_eq!(manager.get_value(PAD, "gear"), 0.0, "wraps around");
}

#[test]
fn toggle_key_advances_each_tick_held() {
    let (mut manager, _, _) = pad_setup();
    let held: HashSet<KeyCode> = [77].into_iter().collect();
    let now = Instant::now();

    manager.tick_with(&no_keys(), now);
    assert_eq!(manager.get_value(PAD, "mode"), 1.0);
    manager.tick_with(&held, now);
    assert_eq!(manager.get_value(PAD, "mode"), 2.0);
    manager.tick_with(&held, now);
    assert_eq!(manager.get_value(PAD, "mode"), 3.0);
    manager.tick_with(&no_keys(), now);
    assert_eq!(manager.get_value(PAD, "mode"), 3.0);
    manager.tick_with(&held, now);
    assert_eq!(manager.get_value(PAD, "mode"), 1.0);
}

#[test]
fn set_value_overrides() {
    let (mut manager, pad, _) = pad_setup();
    let t0 = Instant::now();

    // Plain values: until the next tick.
    assert!(manager.set_value(PAD, "roll", 0.9));
    assert_eq!(manager.get_value(PAD, "roll"), 0.9);
    manager.tick_with(&no_keys(), t0);
    assert_eq!(manager.get_value(PAD, "roll"), 0.0);

    // Toggle-derived values: until the toggle advances.
    assert!(manager.set_value(PAD, "gear", 0.75));
    for ms in [16, 32, 48] {
        manager.tick_with(&no_keys(), t0 + Duration::from_millis(ms));
        assert_eq!(manager.get_value(PAD, "gear"), 0.75);
    }
    pad.press_button(0);
    manager.tick_with(&no_keys(), t0 + Duration::from_millis(64));
    assert_eq!(manager.get_value(PAD, "gear"), 0.5);

    assert!(!manager.set_value(PAD, "undeclared", 1.0));
    assert_eq!(manager.get_value(PAD, "undeclared"), 0.0);
}

#[test]
fn snapshot_and_listing() {
    let (mut manager, pad, _) = pad_setup();
    pad.set_axis(0, 1.0);
    manager.tick();

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.value(PAD, "roll"), 1.0);
    assert_eq!(snapshot.get(PAD).map(|v| v.type_name()), Some("TestPad"));
    assert_eq!(manager.bound_devices(), vec![(PAD, "TestPad")]);

    assert_eq!(manager.enumerate_raw_devices().get(&0).map(String::as_str), Some("TestPad v2"));
    assert_eq!(manager.list_available_device_type_names(), vec!["TestPad", "keyboard"]);
}

#[test]
fn shipped_definitions_load_cleanly() {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/devices");
    let mut catalog = DeviceCatalog::new();
    let skipped = catalog.load_dir(dir).expect("devices directory is readable");
    assert_eq!(skipped, 0);
    assert!(catalog.keyboard().is_some());
    assert!(catalog.len() >= 2);
}
