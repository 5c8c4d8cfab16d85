use stickmap::backends::virtual_input::{VirtualBackend, VirtualDevice};
use stickmap::channel::DeviceCaps;
use stickmap::{DeviceCatalog, Manager};

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

[[device.trigger]]
name = "fire_script"
  [[device.trigger.source]]
  kind = "button"
  index = 1
"#;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let catalog = DeviceCatalog::from_toml_str(DEFINITIONS).expect("parse definitions");
    let pad = VirtualDevice::new("TestPad v2", DeviceCaps::new(2, 4, 1));
    let mut mgr = Manager::new(catalog, VirtualBackend::new().with(pad.clone()));

    assert!(mgr.bind_best(1, &["TestPad"]));

    for (step, raw) in [0.0, 0.05, 0.3, 0.55, 1.0, -0.55].into_iter().enumerate() {
        pad.set_axis(0, raw);
        pad.set_button(1, step % 3 == 2);
        mgr.tick();
        println!(
            "raw={raw:+.2} roll={:+.3} triggers={:?}",
            mgr.get_value(1, "roll"),
            mgr.drain_triggered_script_names()
        );
    }
}
