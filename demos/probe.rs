use std::time::{Duration, Instant};

use stickmap::{Manager, MapperConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // Optional first argument: path to a mapper config.
    let config = match std::env::args().nth(1) {
        Some(path) => MapperConfig::load(&path).expect("load mapper config"),
        None => MapperConfig::default(),
    };

    let mut mgr = Manager::discover(config);

    println!("Raw devices:");
    for info in mgr.raw_devices() {
        println!("- {info}");
    }
    println!("Available types: {:?}", mgr.list_available_device_type_names());

    if !mgr.bind_preferred(0) {
        eprintln!("nothing to bind; add definitions under ./devices");
        return;
    }
    println!("Bound 0 as {:?}", mgr.bound_type_name(0));

    let start = Instant::now();
    let mut last_print = start;
    while start.elapsed() < Duration::from_secs(10) {
        mgr.tick();

        for name in mgr.drain_triggered_script_names() {
            println!("trigger: {name}");
        }

        if last_print.elapsed() >= Duration::from_millis(250) {
            last_print = Instant::now();
            if let Some(values) = mgr.snapshot().get(0) {
                let line: Vec<String> = values.iter().map(|(k, v)| format!("{k}={v:+.2}")).collect();
                println!("{}", line.join(" "));
            }
        }

        // Sleep a touch to avoid pegging the CPU in the demo
        std::thread::sleep(Duration::from_millis(16));
    }
}
