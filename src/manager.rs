//! The mapping engine.
//!
//! [`Manager`] owns the device enumerator, the definition catalog and every
//! bound device with its open handles. The host drives it from its frame
//! callback:
//!
//! ```
//! use stickmap::backends::virtual_input::{VirtualBackend, VirtualDevice};
//! use stickmap::channel::DeviceCaps;
//! use stickmap::definition::{DeviceTypeDefinition, LogicalValueDefinition, RawSourceKind, ValueSourceDefinition};
//! use stickmap::{DeviceCatalog, Manager};
//!
//! let pad = VirtualDevice::new("TestPad v2", DeviceCaps::new(2, 4, 0));
//! let catalog = DeviceCatalog::new().with(
//!     DeviceTypeDefinition::new("TestPad")
//!         .with_pattern(0, "TestPad*")
//!         .with_value(
//!             LogicalValueDefinition::new("roll")
//!                 .with_source(ValueSourceDefinition::new(0, RawSourceKind::Axis { index: 0 }).with_dead_zone(0.1)),
//!         ),
//! );
//!
//! let mut manager = Manager::new(catalog, VirtualBackend::new().with(pad.clone()));
//! assert!(manager.bind_best(1, &["TestPad"]));
//!
//! pad.set_axis(0, 0.55);
//! manager.tick();
//! assert!((manager.get_value(1, "roll") - 0.5).abs() < 1e-4);
//! ```
//!
//! # Tick order
//! Bound devices are processed in ascending id order. For each one the open
//! handles are polled, then every value is recomputed, then every trigger is
//! evaluated in declaration order. Trigger names are queued once per rising
//! edge across the threshold and handed out by
//! [`drain_triggered_script_names`](Manager::drain_triggered_script_names).
//!
//! # Keys
//! Keyboard sources read a key set. [`tick_with`](Manager::tick_with) takes it
//! explicitly; [`tick`](Manager::tick) uses the keys reported through
//! [`press_key`](Manager::press_key) / [`release_key`](Manager::release_key):
//! keys currently held plus any press seen since the previous tick, so a tap
//! that starts and ends between two ticks is still read once. Toggle keys
//! advance once per reported press, however long the key is held.

use crate::backends::{self, DeviceEnumerator};
use crate::catalog::DeviceCatalog;
use crate::config::MapperConfig;
use crate::definition::{Combine, DeviceTypeDefinition, KeyCode, LogicalValueDefinition};
use crate::device::RawDevice;
use crate::error::BindError;
use crate::matcher::{self, BindPlan};
use crate::metadata::RawDeviceInfo;
use crate::snapshot::{DeviceValues, Snapshot};
use crate::source::{resolve_source, toggle_id, TickContext};
use crate::toggle::{ToggleId, ToggleState};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

type Handles = BTreeMap<i32, Box<dyn RawDevice>>;

/// A logical device id bound to open hardware.
struct BoundDevice {
    definition: DeviceTypeDefinition,
    handles: Handles,
    /// Raw enumeration index behind each slot, for claim checks.
    raw_indices: BindPlan,
    values: BTreeMap<String, f32>,
    /// Toggle-derived values set by the caller; kept until one of their toggles advances.
    pinned: HashSet<String>,
    toggles: BTreeMap<ToggleId, ToggleState>,
    /// Parallel to `definition.triggers`.
    trigger_active: Vec<bool>,
}

impl BoundDevice {
    fn new(definition: DeviceTypeDefinition, handles: Handles, raw_indices: BindPlan) -> Self {
        let values = definition.values.iter().map(|v| (v.name.clone(), 0.0)).collect();
        let trigger_active = vec![false; definition.triggers.len()];
        Self {
            definition,
            handles,
            raw_indices,
            values,
            pinned: HashSet::new(),
            toggles: BTreeMap::new(),
            trigger_active,
        }
    }

    fn tick(&mut self, device_id: u32, ctx: &TickContext<'_>, threshold: f32, queue: &mut VecDeque<String>) {
        for handle in self.handles.values_mut() {
            handle.poll();
        }

        let Self {
            definition,
            handles,
            values,
            pinned,
            toggles,
            trigger_active,
            ..
        } = self;
        let mut advanced = HashSet::new();

        // Every value is resolved, pinned or not, so toggle state keeps tracking the hardware.
        let computed: Vec<f32> = definition
            .values
            .iter()
            .map(|value| combine(value, handles, toggles, ctx, &mut advanced))
            .collect();

        for (value, result) in definition.values.iter().zip(computed) {
            if pinned.contains(&value.name) {
                if !value.sources.iter().any(|s| advanced.contains(&toggle_id(s))) {
                    continue;
                }
                pinned.remove(&value.name);
            }
            if let Some(slot) = values.get_mut(&value.name) {
                *slot = result;
            }
        }

        for (trigger, active) in definition.triggers.iter().zip(trigger_active.iter_mut()) {
            let result = combine(trigger, handles, toggles, ctx, &mut advanced);
            if result > threshold {
                if !*active {
                    *active = true;
                    trace!(device_id, trigger = %trigger.name, result, "trigger fired");
                    queue.push_back(trigger.name.clone());
                }
            } else {
                *active = false;
            }
        }
    }
}

/// `sum(additive) * product(multiplicative)` over a value's sources.
fn combine(
    value: &LogicalValueDefinition,
    handles: &Handles,
    toggles: &mut BTreeMap<ToggleId, ToggleState>,
    ctx: &TickContext<'_>,
    advanced: &mut HashSet<ToggleId>,
) -> f32 {
    let mut sum = 0.0;
    let mut product = 1.0;
    for source in &value.sources {
        let handle = handles.get(&source.subdevice_slot).map(|h| &**h);
        let resolved = resolve_source(handle, source, toggles, ctx);
        if resolved.toggled {
            trace!(value = %value.name, slot = source.subdevice_slot, output = resolved.value, "toggle advanced");
            advanced.insert(toggle_id(source));
        }
        match source.combine {
            Combine::Additive => sum += resolved.value,
            Combine::Multiplicative => product *= resolved.value,
        }
    }
    sum * product
}

/// Open every planned slot, or nothing.
///
/// On failure the handles opened so far are dropped, which closes them.
fn open_plan(enumerator: &mut dyn DeviceEnumerator, definition: &DeviceTypeDefinition, plan: &BindPlan) -> Option<Handles> {
    let mut handles = Handles::new();
    for (&slot, &index) in plan {
        match enumerator.open(index) {
            Ok(handle) => {
                handles.insert(slot, handle);
            }
            Err(e) => {
                warn!(device_type = %definition.name, slot, index, error = %e, "failed to open device");
                return None;
            }
        }
    }
    Some(handles)
}

/// The device input-mapping engine.
pub struct Manager {
    enumerator: Box<dyn DeviceEnumerator>,
    catalog: DeviceCatalog,
    config: MapperConfig,
    bound: BTreeMap<u32, BoundDevice>,
    triggered: VecDeque<String>,
    held_keys: HashSet<KeyCode>,
    latched_keys: HashSet<KeyCode>,
    tick: u64,
}

impl Manager {
    pub fn new(catalog: DeviceCatalog, enumerator: impl DeviceEnumerator + 'static) -> Self {
        Self::with_config(catalog, enumerator, MapperConfig::default())
    }

    pub fn with_config(catalog: DeviceCatalog, enumerator: impl DeviceEnumerator + 'static, config: MapperConfig) -> Self {
        Self {
            enumerator: Box::new(enumerator),
            catalog,
            config,
            bound: BTreeMap::new(),
            triggered: VecDeque::new(),
            held_keys: HashSet::new(),
            latched_keys: HashSet::new(),
            tick: 0,
        }
    }

    /// Load the catalog from `config.definition_dirs` and open the default backend.
    pub fn discover(config: MapperConfig) -> Self {
        let catalog = config.load_catalog();
        info!(types = catalog.len(), "device catalog ready");
        Self::with_config(catalog, backends::probe_enumerator(), config)
    }

    pub fn catalog(&self) -> &DeviceCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Full enumeration records of the attached devices.
    pub fn raw_devices(&mut self) -> Vec<RawDeviceInfo> {
        self.enumerator.enumerate()
    }

    /// Attached devices as `index -> display name`.
    pub fn enumerate_raw_devices(&mut self) -> BTreeMap<usize, String> {
        self.enumerator
            .enumerate()
            .into_iter()
            .map(|info| (info.index, info.name))
            .collect()
    }

    /// Bind `device_id` to the first of `preferred` that matches live hardware.
    pub fn bind_best<S: AsRef<str>>(&mut self, device_id: u32, preferred: &[S]) -> bool {
        self.try_bind_best(device_id, preferred).is_ok()
    }

    pub fn try_bind_best<S: AsRef<str>>(&mut self, device_id: u32, preferred: &[S]) -> Result<(), BindError> {
        let names: Vec<String> = preferred.iter().map(|s| s.as_ref().to_string()).collect();
        if !self.bound.contains_key(&device_id) && !names.is_empty() && !names.iter().any(|n| self.catalog.contains(n)) {
            warn!(device_id, types = ?names, "none of the preferred device types is defined");
            return Err(BindError::UnknownType(names.join(", ")));
        }
        self.bind_candidates(device_id, &names)
    }

    /// Bind `device_id` to the first catalog type that matches live hardware,
    /// falling back to the keyboard type.
    pub fn bind_first_available(&mut self, device_id: u32) -> bool {
        self.try_bind_first_available(device_id).is_ok()
    }

    pub fn try_bind_first_available(&mut self, device_id: u32) -> Result<(), BindError> {
        let physical = self.catalog.iter().filter(|d| !d.is_keyboard());
        let keyboard = self.catalog.iter().filter(|d| d.is_keyboard());
        let names: Vec<String> = physical.chain(keyboard).map(|d| d.name.clone()).collect();
        self.bind_candidates(device_id, &names)
    }

    /// [`bind_best`](Self::bind_best) over `config.preferred_types`, or
    /// [`bind_first_available`](Self::bind_first_available) when that list is empty.
    pub fn bind_preferred(&mut self, device_id: u32) -> bool {
        self.try_bind_preferred(device_id).is_ok()
    }

    pub fn try_bind_preferred(&mut self, device_id: u32) -> Result<(), BindError> {
        if self.config.preferred_types.is_empty() {
            return self.try_bind_first_available(device_id);
        }
        let preferred = self.config.preferred_types.clone();
        self.try_bind_best(device_id, preferred.as_slice())
    }

    fn bind_candidates(&mut self, device_id: u32, names: &[String]) -> Result<(), BindError> {
        if self.bound.contains_key(&device_id) {
            warn!(device_id, "refusing to bind: id already bound");
            return Err(BindError::AlreadyBound(device_id));
        }

        let devices = self.enumerator.enumerate();
        let claimed: BTreeSet<usize> = self
            .bound
            .values()
            .flat_map(|b| b.raw_indices.values().copied())
            .collect();

        for name in names {
            let Some(definition) = self.catalog.get(name) else {
                debug!(device_id, device_type = %name, "skipping undefined device type");
                continue;
            };
            let Some(plan) = matcher::plan_bind(definition, &devices, &claimed) else {
                debug!(device_id, device_type = %definition.name, "no live device matched");
                continue;
            };
            let Some(handles) = open_plan(&mut *self.enumerator, definition, &plan) else {
                continue;
            };

            info!(device_id, device_type = %definition.name, slots = handles.len(), "bound device");
            let bound = BoundDevice::new(definition.clone(), handles, plan);
            self.bound.insert(device_id, bound);
            return Ok(());
        }

        warn!(device_id, candidates = names.len(), "no device type matched");
        Err(BindError::NoMatch(device_id))
    }

    /// Close every handle of `device_id` and forget the binding. No-op if unbound.
    pub fn release(&mut self, device_id: u32) {
        if let Some(bound) = self.bound.remove(&device_id) {
            info!(device_id, device_type = %bound.definition.name, "released device");
        }
    }

    pub fn is_bound(&self, device_id: u32) -> bool {
        self.bound.contains_key(&device_id)
    }

    pub fn bound_type_name(&self, device_id: u32) -> Option<&str> {
        self.bound.get(&device_id).map(|b| b.definition.name.as_str())
    }

    /// Bound ids with their type names, ascending by id.
    pub fn bound_devices(&self) -> Vec<(u32, &str)> {
        self.bound
            .iter()
            .map(|(&id, b)| (id, b.definition.name.as_str()))
            .collect()
    }

    /// Every type that could bind against the attached devices, plus the
    /// keyboard type if one is defined.
    pub fn list_available_device_type_names(&mut self) -> Vec<String> {
        let devices = self.enumerator.enumerate();
        let physical = self
            .catalog
            .iter()
            .filter(|d| !d.is_keyboard() && matcher::is_available(d, &devices));
        physical
            .chain(self.catalog.keyboard())
            .map(|d| d.name.clone())
            .collect()
    }

    /// Report a key going down. Repeats while the key is already held are ignored.
    pub fn press_key(&mut self, keycode: KeyCode) {
        if self.held_keys.insert(keycode) {
            self.latched_keys.insert(keycode);
        }
    }

    /// Report a key going up. A press not yet seen by a tick is still read once.
    pub fn release_key(&mut self, keycode: KeyCode) {
        self.held_keys.remove(&keycode);
    }

    /// Run one tick with the reported keys and the current time.
    ///
    /// State keys read every held key; toggle keys only advance on presses
    /// reported since the previous tick.
    pub fn tick(&mut self) {
        let pressed = std::mem::take(&mut self.latched_keys);
        let mut keys = pressed.clone();
        keys.extend(self.held_keys.iter().copied());
        self.run_tick(&keys, &pressed, Instant::now());
    }

    /// Run one tick with an explicit key set and timestamp.
    ///
    /// Every key in `keys` counts as held and as pressed, so a toggle key
    /// advances on each tick it is present.
    pub fn tick_with(&mut self, keys: &HashSet<KeyCode>, now: Instant) {
        self.run_tick(keys, keys, now);
    }

    fn run_tick(&mut self, keys: &HashSet<KeyCode>, pressed: &HashSet<KeyCode>, now: Instant) {
        self.tick = self.tick.wrapping_add(1);
        let ctx = TickContext {
            keys,
            pressed,
            now,
            tick: self.tick,
            debounce: self.config.toggle_debounce(),
        };
        let threshold = self.config.trigger_threshold;
        for (&id, device) in self.bound.iter_mut() {
            device.tick(id, &ctx, threshold, &mut self.triggered);
        }
    }

    /// Last computed value; `0.0` for unbound ids and undeclared names.
    pub fn get_value(&self, device_id: u32, name: &str) -> f32 {
        self.bound
            .get(&device_id)
            .and_then(|b| b.values.get(name))
            .copied()
            .unwrap_or(0.0)
    }

    /// Override a declared value.
    ///
    /// The override lasts until the next tick, except for values fed only by
    /// toggles, which keep it until one of their toggles advances. Returns
    /// `false` if the id is unbound or the value is not declared.
    pub fn set_value(&mut self, device_id: u32, name: &str, value: f32) -> bool {
        let Some(bound) = self.bound.get_mut(&device_id) else {
            return false;
        };
        let Some(definition) = bound.definition.value(name) else {
            return false;
        };
        if definition.is_toggle_derived() {
            bound.pinned.insert(name.to_string());
        }
        bound.values.insert(name.to_string(), value);
        true
    }

    /// Take every queued trigger name, oldest first.
    pub fn drain_triggered_script_names(&mut self) -> Vec<String> {
        self.triggered.drain(..).collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(
            self.bound
                .iter()
                .map(|(&id, b)| (id, DeviceValues::new(b.definition.name.clone(), b.values.clone())))
                .collect(),
        )
    }
}
