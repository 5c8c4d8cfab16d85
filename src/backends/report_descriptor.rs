//! HID report-descriptor decoder.
//!
//! Builds a per-device field map from the raw HID report descriptor and
//! decodes input reports with it. Works the same on every platform because it
//! only needs the descriptor bytes, not an OS parser. It handles:
//! - Buttons (usage page 0x09, or any 1-bit variable field)
//! - Axes (any bit width up to 32, signed or unsigned)
//! - Hat switches (Generic Desktop usage 0x39), as slots or degrees
//!
//! Array fields (keyboard-style usage arrays) and constant padding are skipped.
//!
//! ## Index assignment
//! Indices are assigned in descriptor order, separately per kind: the first
//! axis field is axis 0, the first button bit is button 0, and so on. The
//! order is stable for a given descriptor, which is what definitions rely on.
//!
//! ## Hat policy
//! Hats whose logical range is exactly 8 positions (`0..7` or `1..8`) are read
//! as slots; anything else is read as degrees and bucketed into 45° sectors.
//! Values outside the logical range (the HID "null state") are neutral.

use crate::channel::{DeviceCaps, HatState};
use crate::error::DeviceError;
use std::collections::HashMap;

const PAGE_GENERIC_DESKTOP: u16 = 0x01;
const PAGE_BUTTON: u16 = 0x09;
const USAGE_HAT_SWITCH: u16 = 0x39;

// Short item types.
const TYPE_MAIN: u8 = 0;
const TYPE_GLOBAL: u8 = 1;
const TYPE_LOCAL: u8 = 2;

// Main item tags.
const MAIN_INPUT: u8 = 0x8;
const MAIN_OUTPUT: u8 = 0x9;
const MAIN_COLLECTION: u8 = 0xA;
const MAIN_FEATURE: u8 = 0xB;
const MAIN_END_COLLECTION: u8 = 0xC;

// Global item tags.
const GLOBAL_USAGE_PAGE: u8 = 0x0;
const GLOBAL_LOGICAL_MIN: u8 = 0x1;
const GLOBAL_LOGICAL_MAX: u8 = 0x2;
const GLOBAL_REPORT_SIZE: u8 = 0x7;
const GLOBAL_REPORT_ID: u8 = 0x8;
const GLOBAL_REPORT_COUNT: u8 = 0x9;
const GLOBAL_PUSH: u8 = 0xA;
const GLOBAL_POP: u8 = 0xB;

// Local item tags.
const LOCAL_USAGE: u8 = 0x0;
const LOCAL_USAGE_MIN: u8 = 0x1;
const LOCAL_USAGE_MAX: u8 = 0x2;

const LONG_ITEM_PREFIX: u8 = 0xFE;

// Upper bound on fields taken from one main item.
const MAX_FIELDS_PER_ITEM: u32 = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FieldKind {
    Axis(u16),
    Button(u16),
    Hat { index: u16, degrees: bool },
}

#[derive(Clone, Debug)]
struct Field {
    report_id: u8,
    bit_offset: u32,
    bit_size: u32,
    logical_min: i32,
    logical_max: i32,
    kind: FieldKind,
}

#[derive(Clone, Copy, Debug, Default)]
struct Globals {
    usage_page: u16,
    logical_min: i32,
    logical_max_raw: u32,
    logical_max_size: usize,
    report_size: u32,
    report_count: u32,
    report_id: u8,
}

impl Globals {
    /// Logical max is signed only when logical min is negative; `0..0xFF`
    /// written as one byte would otherwise read as `0..-1`.
    fn logical_max(&self) -> i32 {
        if self.logical_min < 0 {
            sign_extend(self.logical_max_raw, self.logical_max_size as u32 * 8)
        } else {
            self.logical_max_raw as i32
        }
    }
}

#[derive(Debug, Default)]
struct Locals {
    usages: Vec<u32>,
    usage_min: Option<u32>,
    usage_max: Option<u32>,
}

impl Locals {
    /// Usage for the `i`-th element of a main item, as `(page, usage)`.
    fn usage(&self, i: u32, page: u16) -> (u16, u16) {
        let raw = if !self.usages.is_empty() {
            let at = (i as usize).min(self.usages.len() - 1);
            self.usages[at]
        } else if let Some(min) = self.usage_min {
            let max = self.usage_max.unwrap_or(min);
            min.saturating_add(i).min(max)
        } else {
            0
        };
        // Four-byte usages carry their own page in the high word.
        if raw > 0xFFFF {
            ((raw >> 16) as u16, (raw & 0xFFFF) as u16)
        } else {
            (page, raw as u16)
        }
    }
}

/// Decoded field map of one device.
#[derive(Clone, Debug, Default)]
pub struct ReportLayout {
    fields: Vec<Field>,
    uses_report_ids: bool,
    caps: DeviceCaps,
    max_payload_bits: u32,
}

impl ReportLayout {
    /// Parse a raw report descriptor.
    ///
    /// Fails if the descriptor is truncated or declares no usable input field.
    pub fn parse(descriptor: &[u8]) -> Result<Self, DeviceError> {
        let mut globals = Globals::default();
        let mut stack: Vec<Globals> = Vec::new();
        let mut locals = Locals::default();
        let mut cursors: HashMap<u8, u32> = HashMap::new();
        let mut layout = ReportLayout::default();

        let mut pos = 0usize;
        while pos < descriptor.len() {
            let prefix = descriptor[pos];
            pos += 1;

            if prefix == LONG_ITEM_PREFIX {
                let size = *descriptor
                    .get(pos)
                    .ok_or_else(|| truncated(pos))? as usize;
                pos += 2 + size;
                continue;
            }

            let size = match prefix & 0x03 {
                3 => 4,
                n => n as usize,
            };
            let data = descriptor
                .get(pos..pos + size)
                .ok_or_else(|| truncated(pos))?;
            pos += size;

            let value = read_le(data);
            let item_type = (prefix >> 2) & 0x03;
            let tag = prefix >> 4;

            match item_type {
                TYPE_MAIN => {
                    if tag == MAIN_INPUT {
                        let cursor = cursors.entry(globals.report_id).or_insert(0);
                        layout.push_input(value, &globals, &locals, cursor);
                        layout.max_payload_bits = layout.max_payload_bits.max(*cursor);
                    } else if !matches!(
                        tag,
                        MAIN_OUTPUT | MAIN_FEATURE | MAIN_COLLECTION | MAIN_END_COLLECTION
                    ) {
                        return Err(DeviceError::Descriptor(format!(
                            "unknown main item tag {tag:#x} at byte {pos}"
                        )));
                    }
                    locals = Locals::default();
                }
                TYPE_GLOBAL => match tag {
                    GLOBAL_USAGE_PAGE => globals.usage_page = value as u16,
                    GLOBAL_LOGICAL_MIN => globals.logical_min = sign_extend(value, size as u32 * 8),
                    GLOBAL_LOGICAL_MAX => {
                        globals.logical_max_raw = value;
                        globals.logical_max_size = size;
                    }
                    GLOBAL_REPORT_SIZE => globals.report_size = value,
                    GLOBAL_REPORT_ID => {
                        globals.report_id = value as u8;
                        layout.uses_report_ids = true;
                    }
                    GLOBAL_REPORT_COUNT => globals.report_count = value,
                    GLOBAL_PUSH => stack.push(globals),
                    GLOBAL_POP => {
                        globals = stack.pop().ok_or_else(|| {
                            DeviceError::Descriptor(format!("pop without push at byte {pos}"))
                        })?;
                    }
                    // Physical range, units and exponents do not affect decoding.
                    _ => {}
                },
                TYPE_LOCAL => match tag {
                    LOCAL_USAGE => locals.usages.push(with_page(value, size)),
                    LOCAL_USAGE_MIN => locals.usage_min = Some(with_page(value, size)),
                    LOCAL_USAGE_MAX => locals.usage_max = Some(with_page(value, size)),
                    _ => {}
                },
                _ => {}
            }
        }

        if layout.fields.is_empty() {
            return Err(DeviceError::Descriptor("no input axes, buttons or hats".into()));
        }
        Ok(layout)
    }

    fn push_input(&mut self, flags: u32, globals: &Globals, locals: &Locals, cursor: &mut u32) {
        let constant = flags & 0x01 != 0;
        let variable = flags & 0x02 != 0;
        let size = globals.report_size;
        let start = *cursor;
        *cursor = cursor.saturating_add(size.saturating_mul(globals.report_count));

        if constant || !variable || size == 0 || size > 32 {
            return;
        }

        let logical_min = globals.logical_min;
        let logical_max = globals.logical_max();

        for i in 0..globals.report_count.min(MAX_FIELDS_PER_ITEM) {
            let (page, usage) = locals.usage(i, globals.usage_page);
            let kind = if page == PAGE_BUTTON || size == 1 {
                match next_index(&mut self.caps.buttons) {
                    Some(index) => FieldKind::Button(index),
                    None => continue,
                }
            } else if page == PAGE_GENERIC_DESKTOP && usage == USAGE_HAT_SWITCH {
                match next_index(&mut self.caps.hats) {
                    Some(index) => FieldKind::Hat {
                        index,
                        degrees: !is_slot_range(logical_min, logical_max),
                    },
                    None => continue,
                }
            } else {
                match next_index(&mut self.caps.axes) {
                    Some(index) => FieldKind::Axis(index),
                    None => continue,
                }
            };

            self.fields.push(Field {
                report_id: globals.report_id,
                bit_offset: start.saturating_add(i * size),
                bit_size: size,
                logical_min,
                logical_max,
                kind,
            });
        }
    }

    pub fn caps(&self) -> DeviceCaps {
        self.caps
    }

    /// `true` if input reports start with a report-ID byte.
    pub fn uses_report_ids(&self) -> bool {
        self.uses_report_ids
    }

    /// Buffer size that fits the longest input report, including the ID byte.
    pub fn input_report_len(&self) -> usize {
        let payload = self.max_payload_bits.div_ceil(8) as usize;
        payload + usize::from(self.uses_report_ids)
    }

    /// Decode one input report into `state`.
    ///
    /// Fields of other report IDs are left untouched, as are fields that lie
    /// past the end of a short report.
    pub fn decode(&self, report: &[u8], state: &mut InputState) {
        let (report_id, payload) = if self.uses_report_ids {
            match report.split_first() {
                Some((&id, rest)) => (id, rest),
                None => return,
            }
        } else {
            (0, report)
        };

        for field in self.fields.iter().filter(|f| f.report_id == report_id) {
            let Some(raw) = extract_bits(payload, field.bit_offset, field.bit_size) else {
                continue;
            };
            let value = if field.logical_min < 0 {
                sign_extend(raw, field.bit_size)
            } else {
                raw as i32
            };

            match field.kind {
                FieldKind::Axis(i) => {
                    if let Some(axis) = state.axes.get_mut(usize::from(i)) {
                        *axis = normalize_axis_value(value, field.logical_min, field.logical_max);
                    }
                }
                FieldKind::Button(i) => {
                    if let Some(button) = state.buttons.get_mut(usize::from(i)) {
                        *button = value != 0;
                    }
                }
                FieldKind::Hat { index, degrees } => {
                    if let Some(hat) = state.hats.get_mut(usize::from(index)) {
                        let slot = hat_value_to_slot(value, field.logical_min, field.logical_max, degrees);
                        *hat = HatState::from_slot(slot);
                    }
                }
            }
        }
    }
}

/// Current channel values of one device.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputState {
    pub axes: Vec<f32>,
    pub buttons: Vec<bool>,
    pub hats: Vec<HatState>,
}

impl InputState {
    /// All-neutral state sized for `caps`.
    pub fn new(caps: DeviceCaps) -> Self {
        Self {
            axes: vec![0.0; usize::from(caps.axes)],
            buttons: vec![false; usize::from(caps.buttons)],
            hats: vec![HatState::NEUTRAL; usize::from(caps.hats)],
        }
    }
}

fn next_index(counter: &mut u16) -> Option<u16> {
    let index = *counter;
    *counter = counter.checked_add(1)?;
    Some(index)
}

fn truncated(pos: usize) -> DeviceError {
    DeviceError::Descriptor(format!("descriptor truncated at byte {pos}"))
}

fn read_le(data: &[u8]) -> u32 {
    data.iter()
        .rev()
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

/// Keep the size so a 4-byte usage can be told apart from a 2-byte one.
fn with_page(value: u32, size: usize) -> u32 {
    if size == 4 {
        value
    } else {
        value & 0xFFFF
    }
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    if bits == 0 || bits >= 32 {
        return value as i32;
    }
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// Read `size` bits starting at `offset` (LSB-first, little-endian bytes).
fn extract_bits(payload: &[u8], offset: u32, size: u32) -> Option<u32> {
    let end = offset.checked_add(size)?;
    if end as usize > payload.len() * 8 {
        return None;
    }
    let mut out = 0u64;
    for bit in 0..size {
        let at = offset + bit;
        let byte = payload[(at / 8) as usize];
        if byte >> (at % 8) & 1 != 0 {
            out |= 1 << bit;
        }
    }
    Some(out as u32)
}

fn is_slot_range(logical_min: i32, logical_max: i32) -> bool {
    (logical_min == 0 && logical_max == 7) || (logical_min == 1 && logical_max == 8)
}

/// Normalize an integer axis value from `[lo..hi]` into `[-1.0, 1.0]` with clamping.
fn normalize_axis_value(v: i32, lo: i32, hi: i32) -> f32 {
    let lo = f64::from(lo);
    let hi = f64::from(hi);
    if (hi - lo).abs() < 1e-9 {
        return 0.0;
    }
    let t = (f64::from(v) - lo) / (hi - lo);
    (t * 2.0 - 1.0).clamp(-1.0, 1.0) as f32
}

/// Convert a raw hat value into a slot: `-1` neutral, `0..7` clockwise from Up.
fn hat_value_to_slot(raw: i32, lo: i32, hi: i32, degrees: bool) -> i16 {
    if raw < lo || raw > hi {
        return -1;
    }
    if !degrees {
        return (raw - lo) as i16;
    }
    let deg = raw as f32;
    ((deg + 22.5) / 45.0).floor().rem_euclid(8.0) as i16
}
