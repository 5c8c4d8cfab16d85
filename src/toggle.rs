//! Toggle state machine.
//!
//! Toggle sources cycle through a list of output values. Each (slot, raw
//! source) pair owns one [`ToggleState`] for the lifetime of its bound device:
//!
//! ```text
//!            raw down (may advance)
//! Released ─────────────────────────► Pressed
//!    ▲                                   │
//!    └───────────────────────────────────┘
//!            raw up (never advances)
//! ```
//!
//! Toggle buttons only advance on a rising edge that is at least the debounce
//! interval after the previous toggle. Toggle keys advance once per tick in
//! which the key is reported pressed; the manager reports a press once per
//! key-down.

use std::time::{Duration, Instant};

/// Minimum time between two toggle-button advances.
pub const TOGGLE_DEBOUNCE: Duration = Duration::from_millis(200);

/// Identifies the toggle state a source reads.
///
/// Several values may read the same physical toggle; they share one state so
/// the toggle advances once per press regardless of how often it is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToggleId {
    pub slot: i32,
    pub raw_index: u32,
    pub keyed: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToggleState {
    currently_down: bool,
    cycle_index: usize,
    /// `None` means "never toggled", so the first press is never debounced.
    last_toggle: Option<Instant>,
    /// Tick in which a toggle key last advanced.
    last_key_tick: Option<u64>,
}

impl ToggleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self) -> bool {
        self.currently_down
    }

    pub fn cycle_index(&self) -> usize {
        self.cycle_index
    }

    pub fn last_toggle(&self) -> Option<Instant> {
        self.last_toggle
    }

    /// Feed a toggle button reading. Returns `true` if the index advanced.
    pub fn observe_button(&mut self, down: bool, len: usize, now: Instant, debounce: Duration) -> bool {
        let rising = down && !self.currently_down;
        self.currently_down = down;
        if !rising {
            return false;
        }
        if let Some(last) = self.last_toggle {
            if now.saturating_duration_since(last) < debounce {
                return false;
            }
        }
        self.advance(len);
        self.last_toggle = Some(now);
        true
    }

    /// Feed a toggle key reading for `tick`. Returns `true` if the index advanced.
    ///
    /// `pressed` means the key went down since the previous tick. Advances at
    /// most once per tick, however many sources read this key.
    pub fn observe_key(&mut self, pressed: bool, len: usize, tick: u64, now: Instant) -> bool {
        self.currently_down = pressed;
        if !pressed || self.last_key_tick == Some(tick) {
            return false;
        }
        self.last_key_tick = Some(tick);
        self.advance(len);
        self.last_toggle = Some(now);
        true
    }

    /// The current output for a value list.
    pub fn current(&self, values: &[f32]) -> f32 {
        if values.is_empty() {
            0.0
        } else {
            values[self.cycle_index % values.len()]
        }
    }

    fn advance(&mut self, len: usize) {
        self.cycle_index = if len == 0 {
            0
        } else {
            (self.cycle_index + 1) % len
        };
    }
}
