//! Raw channel conventions.
//!
//! Every backend reports device state through the same three channel kinds:
//!
//! - **Axes** are normalized to `[-1.0, 1.0]`.
//! - **Buttons** are plain booleans.
//! - **Hats** (POV/D-pad) are 8-way direction bitmasks ([`HatState`]). Backends
//!   that read hats as slots (`-1` neutral, `0..7` with Up = 0, clockwise)
//!   convert with [`HatState::from_slot`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw capability counts of a device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCaps {
    pub axes: u16,
    pub buttons: u16,
    pub hats: u16,
}

impl DeviceCaps {
    pub fn new(axes: u16, buttons: u16, hats: u16) -> Self {
        Self {
            axes,
            buttons,
            hats,
        }
    }
}

impl fmt::Display for DeviceCaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} axes, {} buttons, {} hats",
            self.axes, self.buttons, self.hats
        )
    }
}

/// Which direction of a hat a source reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HatAxis {
    Horizontal,
    Vertical,
}

/// 8-way hat position as a direction bitmask.
///
/// Diagonals set two adjacent bits. Opposite bits are never set together:
/// constructors drop conflicting pairs to neutral on that axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct HatState(u8);

impl HatState {
    pub const UP: u8 = 0x01;
    pub const RIGHT: u8 = 0x02;
    pub const DOWN: u8 = 0x04;
    pub const LEFT: u8 = 0x08;

    pub const NEUTRAL: HatState = HatState(0);

    /// Build from raw direction bits, resolving up+down and left+right to neutral.
    pub fn from_bits(bits: u8) -> Self {
        let mut bits = bits & (Self::UP | Self::RIGHT | Self::DOWN | Self::LEFT);
        if bits & (Self::UP | Self::DOWN) == Self::UP | Self::DOWN {
            bits &= !(Self::UP | Self::DOWN);
        }
        if bits & (Self::LEFT | Self::RIGHT) == Self::LEFT | Self::RIGHT {
            bits &= !(Self::LEFT | Self::RIGHT);
        }
        HatState(bits)
    }

    /// Convert a slot value (`-1` neutral, `0..7` = Up, Up-Right, ... clockwise).
    pub fn from_slot(slot: i16) -> Self {
        let bits = match slot {
            0 => Self::UP,
            1 => Self::UP | Self::RIGHT,
            2 => Self::RIGHT,
            3 => Self::DOWN | Self::RIGHT,
            4 => Self::DOWN,
            5 => Self::DOWN | Self::LEFT,
            6 => Self::LEFT,
            7 => Self::UP | Self::LEFT,
            _ => 0,
        };
        HatState(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_neutral(self) -> bool {
        self.0 == 0
    }

    /// Position along one axis: left/down = -1, right/up = +1, else 0.
    pub fn along(self, axis: HatAxis) -> f32 {
        match axis {
            HatAxis::Horizontal => {
                if self.0 & Self::LEFT != 0 {
                    -1.0
                } else if self.0 & Self::RIGHT != 0 {
                    1.0
                } else {
                    0.0
                }
            }
            HatAxis::Vertical => {
                if self.0 & Self::UP != 0 {
                    1.0
                } else if self.0 & Self::DOWN != 0 {
                    -1.0
                } else {
                    0.0
                }
            }
        }
    }
}
