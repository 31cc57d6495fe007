//! Vehicle control keys and axis multipliers.
//!
//! The core never polls a keyboard. Whoever captures local input implements
//! [`InputSampler`] and hands it to the vehicle tick.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Keys a vehicle listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlKey {
    Up,
    Down,
    Left,
    Right,
    Forward,
    Backward,
    Push,
    Pull,
    Dismount,
}

impl ControlKey {
    pub const ALL: [ControlKey; 9] = [
        ControlKey::Up,
        ControlKey::Down,
        ControlKey::Left,
        ControlKey::Right,
        ControlKey::Forward,
        ControlKey::Backward,
        ControlKey::Push,
        ControlKey::Pull,
        ControlKey::Dismount,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ControlKey::Up => "up",
            ControlKey::Down => "down",
            ControlKey::Left => "left",
            ControlKey::Right => "right",
            ControlKey::Forward => "forward",
            ControlKey::Backward => "backward",
            ControlKey::Push => "push",
            ControlKey::Pull => "pull",
            ControlKey::Dismount => "dismount",
        }
    }
}

impl FromStr for ControlKey {
    type Err = ControlKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ControlKey::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ControlKeyParseError::UnknownKey(s.to_string()))
    }
}

/// Error type for control key parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKeyParseError {
    UnknownKey(String),
}

impl fmt::Display for ControlKeyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlKeyParseError::UnknownKey(k) => write!(f, "unknown control key '{}'", k),
        }
    }
}

impl std::error::Error for ControlKeyParseError {}

/// Source of per-tick key states.
pub trait InputSampler {
    /// Whether the key is currently held.
    fn is_pressed(&self, key: ControlKey) -> bool;

    /// Whether the key went down since the last call (consumes the press).
    fn was_pressed(&mut self, key: ControlKey) -> bool;
}

/// Collapses two opposing keys into -1, 0 or 1.
pub fn movement_multiplier(positive: bool, negative: bool) -> f32 {
    if positive == negative {
        return 0.0;
    }
    if positive {
        1.0
    } else {
        -1.0
    }
}

/// Raw control multipliers, one per axis, each in {-1, 0, 1}.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlAxes {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl ControlAxes {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Reads the three axes from held keys. Airplanes steer pitch with
    /// push/pull instead of forward/backward.
    pub fn sample(input: &dyn InputSampler, airplane_controls: bool) -> Self {
        let (fwd, back) = if airplane_controls {
            (ControlKey::Push, ControlKey::Pull)
        } else {
            (ControlKey::Forward, ControlKey::Backward)
        };
        Self {
            x: movement_multiplier(
                input.is_pressed(ControlKey::Left),
                input.is_pressed(ControlKey::Right),
            ),
            y: movement_multiplier(
                input.is_pressed(ControlKey::Up),
                input.is_pressed(ControlKey::Down),
            ),
            z: movement_multiplier(input.is_pressed(fwd), input.is_pressed(back)),
        }
    }

    /// Clamps each component into [-1, 1]; used on untrusted inbound values.
    pub fn clamped(self) -> Self {
        Self::new(
            self.x.clamp(-1.0, 1.0),
            self.y.clamp(-1.0, 1.0),
            self.z.clamp(-1.0, 1.0),
        )
    }
}
