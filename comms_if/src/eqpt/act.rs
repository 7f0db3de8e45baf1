//! # Actuator Equipment Commands
//!
//! Commands sent over the actuator link are newline-delimited JSON, one [`ActCmd`] per line.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Largest power level the actuator accepts on a single axis.
pub const POWER_MAX: i32 = 255;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A movement demand for the actuator.
///
/// The magnitude of each axis is the power level to apply, the sign the direction. Screen
/// conventions apply: `+x` is right and `+y` is down.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MoveDemand {
    pub x: i32,
    pub y: i32,
}

/// Per-direction power limits applied to every demand before it is sent.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct PowerLimits {
    pub up: i32,
    pub down: i32,
    pub left: i32,
    pub right: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command sent over the actuator link.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActCmd {
    /// Move by the given demand.
    Move(MoveDemand),

    /// Change the delay between actuator pulses, in milliseconds.
    SetDelay { delay_ms: u32 },
}

/// Connection state of the actuator link.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    Connecting,
    Disconnected,
}

/// A single discrete movement direction.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    /// -Y
    Up,
    /// +Y
    Down,
    /// -X
    Left,
    /// +X
    Right,
}

/// Errors which can occur when parsing a command line from the link.
#[derive(Debug, thiserror::Error)]
pub enum ActCmdParseError {
    #[error("Could not deserialize actuator command: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MoveDemand {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Build a single-axis demand of the given power in the given direction.
    pub fn along(direction: Direction, power: i32) -> Self {
        let power = power.abs();
        match direction {
            Direction::Up => Self::new(0, -power),
            Direction::Down => Self::new(0, power),
            Direction::Left => Self::new(-power, 0),
            Direction::Right => Self::new(power, 0),
        }
    }

    /// The direction of the dominant axis, or `None` for a zero demand.
    pub fn direction(&self) -> Option<Direction> {
        if self.x == 0 && self.y == 0 {
            None
        } else if self.x.abs() > self.y.abs() {
            Some(if self.x > 0 {
                Direction::Right
            } else {
                Direction::Left
            })
        } else {
            Some(if self.y > 0 {
                Direction::Down
            } else {
                Direction::Up
            })
        }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

impl Default for PowerLimits {
    fn default() -> Self {
        Self {
            up: POWER_MAX,
            down: POWER_MAX,
            left: POWER_MAX,
            right: POWER_MAX,
        }
    }
}

impl PowerLimits {
    /// Clamp each axis of the demand to the limit for the direction it points in.
    pub fn apply(&self, demand: MoveDemand) -> MoveDemand {
        let x = if demand.x >= 0 {
            demand.x.min(self.right.clamp(0, POWER_MAX))
        } else {
            demand.x.max(-self.left.clamp(0, POWER_MAX))
        };
        let y = if demand.y >= 0 {
            demand.y.min(self.down.clamp(0, POWER_MAX))
        } else {
            demand.y.max(-self.up.clamp(0, POWER_MAX))
        };

        MoveDemand { x, y }
    }
}

impl ActCmd {
    /// Serialize the command into a single newline-terminated line.
    pub fn to_line(&self) -> String {
        // Serializing a plain enum of integers cannot fail
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }

    /// Parse a command from a single line, ignoring surrounding whitespace.
    pub fn from_line(line: &str) -> Result<Self, ActCmdParseError> {
        serde_json::from_str(line.trim()).map_err(ActCmdParseError::DeserializeError)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        };
        f.write_str(s)
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkStatus::Connected => "CONNECTED",
            LinkStatus::Connecting => "CONNECTING",
            LinkStatus::Disconnected => "DISCONNECTED",
        };
        f.write_str(s)
    }
}
