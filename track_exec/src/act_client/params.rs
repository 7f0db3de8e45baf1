//! Actuator link parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::act::PowerLimits;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone)]
pub struct ActParams {
    /// Path to the actuator's device. If not set the link stays disconnected and all commands are
    /// dropped.
    pub device: Option<String>,

    /// Maximum power in each direction
    pub power_limits: PowerLimits,

    /// Delay between actuator pulses
    pub delay_ms: u32,
}
