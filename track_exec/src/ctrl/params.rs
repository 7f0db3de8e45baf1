//! Path following control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for path following
#[derive(Deserialize, Debug, Clone)]
pub struct CtrlParams {
    /// Period of the control tick
    pub tick_interval_ms: u64,

    /// Distance from a waypoint, in path space pixels, under which the waypoint is considered
    /// reached.
    pub acceptance_radius: f64,

    /// Distance from the current segment above which the actuator is steered back onto the
    /// segment rather than towards the waypoint.
    pub deviation_threshold: f64,

    /// How long to wait for the first valid detection before starting a procedure.
    pub acquire_wait_ms: u64,
}

impl Default for CtrlParams {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            acceptance_radius: 5.0,
            deviation_threshold: 20.0,
            acquire_wait_ms: 5000,
        }
    }
}
