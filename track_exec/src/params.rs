//! # Tracker Executable Parameters
//!
//! Parameters for the tracker executable, loaded from `params/track_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::{act_client::ActParams, cam::CamParams, ctrl::CtrlParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone)]
pub struct TrackExecParams {
    /// Path file loaded at startup, relative to the software root
    pub path_file: Option<String>,

    /// Interval at which the frame rate is measured and shown on the status board
    pub fps_poll_interval_ms: u64,

    /// Gain of the simulated actuator, in pixels moved per unit of power
    pub sim_gain: f64,

    pub cam: CamParams,

    pub ctrl: CtrlParams,

    pub act: ActParams,
}
