//! # Console Commands
//!
//! Commands typed into the tracker's standard input while it runs. Each line is parsed as a single
//! command, e.g. `zoom 1.5` or `modifier 2`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::str::FromStr;
use structopt::{clap, StructOpt};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, StructOpt)]
#[structopt(no_version)]
pub enum ConsoleCmd {
    /// Stop the running procedure and exit.
    #[structopt(name = "stop")]
    Stop,

    /// Set the preprocessor zoom factor.
    #[structopt(name = "zoom")]
    Zoom {
        /// The new zoom factor, must be positive.
        factor: f64,
    },

    /// Set the rotation of the camera image, or step it by the configured amount if no angle is
    /// given.
    #[structopt(name = "rotate")]
    Rotate {
        /// Absolute rotation angle in degrees.
        #[structopt(allow_hyphen_values = true)]
        angle_deg: Option<f64>,
    },

    /// Continuously rotate the camera image by the configured step. Toggles if no state is given.
    #[structopt(name = "spin")]
    Spin {
        /// `on` or `off`
        state: Option<SpinState>,
    },

    /// Select the visual modifier used to detect the actuator.
    #[structopt(name = "modifier")]
    Modifier {
        /// 0: none, 1: colour, 2: shape, 3: marker
        index: usize,
    },

    /// Queue and process every captured frame.
    #[structopt(name = "all")]
    ProcessAll,

    /// Process only the most recent frame.
    #[structopt(name = "latest")]
    ProcessLatest,

    /// Start recording into the session directory.
    #[structopt(name = "record")]
    Record,

    /// Stop the current recording.
    #[structopt(name = "endrecord")]
    EndRecord,

    /// Save the last annotated frame into the session directory.
    #[structopt(name = "screenshot")]
    Screenshot,

    /// Set the delay between actuator pulses.
    #[structopt(name = "delay")]
    Delay { delay_ms: u32 },

    /// Print the status board.
    #[structopt(name = "status")]
    Status,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpinState {
    On,
    Off,
}

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("Empty command")]
    Empty,

    #[error("{0}")]
    Invalid(clap::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ConsoleCmd {
    /// Parse a single line of console input.
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let words: Vec<&str> = line.split_whitespace().collect();

        if words.is_empty() {
            return Err(ConsoleError::Empty);
        }

        Self::from_iter_safe(std::iter::once("console").chain(words.into_iter()))
            .map_err(ConsoleError::Invalid)
    }
}

impl FromStr for SpinState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(SpinState::On),
            "off" => Ok(SpinState::Off),
            _ => Err(format!("expected on or off, found {:?}", s)),
        }
    }
}
