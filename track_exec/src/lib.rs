//! # Tracker library.
//!
//! Allows the executable, benchmarks and other crates in the workspace to access items defined
//! inside the tracker crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuator client - sends movement demands to the actuator, or moves a simulated target
pub mod act_client;

/// Camera module - captures frames and detects the actuator on screen
pub mod cam;

/// Console commands typed into standard input
pub mod console;

/// Competition state - the path and the latest tracked position
pub mod comp_state;

/// Control module - follows the path one command per tick
pub mod ctrl;

/// Executable parameters
pub mod params;

/// Path file loading
pub mod path;

/// Status board - labelled text lines describing the tracker
pub mod status;
