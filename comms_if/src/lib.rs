//! # Communications interface crate.
//!
//! Provides the common interface types exchanged between the tracker and its equipment.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command and status definitions for equipment (like the actuator link)
pub mod eqpt;
