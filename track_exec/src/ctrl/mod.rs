//! # Control Module
//!
//! Path following: a [`Procedure`] issues one movement command per tick to steer the actuator
//! along the path, paced by a [`Ticker`].

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod params;
pub mod procedure;
pub mod ticker;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use params::CtrlParams;
pub use procedure::{ProcEvent, ProcMode, ProcReport, Procedure, ProcedureError, TickOutcome};
pub use ticker::{run_procedure, IntervalTicker, Ticker};
