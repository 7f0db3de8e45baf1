//! # Camera Module
//!
//! The video pipeline which tracks the actuator's position on screen.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod converter;
pub mod frame;
pub mod modifier;
pub mod params;
pub mod pipeline;
pub mod preproc;
pub mod queue;
pub mod recorder;
pub mod source;
pub mod tracking;
pub mod view;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use converter::{Converter, Detection};
pub use frame::{Frame, PreprocessedFrame, Transform};
pub use modifier::{ModifierKind, VisualModifier};
pub use params::CamParams;
pub use pipeline::{Pipeline, PipelineError};
pub use preproc::Spinner;
pub use source::{FrameSource, ImageDirSource, SimTarget, SyntheticSource};
pub use tracking::{BoundingBox, TrackingState};
pub use view::ViewScale;
