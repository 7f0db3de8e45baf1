//! Frame types passed between the pipeline stages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single captured frame.
///
/// Frames are moved from stage to stage and are only ever held by one stage at a time.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonically increasing capture index, starting at 1.
    pub id: u64,

    /// Time the frame was captured.
    pub timestamp: DateTime<Utc>,

    pub image: RgbImage,
}

/// Geometric transform applied to frames by the preprocessor.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Zoom factor, always positive.
    pub zoom: f64,

    /// Rotation in degrees, in the range [0, 360).
    pub rotation_deg: f64,
}

/// A frame which has been through the preprocessor, along with the transform applied to it.
#[derive(Debug, Clone)]
pub struct PreprocessedFrame {
    pub frame: Frame,
    pub transform: Transform,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Frame {
    pub fn new(id: u64, image: RgbImage) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            rotation_deg: 0.0,
        }
    }
}

impl Transform {
    /// True if applying this transform leaves a frame unchanged.
    pub fn is_identity(&self) -> bool {
        (self.zoom - 1.0).abs() < std::f64::EPSILON && self.rotation_deg.abs() < std::f64::EPSILON
    }
}
