//! # Screen and path coordinates
//!
//! Bounding boxes come out of the detector in screen space: the preprocessed frame after any
//! downsizing by the converter. Paths live in path space, which is the raw camera frame. The two
//! are related by the product of the preprocessor zoom and the converter output scale, and both
//! can change at any time, so the scale is read fresh for every conversion.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, RwLock,
};

use super::{frame::Transform, preproc::read_transform};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Scale the converter applied to the last processed frame, stored as the bits of an `f64`.
#[derive(Debug)]
pub struct OutputScale(AtomicU64);

/// Live view of the scales relating screen space to path space.
#[derive(Debug, Clone)]
pub struct ViewScale {
    transform: Arc<RwLock<Transform>>,
    output_scale: Arc<OutputScale>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OutputScale {
    pub fn new(scale: f64) -> Self {
        Self(AtomicU64::new(scale.to_bits()))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, scale: f64) {
        self.0.store(scale.to_bits(), Ordering::Relaxed)
    }
}

impl Default for OutputScale {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl ViewScale {
    pub fn new(transform: Arc<RwLock<Transform>>, output_scale: Arc<OutputScale>) -> Self {
        Self {
            transform,
            output_scale,
        }
    }

    /// A view with fixed zoom and output scale, not attached to any pipeline.
    pub fn fixed(zoom: f64, output_scale: f64) -> Self {
        Self {
            transform: Arc::new(RwLock::new(Transform {
                zoom,
                rotation_deg: 0.0,
            })),
            output_scale: Arc::new(OutputScale::new(output_scale)),
        }
    }

    /// The current `zoom * output_scale`.
    pub fn combined(&self) -> f64 {
        read_transform(&self.transform).zoom * self.output_scale.get()
    }

    pub fn screen_to_path(&self, screen: &Vector2<f64>) -> Vector2<f64> {
        screen / self.combined()
    }

    pub fn path_to_screen(&self, path: &Vector2<f64>) -> Vector2<f64> {
        path * self.combined()
    }
}
