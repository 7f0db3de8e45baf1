//! # Frame Preprocessor
//!
//! Applies the zoom and rotation transform to raw frames. The transform parameters live behind a
//! shared lock so they can be changed from any thread. Each call to `preprocess` takes a snapshot
//! of the parameters before doing any work, so a change never affects a frame already in flight.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::{imageops, RgbImage};
use log::debug;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::{
    frame::{Frame, PreprocessedFrame, Transform},
    params::PreprocParams,
};
use util::maths::wrap_deg;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct Preprocessor {
    transform: Arc<RwLock<Transform>>,

    rotation_step_deg: f64,

    max_zoom: f64,
}

/// Continuous rotation mode: while enabled, reports when the next rotation step is due.
#[derive(Debug)]
pub struct Spinner {
    enabled: bool,
    interval: Duration,
    last_step: Instant,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PreprocError {
    #[error("Zoom factor must be positive and at most {1}, got {0}")]
    InvalidZoom(f64, f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Preprocessor {
    pub fn new(params: &PreprocParams) -> Result<Self, PreprocError> {
        check_zoom(params.zoom, params.max_zoom)?;

        Ok(Self {
            transform: Arc::new(RwLock::new(Transform {
                zoom: params.zoom,
                rotation_deg: wrap_deg(params.rotation_deg),
            })),
            rotation_step_deg: params.rotation_step_deg,
            max_zoom: params.max_zoom,
        })
    }

    /// Set the zoom factor used for subsequent frames.
    pub fn set_zoom(&self, zoom: f64) -> Result<(), PreprocError> {
        check_zoom(zoom, self.max_zoom)?;
        write_transform(&self.transform, |t| t.zoom = zoom);
        debug!("Zoom set to {:.3}", zoom);
        Ok(())
    }

    /// Set the rotation used for subsequent frames. The angle is wrapped into [0, 360).
    pub fn set_rotation(&self, angle_deg: f64) {
        let angle_deg = wrap_deg(angle_deg);
        write_transform(&self.transform, |t| t.rotation_deg = angle_deg);
        debug!("Rotation set to {:.1} deg", angle_deg);
    }

    /// Advance the rotation by the configured step, returning the new angle.
    pub fn increment_rotation(&self) -> f64 {
        let step = self.rotation_step_deg;
        let mut angle = 0.0;
        write_transform(&self.transform, |t| {
            t.rotation_deg = wrap_deg(t.rotation_deg + step);
            angle = t.rotation_deg;
        });
        angle
    }

    /// The zoom factor currently applied.
    pub fn zoom(&self) -> f64 {
        read_transform(&self.transform).zoom
    }

    /// A snapshot of the current transform.
    pub fn transform(&self) -> Transform {
        read_transform(&self.transform)
    }

    /// Handle to the shared transform, used to convert coordinates back to path space.
    pub fn shared_transform(&self) -> Arc<RwLock<Transform>> {
        self.transform.clone()
    }

    /// Apply the current transform to the frame.
    pub fn preprocess(&self, frame: Frame) -> PreprocessedFrame {
        let transform = self.transform();

        let frame = if transform.is_identity() {
            frame
        } else {
            Frame {
                image: apply_transform(&frame.image, &transform),
                ..frame
            }
        };

        PreprocessedFrame { frame, transform }
    }
}

impl Spinner {
    /// A disabled spinner stepping once per `interval` when enabled.
    pub fn new(interval: Duration) -> Self {
        Self {
            enabled: false,
            interval,
            last_step: Instant::now(),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.last_step = Instant::now();
        }
        self.enabled = enabled;
    }

    /// Flip the mode, returning whether it is now enabled.
    pub fn toggle(&mut self) -> bool {
        self.set_enabled(!self.enabled);
        self.enabled
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True if enabled and a full interval has passed since the last step at `now`, which then
    /// becomes the last step.
    pub fn due(&mut self, now: Instant) -> bool {
        if self.enabled && now.saturating_duration_since(self.last_step) >= self.interval {
            self.last_step = now;
            true
        } else {
            false
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Apply the transform to the image, returning the transformed copy.
///
/// Zoom rescales the whole image. Rotation turns the content about the image centre, keeping the
/// canvas size and filling uncovered pixels with black.
pub fn apply_transform(image: &RgbImage, transform: &Transform) -> RgbImage {
    let zoomed = if (transform.zoom - 1.0).abs() < std::f64::EPSILON {
        image.clone()
    } else {
        let width = ((image.width() as f64) * transform.zoom).round().max(1.0) as u32;
        let height = ((image.height() as f64) * transform.zoom).round().max(1.0) as u32;
        imageops::resize(image, width, height, imageops::FilterType::Triangle)
    };

    if transform.rotation_deg.abs() < std::f64::EPSILON {
        zoomed
    } else {
        rotate_about_centre(&zoomed, transform.rotation_deg)
    }
}

/// Read the shared transform, recovering it if a writer panicked.
pub(crate) fn read_transform(lock: &RwLock<Transform>) -> Transform {
    match lock.read() {
        Ok(t) => *t,
        Err(e) => *e.into_inner(),
    }
}

fn write_transform<F: FnOnce(&mut Transform)>(lock: &RwLock<Transform>, f: F) {
    match lock.write() {
        Ok(mut t) => f(&mut t),
        Err(e) => f(&mut e.into_inner()),
    }
}

fn check_zoom(zoom: f64, max_zoom: f64) -> Result<(), PreprocError> {
    if zoom.is_finite() && zoom > 0.0 && zoom <= max_zoom {
        Ok(())
    } else {
        Err(PreprocError::InvalidZoom(zoom, max_zoom))
    }
}

/// Nearest-neighbour rotation of the image about its centre.
fn rotate_about_centre(image: &RgbImage, angle_deg: f64) -> RgbImage {
    let (width, height) = image.dimensions();
    let cx = (width as f64 - 1.0) * 0.5;
    let cy = (height as f64 - 1.0) * 0.5;

    // Each output pixel samples the input at the inverse rotation
    let (sin, cos) = (-angle_deg.to_radians()).sin_cos();

    RgbImage::from_fn(width, height, |x, y| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let sx = (cos * dx - sin * dy + cx).round();
        let sy = (sin * dx + cos * dy + cy).round();

        if sx >= 0.0 && sy >= 0.0 && sx < width as f64 && sy < height as f64 {
            *image.get_pixel(sx as u32, sy as u32)
        } else {
            image::Rgb([0, 0, 0])
        }
    })
}
