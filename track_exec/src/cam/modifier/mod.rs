//! # Visual Modifiers
//!
//! A visual modifier takes a frame, optionally annotates it, and optionally reports the bounding
//! box of the actuator in it. The set of modifiers is closed and selected at runtime by index.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod blob;
mod color;
mod marker;
mod shape;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::RgbImage;

use super::{params::DetectorParams, tracking::BoundingBox};

pub use color::ColorDetector;
pub use marker::MarkerDetector;
pub use shape::{ShapeClass, ShapeDetector};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A detector which can be run on each frame by the converter.
pub trait VisualModifier: Send {
    /// Name shown in logs
    fn name(&self) -> &'static str;

    /// Process the frame in place, returning the actuator's bounding box if one was found.
    fn modify(&mut self, image: &mut RgbImage) -> Result<Option<BoundingBox>, ModifierError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Leaves frames untouched and never finds anything.
pub struct NoModifier;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The available modifiers, in index order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ModifierKind {
    None,
    Color,
    Shape,
    Marker,
}

#[derive(Debug, thiserror::Error)]
pub enum ModifierError {
    #[error("Cannot process an empty frame")]
    EmptyFrame,

    #[error("No modifier exists with index {0}")]
    InvalidIndex(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ModifierKind {
    pub const ALL: [ModifierKind; 4] = [
        ModifierKind::None,
        ModifierKind::Color,
        ModifierKind::Shape,
        ModifierKind::Marker,
    ];

    pub fn from_index(index: usize) -> Result<Self, ModifierError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(ModifierError::InvalidIndex(index))
    }

    /// Build the modifier using the detector parameters.
    pub fn build(self, params: &DetectorParams) -> Box<dyn VisualModifier> {
        match self {
            ModifierKind::None => Box::new(NoModifier),
            ModifierKind::Color => Box::new(ColorDetector::new(params)),
            ModifierKind::Shape => Box::new(ShapeDetector::new(params)),
            ModifierKind::Marker => Box::new(MarkerDetector::new(params)),
        }
    }
}

impl VisualModifier for NoModifier {
    fn name(&self) -> &'static str {
        "none"
    }

    fn modify(&mut self, _image: &mut RgbImage) -> Result<Option<BoundingBox>, ModifierError> {
        Ok(None)
    }
}

/// Check that the image has pixels to process.
pub(crate) fn check_not_empty(image: &RgbImage) -> Result<(), ModifierError> {
    if image.width() == 0 || image.height() == 0 {
        Err(ModifierError::EmptyFrame)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_index() {
        assert_eq!(ModifierKind::from_index(0).unwrap(), ModifierKind::None);
        assert_eq!(ModifierKind::from_index(3).unwrap(), ModifierKind::Marker);
        assert!(matches!(
            ModifierKind::from_index(4),
            Err(ModifierError::InvalidIndex(4))
        ));
    }

    #[test]
    fn test_build() {
        let params = DetectorParams::default();
        for kind in ModifierKind::ALL.iter() {
            let mut m = kind.build(&params);
            let mut img = RgbImage::new(0, 0);
            let res = m.modify(&mut img);
            match kind {
                ModifierKind::None => assert!(matches!(res, Ok(None))),
                _ => assert!(matches!(res, Err(ModifierError::EmptyFrame))),
            }
        }
    }
}
