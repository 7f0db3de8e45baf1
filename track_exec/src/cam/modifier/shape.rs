//! # Shape detector
//!
//! Finds dark shapes on a light background and classifies them by how much of their bounding box
//! they fill. An axis aligned rectangle fills all of it, a circle about pi/4 of it, and a
//! triangle about half of it. The actuator is assumed to be the largest rectangle in view.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::{Rgb, RgbImage};
use log::trace;

use super::{
    blob::{draw_rect, find_blobs, mask_from, Blob},
    check_not_empty, ModifierError, VisualModifier,
};
use crate::cam::{params::DetectorParams, tracking::BoundingBox};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const RECT_MIN_FILL: f64 = 0.9;
const CIRCLE_MIN_FILL: f64 = 0.65;
const TRIANGLE_MIN_FILL: f64 = 0.35;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct ShapeDetector {
    dark_threshold: u8,
    min_area: usize,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShapeClass {
    Rectangle,
    Circle,
    Triangle,
    Unknown,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ShapeClass {
    pub fn classify(blob: &Blob) -> Self {
        let fill = blob.fill_ratio();

        if fill >= RECT_MIN_FILL {
            ShapeClass::Rectangle
        } else if fill >= CIRCLE_MIN_FILL {
            ShapeClass::Circle
        } else if fill >= TRIANGLE_MIN_FILL {
            ShapeClass::Triangle
        } else {
            ShapeClass::Unknown
        }
    }

    fn annotation_color(&self) -> Rgb<u8> {
        match self {
            ShapeClass::Rectangle => Rgb([255, 0, 0]),
            ShapeClass::Circle => Rgb([0, 0, 255]),
            ShapeClass::Triangle => Rgb([255, 255, 0]),
            ShapeClass::Unknown => Rgb([128, 128, 128]),
        }
    }
}

impl ShapeDetector {
    pub fn new(params: &DetectorParams) -> Self {
        Self {
            dark_threshold: params.shape_dark_threshold,
            min_area: params.min_blob_area,
        }
    }

    /// Find and classify every dark shape in the image.
    pub fn shapes(&self, image: &RgbImage) -> Vec<(ShapeClass, Blob)> {
        let threshold = self.dark_threshold as u32;
        let mask = mask_from(image, |p| luma(p) < threshold);

        find_blobs(&mask, image.width(), image.height(), self.min_area)
            .into_iter()
            .map(|b| (ShapeClass::classify(&b), b))
            .collect()
    }
}

impl VisualModifier for ShapeDetector {
    fn name(&self) -> &'static str {
        "shape"
    }

    fn modify(&mut self, image: &mut RgbImage) -> Result<Option<BoundingBox>, ModifierError> {
        check_not_empty(image)?;

        let shapes = self.shapes(image);
        trace!("Shape detector found {} shapes", shapes.len());

        for (class, blob) in shapes.iter() {
            draw_rect(image, &blob.bbox(), class.annotation_color());
        }

        Ok(shapes
            .iter()
            .filter(|(c, _)| *c == ShapeClass::Rectangle)
            .max_by_key(|(_, b)| b.area)
            .map(|(_, b)| b.bbox()))
    }
}

/// Integer approximation of the Rec. 601 luma of a pixel.
fn luma(p: &Rgb<u8>) -> u32 {
    (299 * p[0] as u32 + 587 * p[1] as u32 + 114 * p[2] as u32) / 1000
}

#[cfg(test)]
mod test {
    use super::*;

    fn draw_test_shapes() -> RgbImage {
        let mut img = RgbImage::from_pixel(120, 80, Rgb([230, 230, 230]));
        let black = Rgb([0, 0, 0]);

        // Rectangle 20x10 at (5, 5)
        for y in 5..15 {
            for x in 5..25 {
                img.put_pixel(x, y, black);
            }
        }

        // Bigger rectangle 30x20 at (40, 40)
        for y in 40..60 {
            for x in 40..70 {
                img.put_pixel(x, y, black);
            }
        }

        // Circle of radius 10 centred at (95, 20)
        for y in 0..80i32 {
            for x in 0..120i32 {
                let (dx, dy) = (x - 95, y - 20);
                if dx * dx + dy * dy <= 100 {
                    img.put_pixel(x as u32, y as u32, black);
                }
            }
        }

        // Right triangle with 20 pixel legs at (85, 50)
        for j in 0..20u32 {
            for i in 0..=j {
                img.put_pixel(85 + i, 50 + j, black);
            }
        }

        img
    }

    #[test]
    fn test_classification() {
        let det = ShapeDetector::new(&DetectorParams::default());
        let shapes = det.shapes(&draw_test_shapes());

        let count = |c: ShapeClass| shapes.iter().filter(|(s, _)| *s == c).count();
        assert_eq!(shapes.len(), 4);
        assert_eq!(count(ShapeClass::Rectangle), 2);
        assert_eq!(count(ShapeClass::Circle), 1);
        assert_eq!(count(ShapeClass::Triangle), 1);
    }

    #[test]
    fn test_largest_rectangle() {
        let mut det = ShapeDetector::new(&DetectorParams::default());
        let mut img = draw_test_shapes();
        let bbox = det.modify(&mut img).unwrap().unwrap();
        assert_eq!(bbox, BoundingBox::new(40.0, 40.0, 70.0, 60.0));
    }
}
