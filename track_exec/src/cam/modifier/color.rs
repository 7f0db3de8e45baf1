//! Colour range detector

use image::{Rgb, RgbImage};
use log::trace;

use super::{
    blob::{draw_rect, find_blobs, mask_from},
    check_not_empty, ModifierError, VisualModifier,
};
use crate::cam::{params::DetectorParams, tracking::BoundingBox};

/// Finds the largest connected region of pixels within an inclusive RGB range.
pub struct ColorDetector {
    lower: [u8; 3],
    upper: [u8; 3],
    min_area: usize,
}

const ANNOTATION_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

impl ColorDetector {
    pub fn new(params: &DetectorParams) -> Self {
        Self {
            lower: params.color_lower,
            upper: params.color_upper,
            min_area: params.min_blob_area,
        }
    }

    fn matches(&self, p: &Rgb<u8>) -> bool {
        (0..3).all(|c| p[c] >= self.lower[c] && p[c] <= self.upper[c])
    }
}

impl VisualModifier for ColorDetector {
    fn name(&self) -> &'static str {
        "color"
    }

    fn modify(&mut self, image: &mut RgbImage) -> Result<Option<BoundingBox>, ModifierError> {
        check_not_empty(image)?;

        let mask = mask_from(image, |p| self.matches(p));
        let blobs = find_blobs(&mask, image.width(), image.height(), self.min_area);
        trace!("Colour detector found {} blobs", blobs.len());

        let largest = match blobs.iter().max_by_key(|b| b.area) {
            Some(b) => b.bbox(),
            None => return Ok(None),
        };

        draw_rect(image, &largest, ANNOTATION_COLOR);

        Ok(Some(largest))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_largest_region() {
        let params = DetectorParams {
            color_lower: [0, 0, 200],
            color_upper: [50, 50, 255],
            min_blob_area: 4,
            ..Default::default()
        };
        let mut det = ColorDetector::new(&params);

        let mut img = RgbImage::from_pixel(60, 40, Rgb([200, 200, 200]));
        let blue = Rgb([10, 10, 230]);

        // Small blue square, then a bigger one
        for y in 5..9 {
            for x in 5..9 {
                img.put_pixel(x, y, blue);
            }
        }
        for y in 20..30 {
            for x in 30..45 {
                img.put_pixel(x, y, blue);
            }
        }

        let bbox = det.modify(&mut img).unwrap().unwrap();
        assert_eq!(bbox, BoundingBox::new(30.0, 20.0, 45.0, 30.0));

        // The box was drawn onto the frame
        assert_eq!(*img.get_pixel(30, 20), ANNOTATION_COLOR);
    }

    #[test]
    fn test_nothing_found() {
        let mut det = ColorDetector::new(&DetectorParams {
            color_lower: [0, 0, 200],
            color_upper: [50, 50, 255],
            ..Default::default()
        });
        let mut img = RgbImage::from_pixel(16, 16, Rgb([200, 200, 200]));
        assert!(det.modify(&mut img).unwrap().is_none());
    }
}
