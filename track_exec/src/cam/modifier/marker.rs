//! Marker detector

use image::{Rgb, RgbImage};
use log::trace;

use super::{
    blob::{draw_rect, find_blobs, mask_from},
    check_not_empty, ModifierError, VisualModifier,
};
use crate::cam::{params::DetectorParams, tracking::BoundingBox};

/// Maximum ratio between the long and short sides of a marker
const MAX_ASPECT: f64 = 1.3;

/// Minimum fraction of the marker's bounding box covered by the marker colour
const MIN_FILL: f64 = 0.8;

const ANNOTATION_COLOR: Rgb<u8> = Rgb([255, 0, 255]);

/// Finds the square patch of solid colour mounted on the actuator.
///
/// Candidates are blobs of the marker colour which are roughly square and densely filled. The
/// largest candidate wins.
pub struct MarkerDetector {
    color: [u8; 3],
    tolerance: u8,
    min_area: usize,
}

impl MarkerDetector {
    pub fn new(params: &DetectorParams) -> Self {
        Self {
            color: params.marker_color,
            tolerance: params.marker_tolerance,
            min_area: params.min_blob_area,
        }
    }

    fn matches(&self, p: &Rgb<u8>) -> bool {
        (0..3).all(|c| (p[c] as i16 - self.color[c] as i16).abs() <= self.tolerance as i16)
    }
}

impl VisualModifier for MarkerDetector {
    fn name(&self) -> &'static str {
        "marker"
    }

    fn modify(&mut self, image: &mut RgbImage) -> Result<Option<BoundingBox>, ModifierError> {
        check_not_empty(image)?;

        let mask = mask_from(image, |p| self.matches(p));
        let blobs = find_blobs(&mask, image.width(), image.height(), self.min_area);

        let best = blobs
            .iter()
            .filter(|b| {
                let aspect = b.aspect();
                aspect <= MAX_ASPECT && aspect >= 1.0 / MAX_ASPECT && b.fill_ratio() >= MIN_FILL
            })
            .max_by_key(|b| b.area);

        trace!(
            "Marker detector: {} blobs, best {:?}",
            blobs.len(),
            best.map(|b| b.area)
        );

        Ok(best.map(|b| {
            let bbox = b.bbox();
            draw_rect(image, &bbox, ANNOTATION_COLOR);
            bbox
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_square_marker() {
        let params = DetectorParams {
            marker_color: [220, 30, 30],
            marker_tolerance: 30,
            min_blob_area: 4,
            ..Default::default()
        };
        let mut det = MarkerDetector::new(&params);

        let mut img = RgbImage::from_pixel(100, 100, Rgb([240, 240, 240]));

        // A long thin red bar, bigger than the marker but the wrong shape
        for y in 80..90 {
            for x in 0..90 {
                img.put_pixel(x, y, Rgb([230, 20, 25]));
            }
        }

        // The marker itself, slightly off colour
        for y in 10..22 {
            for x in 50..62 {
                img.put_pixel(x, y, Rgb([205, 45, 40]));
            }
        }

        let bbox = det.modify(&mut img).unwrap().unwrap();
        assert_eq!(bbox, BoundingBox::new(50.0, 10.0, 62.0, 22.0));
    }
}
