//! # Blob extraction
//!
//! Connected component extraction on a binary mask, shared by all the detectors. Components are
//! grown from each unvisited set pixel by a depth first flood fill over the 4 direct neighbours
//! (diagonals are not connected), using an explicit stack so large blobs can't overflow the call
//! stack. The properties of each component are then aggregated into a
//! [`Blob`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::{Rgb, RgbImage};

use crate::cam::tracking::BoundingBox;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A connected group of set pixels in a mask.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Blob {
    pub min_x: u32,
    pub min_y: u32,

    /// Inclusive maximum x
    pub max_x: u32,

    /// Inclusive maximum y
    pub max_y: u32,

    /// Number of pixels in the blob
    pub area: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Blob {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Fraction of the blob's bounding box which is covered by the blob.
    pub fn fill_ratio(&self) -> f64 {
        self.area as f64 / (self.width() as f64 * self.height() as f64)
    }

    /// Width divided by height.
    pub fn aspect(&self) -> f64 {
        self.width() as f64 / self.height() as f64
    }

    /// Bounding box of the blob, with the right and bottom edges exclusive.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(
            self.min_x as f64,
            self.min_y as f64,
            (self.max_x + 1) as f64,
            (self.max_y + 1) as f64,
        )
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Find all blobs in a row-major mask which have at least `min_area` pixels.
///
/// Blobs are returned in the order their first pixel appears in a raster scan.
pub fn find_blobs(mask: &[bool], width: u32, height: u32, min_area: usize) -> Vec<Blob> {
    let (w, h) = (width as usize, height as usize);
    if mask.len() < w * h {
        return Vec::new();
    }

    let mut visited = vec![false; w * h];
    let mut blobs = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for start in 0..(w * h) {
        if !mask[start] || visited[start] {
            continue;
        }

        visited[start] = true;
        stack.push((start % w, start / w));

        let mut blob = Blob {
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
            area: 0,
        };

        while let Some((x, y)) = stack.pop() {
            blob.area += 1;
            blob.min_x = blob.min_x.min(x as u32);
            blob.min_y = blob.min_y.min(y as u32);
            blob.max_x = blob.max_x.max(x as u32);
            blob.max_y = blob.max_y.max(y as u32);

            for (dx, dy) in &[(0i64, 1i64), (0, -1), (1, 0), (-1, 0)] {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;

                if nx >= 0 && nx < w as i64 && ny >= 0 && ny < h as i64 {
                    let i = ny as usize * w + nx as usize;
                    if mask[i] && !visited[i] {
                        visited[i] = true;
                        stack.push((nx as usize, ny as usize));
                    }
                }
            }
        }

        if blob.area >= min_area.max(1) {
            blobs.push(blob);
        }
    }

    blobs
}

/// Build a mask of the pixels in the image matching the predicate.
pub fn mask_from<F>(image: &RgbImage, pred: F) -> Vec<bool>
where
    F: Fn(&Rgb<u8>) -> bool,
{
    image.pixels().map(|p| pred(p)).collect()
}

/// Draw the outline of the box onto the image, clipped to the image bounds.
pub fn draw_rect(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return;
    }

    let clamp_x = |v: f64| (v.max(0.0) as u32).min(w - 1);
    let clamp_y = |v: f64| (v.max(0.0) as u32).min(h - 1);

    let left = clamp_x(bbox.left);
    let right = clamp_x(bbox.right - 1.0);
    let top = clamp_y(bbox.top);
    let bottom = clamp_y(bbox.bottom - 1.0);

    for x in left..=right {
        image.put_pixel(x, top, color);
        image.put_pixel(x, bottom, color);
    }
    for y in top..=bottom {
        image.put_pixel(left, y, color);
        image.put_pixel(right, y, color);
    }
}
