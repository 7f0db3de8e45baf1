//! # Frame Sources
//!
//! A frame source owns the capture device. Two sources are provided:
//!
//! - `ImageDirSource` loops over the images in a directory, in name order.
//! - `SyntheticSource` draws a dark square target on a light background. The target's position is
//!   held in a [`SimTarget`], which can be moved by a simulated actuator to close the loop without
//!   any hardware.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::{Rgb, RgbImage};
use log::{debug, info};
use nalgebra::Vector2;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Side length of the synthetic target in pixels
pub const SYNTHETIC_TARGET_SIZE: u32 = 20;

const SYNTHETIC_BACKGROUND: Rgb<u8> = Rgb([225, 225, 225]);
const SYNTHETIC_TARGET: Rgb<u8> = Rgb([20, 20, 20]);

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait FrameSource: Send {
    /// Capture the next frame, or `None` if no frame is available right now.
    fn capture(&mut self) -> Result<Option<RgbImage>, SourceError>;

    /// Width and height of captured frames.
    fn resolution(&self) -> (u32, u32);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct ImageDirSource {
    files: Vec<PathBuf>,
    next: usize,
    resolution: (u32, u32),
}

/// Position of the synthetic target, in raw frame pixels.
#[derive(Debug)]
pub struct SimTarget {
    pos: Mutex<Vector2<f64>>,
    bounds: (f64, f64),
}

pub struct SyntheticSource {
    width: u32,
    height: u32,
    target: Arc<SimTarget>,

    /// If set the target drifts around a circle by this many degrees per frame.
    orbit_step_deg: Option<f64>,
    orbit_angle_deg: f64,
    orbit_centre: Vector2<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Could not read the image directory {0:?}: {1}")]
    DirReadError(PathBuf, std::io::Error),

    #[error("The image directory {0:?} contains no images")]
    NoImages(PathBuf),

    #[error("Could not load image {0:?}: {1}")]
    ImageLoadError(PathBuf, image::ImageError),

    #[error("Source resolution must be non-zero")]
    ZeroResolution,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ImageDirSource {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, SourceError> {
        let dir = dir.as_ref().to_path_buf();

        let entries =
            std::fs::read_dir(&dir).map_err(|e| SourceError::DirReadError(dir.clone(), e))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        let first = match files.first() {
            Some(f) => f.clone(),
            None => return Err(SourceError::NoImages(dir)),
        };

        let resolution = image::image_dimensions(&first)
            .map_err(|e| SourceError::ImageLoadError(first.clone(), e))?;

        info!(
            "Image directory source opened: {} images in {:?}",
            files.len(),
            dir
        );

        Ok(Self {
            files,
            next: 0,
            resolution,
        })
    }

    pub fn num_images(&self) -> usize {
        self.files.len()
    }
}

impl FrameSource for ImageDirSource {
    fn capture(&mut self) -> Result<Option<RgbImage>, SourceError> {
        let path = &self.files[self.next];
        self.next = (self.next + 1) % self.files.len();

        debug!("Loading frame from {:?}", path);

        let image = image::open(path)
            .map_err(|e| SourceError::ImageLoadError(path.clone(), e))?
            .into_rgb8();

        Ok(Some(image))
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }
}

impl SimTarget {
    /// Create a target at `pos` which is kept inside a frame of the given size.
    pub fn new(pos: Vector2<f64>, width: u32, height: u32) -> Self {
        let t = Self {
            pos: Mutex::new(Vector2::zeros()),
            bounds: (width as f64, height as f64),
        };
        t.set_position(pos);
        t
    }

    pub fn position(&self) -> Vector2<f64> {
        match self.pos.lock() {
            Ok(p) => *p,
            Err(e) => *e.into_inner(),
        }
    }

    pub fn set_position(&self, pos: Vector2<f64>) {
        let clamped = Vector2::new(pos.x.max(0.0).min(self.bounds.0), pos.y.max(0.0).min(self.bounds.1));
        match self.pos.lock() {
            Ok(mut p) => *p = clamped,
            Err(e) => *e.into_inner() = clamped,
        }
    }

    pub fn move_by(&self, delta: Vector2<f64>) {
        self.set_position(self.position() + delta);
    }
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, target: Arc<SimTarget>) -> Result<Self, SourceError> {
        if width == 0 || height == 0 {
            return Err(SourceError::ZeroResolution);
        }

        Ok(Self {
            width,
            height,
            orbit_centre: Vector2::new(width as f64 * 0.5, height as f64 * 0.5),
            target,
            orbit_step_deg: None,
            orbit_angle_deg: 0.0,
        })
    }

    /// Make the target drift around a circle through its current position.
    pub fn orbiting(mut self, step_deg: f64) -> Self {
        self.orbit_step_deg = Some(step_deg);
        self
    }

    /// Render a frame with the target centred on its current position.
    pub fn render(&self) -> RgbImage {
        let mut image = RgbImage::from_pixel(self.width, self.height, SYNTHETIC_BACKGROUND);

        let centre = self.target.position();
        let half = SYNTHETIC_TARGET_SIZE as f64 * 0.5;
        let x0 = (centre.x - half).round().max(0.0) as u32;
        let y0 = (centre.y - half).round().max(0.0) as u32;
        let x1 = ((centre.x + half).round().max(0.0) as u32).min(self.width);
        let y1 = ((centre.y + half).round().max(0.0) as u32).min(self.height);

        for y in y0..y1 {
            for x in x0..x1 {
                image.put_pixel(x, y, SYNTHETIC_TARGET);
            }
        }

        image
    }
}

impl FrameSource for SyntheticSource {
    fn capture(&mut self) -> Result<Option<RgbImage>, SourceError> {
        if let Some(step) = self.orbit_step_deg {
            let radius = (self.height.min(self.width) as f64) * 0.3;
            self.orbit_angle_deg = util::maths::wrap_deg(self.orbit_angle_deg + step);
            let (s, c) = self.orbit_angle_deg.to_radians().sin_cos();
            self.target
                .set_position(self.orbit_centre + Vector2::new(c, s) * radius);
        }

        Ok(Some(self.render()))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_synthetic_render() {
        let target = Arc::new(SimTarget::new(Vector2::new(50.0, 40.0), 160, 120));
        let mut src = SyntheticSource::new(160, 120, target.clone()).unwrap();
        assert_eq!(src.resolution(), (160, 120));

        let img = src.capture().unwrap().unwrap();
        assert_eq!(*img.get_pixel(50, 40), SYNTHETIC_TARGET);
        assert_eq!(*img.get_pixel(40, 30), SYNTHETIC_TARGET);
        assert_eq!(*img.get_pixel(39, 40), SYNTHETIC_BACKGROUND);
        assert_eq!(*img.get_pixel(60, 40), SYNTHETIC_BACKGROUND);

        target.move_by(Vector2::new(30.0, 0.0));
        let img = src.capture().unwrap().unwrap();
        assert_eq!(*img.get_pixel(80, 40), SYNTHETIC_TARGET);
        assert_eq!(*img.get_pixel(50, 40), SYNTHETIC_BACKGROUND);
    }

    #[test]
    fn test_target_clamped() {
        let target = SimTarget::new(Vector2::new(-10.0, 500.0), 100, 100);
        assert_eq!(target.position(), Vector2::new(0.0, 100.0));
    }

    #[test]
    fn test_orbit_moves_target() {
        let target = Arc::new(SimTarget::new(Vector2::new(50.0, 50.0), 100, 100));
        let mut src = SyntheticSource::new(100, 100, target.clone())
            .unwrap()
            .orbiting(10.0);

        src.capture().unwrap();
        let a = target.position();
        src.capture().unwrap();
        let b = target.position();
        assert!((a - b).norm() > 1.0);
    }

    #[test]
    fn test_image_dir() {
        let dir = std::env::temp_dir().join("track_exec_test_image_dir");
        std::fs::create_dir_all(&dir).unwrap();
        RgbImage::from_pixel(8, 6, Rgb([1, 1, 1]))
            .save(dir.join("b.png"))
            .unwrap();
        RgbImage::from_pixel(8, 6, Rgb([2, 2, 2]))
            .save(dir.join("a.png"))
            .unwrap();
        std::fs::write(dir.join("notes.txt"), "not an image").unwrap();

        let mut src = ImageDirSource::open(&dir).unwrap();
        assert_eq!(src.num_images(), 2);
        assert_eq!(src.resolution(), (8, 6));

        // Sorted by name, and loops back to the start
        let first = src.capture().unwrap().unwrap();
        let second = src.capture().unwrap().unwrap();
        let third = src.capture().unwrap().unwrap();
        assert_eq!(first.get_pixel(0, 0)[0], 2);
        assert_eq!(second.get_pixel(0, 0)[0], 1);
        assert_eq!(third.get_pixel(0, 0)[0], 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_dir() {
        let dir = std::env::temp_dir().join("track_exec_test_empty_dir");
        std::fs::create_dir_all(&dir).unwrap();
        assert!(matches!(
            ImageDirSource::open(&dir),
            Err(SourceError::NoImages(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }
}
