//! # Converter
//!
//! The detection stage of the pipeline. Preprocessed frames are taken from the converter's queue,
//! downsized to the display width if needed, and passed through the active visual modifier. The
//! resulting bounding box is written into the shared tracking state.
//!
//! If the modifier fails on a frame the frame is dropped and the tracking state invalidated, but
//! the converter keeps running.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::{imageops, RgbImage};
use log::{debug, info, warn};
use std::path::Path;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};

use super::{
    frame::PreprocessedFrame,
    modifier::{ModifierError, ModifierKind, VisualModifier},
    params::DetectorParams,
    queue::FrameQueue,
    tracking::{BoundingBox, TrackingState},
    view::OutputScale,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct Converter {
    params: DetectorParams,

    queue: Arc<FrameQueue<PreprocessedFrame>>,

    modifier: Mutex<Box<dyn VisualModifier>>,

    tracking: Arc<TrackingState>,

    /// Frames successfully processed since the last poll
    frame_count: AtomicU64,

    /// Downsizing scale applied to the most recent frame
    output_scale: Arc<OutputScale>,

    /// Most recent annotated frame
    latest: Mutex<Option<RgbImage>>,
}

/// The result of processing a single frame.
#[derive(Debug, Clone)]
pub struct Detection {
    /// The annotated frame, in screen space
    pub frame: PreprocessedFrame,

    /// Box found by the modifier, if any
    pub bbox: Option<BoundingBox>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConverterError {
    #[error("Could not select the modifier: {0}")]
    ModifierError(ModifierError),

    #[error("No frame has been processed yet")]
    NoFrame,

    #[error("Could not save the screenshot: {0}")]
    ScreenshotError(image::ImageError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Detection {
    pub fn is_valid(&self) -> bool {
        self.bbox.is_some()
    }
}

impl Converter {
    pub fn new(params: &DetectorParams, tracking: Arc<TrackingState>) -> Result<Self, ConverterError> {
        let kind =
            ModifierKind::from_index(params.modifier_index).map_err(ConverterError::ModifierError)?;

        Ok(Self {
            params: params.clone(),
            queue: Arc::new(FrameQueue::new(params.process_latest, params.queue_cap)),
            modifier: Mutex::new(kind.build(params)),
            tracking,
            frame_count: AtomicU64::new(0),
            output_scale: Arc::new(OutputScale::default()),
            latest: Mutex::new(None),
        })
    }

    /// The queue feeding this converter.
    pub fn queue(&self) -> Arc<FrameQueue<PreprocessedFrame>> {
        self.queue.clone()
    }

    pub fn output_scale(&self) -> Arc<OutputScale> {
        self.output_scale.clone()
    }

    /// Select the modifier by index. Frames already being processed finish with the old one.
    pub fn set_modifier(&self, index: usize) -> Result<ModifierKind, ConverterError> {
        let kind = ModifierKind::from_index(index).map_err(ConverterError::ModifierError)?;
        let modifier = kind.build(&self.params);

        info!("Modifier changed to {}", modifier.name());
        *lock(&self.modifier) = modifier;

        Ok(kind)
    }

    /// Choose between processing every frame (`true`) or only the latest one (`false`).
    pub fn set_process_all(&self, process_all: bool) {
        self.queue.set_latest_only(!process_all);
        info!(
            "Converter now processing {} frames",
            if process_all { "all" } else { "latest" }
        );
    }

    /// Number of frames processed since the last call, resetting the count.
    pub fn get_and_reset_frames(&self) -> u64 {
        self.frame_count.swap(0, Ordering::Relaxed)
    }

    /// Run the detector on a single frame.
    ///
    /// Returns `None` if the modifier failed and the frame was dropped.
    pub fn process(&self, mut frame: PreprocessedFrame) -> Option<Detection> {
        // Downsize to the display width
        let width = frame.frame.width();
        let scale = if width > self.params.max_display_width && width > 0 {
            let scale = self.params.max_display_width as f64 / width as f64;
            let height = ((frame.frame.height() as f64) * scale).round().max(1.0) as u32;
            frame.frame.image = imageops::resize(
                &frame.frame.image,
                self.params.max_display_width,
                height,
                imageops::FilterType::Triangle,
            );
            scale
        } else {
            1.0
        };
        self.output_scale.set(scale);

        let result = lock(&self.modifier).modify(&mut frame.frame.image);

        let bbox = match result {
            Ok(Some(b)) => {
                self.tracking.update(b);
                Some(b)
            }
            Ok(None) => {
                self.tracking.invalidate();
                None
            }
            Err(e) => {
                self.tracking.invalidate();
                warn!("Modifier failed on frame {}, dropping: {}", frame.frame.id, e);
                return None;
            }
        };

        self.frame_count.fetch_add(1, Ordering::Relaxed);
        *lock(&self.latest) = Some(frame.frame.image.clone());

        Some(Detection { frame, bbox })
    }

    /// Process frames from the queue until it is closed, passing each detection to `output`.
    pub fn run<F: FnMut(Detection)>(&self, mut output: F) {
        info!("Converter started");

        while let Some(frame) = self.queue.pop() {
            let id = frame.frame.id;
            match self.process(frame) {
                Some(d) => output(d),
                None => debug!("Frame {} dropped", id),
            }
        }

        info!(
            "Converter stopped, {} frames dropped by the queue",
            self.queue.dropped()
        );
    }

    /// A copy of the latest annotated frame.
    pub fn latest_frame(&self) -> Option<RgbImage> {
        lock(&self.latest).clone()
    }

    /// Save the latest annotated frame to an image file, the format is taken from the extension.
    pub fn save_screenshot<P: AsRef<Path>>(&self, path: P) -> Result<(), ConverterError> {
        let image = self.latest_frame().ok_or(ConverterError::NoFrame)?;
        image
            .save(path.as_ref())
            .map_err(ConverterError::ScreenshotError)?;
        info!("Screenshot saved to {:?}", path.as_ref());
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<T> {
    match m.lock() {
        Ok(g) => g,
        Err(e) => e.into_inner(),
    }
}
