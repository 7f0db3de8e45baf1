//! Video pipeline parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the whole video pipeline.
#[derive(Deserialize, Debug, Clone)]
pub struct CamParams {
    pub source: SourceParams,
    pub preproc: PreprocParams,
    pub detector: DetectorParams,
    pub recorder: RecorderParams,
}

/// Frame source parameters
#[derive(Deserialize, Debug, Clone)]
pub struct SourceParams {
    /// Which source to capture from
    pub kind: SourceKind,

    /// Directory of images to use for the `ImageDir` source, relative to the software root if
    /// not absolute.
    pub image_dir: Option<String>,

    /// Target time between two captured frames
    pub frame_interval_ms: u64,

    /// Resolution of the synthetic source
    pub synthetic_width: u32,
    pub synthetic_height: u32,
}

/// Preprocessor defaults
#[derive(Deserialize, Debug, Clone)]
pub struct PreprocParams {
    /// Initial zoom factor, must be positive and no more than `max_zoom`
    pub zoom: f64,

    /// Largest zoom factor accepted
    pub max_zoom: f64,

    /// Initial rotation
    pub rotation_deg: f64,

    /// Angle added to the rotation by each `increment_rotation` call
    pub rotation_step_deg: f64,

    /// Period of the continuous rotation mode
    pub spin_interval_ms: u64,
}

/// Detector (converter) parameters
#[derive(Deserialize, Debug, Clone)]
pub struct DetectorParams {
    /// Index of the visual modifier to start with, see `ModifierKind::from_index`.
    pub modifier_index: usize,

    /// If true only the most recent frame is processed, otherwise every frame is queued.
    pub process_latest: bool,

    /// Maximum number of queued frames in process-all mode.
    pub queue_cap: usize,

    /// Frames wider than this are downsized before detection.
    pub max_display_width: u32,

    /// Inclusive lower RGB bound for the colour detector
    pub color_lower: [u8; 3],

    /// Inclusive upper RGB bound for the colour detector
    pub color_upper: [u8; 3],

    /// Blobs smaller than this number of pixels are ignored by all detectors
    pub min_blob_area: usize,

    /// Pixels with a luma below this are considered part of a shape
    pub shape_dark_threshold: u8,

    /// Colour of the actuator's marker
    pub marker_color: [u8; 3],

    /// Per-channel tolerance when matching the marker colour
    pub marker_tolerance: u8,
}

/// Recorder parameters
#[derive(Deserialize, Debug, Clone)]
pub struct RecorderParams {
    /// JPEG quality of each recorded frame, 1 to 100
    pub jpeg_quality: u8,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Synthetic,
    ImageDir,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for PreprocParams {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            max_zoom: 8.0,
            rotation_deg: 0.0,
            rotation_step_deg: 1.0,
            spin_interval_ms: 50,
        }
    }
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            modifier_index: 1,
            process_latest: true,
            queue_cap: 32,
            max_display_width: 1280,
            color_lower: [0, 0, 0],
            color_upper: [60, 60, 60],
            min_blob_area: 16,
            shape_dark_threshold: 80,
            marker_color: [220, 30, 30],
            marker_tolerance: 40,
        }
    }
}

impl Default for RecorderParams {
    fn default() -> Self {
        Self { jpeg_quality: 85 }
    }
}
