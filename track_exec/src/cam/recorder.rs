//! # Recording Sink
//!
//! Optionally persists the stream of preprocessed frames to a video file. The recorder has its
//! own lifecycle, independent of detection: frames appended while no recording is open are
//! silently ignored.
//!
//! Each recording has a generation number. Frames queued for the recorder carry the generation
//! that was open when they were captured, so frames left over from one recording are never
//! written into the next.
//!
//! Recordings are written as Motion JPEG, a plain concatenation of JPEG images, at a fixed
//! nominal frame rate.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::{codecs::jpeg::JpegEncoder, imageops, ColorType, RgbImage};
use log::{info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Mutex, MutexGuard,
};

use super::params::RecorderParams;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Nominal frame rate of recordings.
pub const DEFAULT_FRAME_RATE: u32 = 30;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// An open video file.
pub trait VideoWriter: Send {
    fn write_frame(&mut self, image: &RgbImage) -> Result<(), RecordError>;

    /// Flush and close the file.
    fn finish(self: Box<Self>) -> Result<(), RecordError>;
}

/// Function opening a writer for the given path and frame size.
pub type WriterOpener =
    dyn Fn(&Path, u32, u32) -> Result<Box<dyn VideoWriter>, RecordError> + Send + Sync;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct RecordingSink {
    opener: Box<WriterOpener>,
    active: Mutex<Option<ActiveRecording>>,
    recording: AtomicBool,

    /// Generation of the latest recording, incremented by each start
    generation: AtomicU64,
}

/// Motion JPEG writer
pub struct MjpegWriter {
    out: BufWriter<File>,
    width: u32,
    height: u32,
    quality: u8,
}

/// Summary of a finished recording.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSummary {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub frames: u64,
}

struct ActiveRecording {
    generation: u64,
    writer: Box<dyn VideoWriter>,
    summary: RecordSummary,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Recording frame size must be non-zero, got {0}x{1}")]
    InvalidSize(u32, u32),

    #[error("Could not open the recording file: {0}")]
    OpenError(std::io::Error),

    #[error("Could not write to the recording file: {0}")]
    WriteError(std::io::Error),

    #[error("Could not encode a frame: {0}")]
    EncodeError(image::ImageError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RecordingSink {
    /// Create a sink writing Motion JPEG files.
    pub fn new(params: &RecorderParams) -> Self {
        let quality = params.jpeg_quality.max(1).min(100);
        Self::with_opener(move |path, width, height| {
            Ok(Box::new(MjpegWriter::create(path, width, height, quality)?) as Box<dyn VideoWriter>)
        })
    }

    /// Create a sink using a custom writer.
    pub fn with_opener<F>(opener: F) -> Self
    where
        F: Fn(&Path, u32, u32) -> Result<Box<dyn VideoWriter>, RecordError> + Send + Sync + 'static,
    {
        Self {
            opener: Box::new(opener),
            active: Mutex::new(None),
            recording: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// Start recording into a new file.
    ///
    /// If a recording is already open it is finalised first. Errors opening the new file are
    /// returned to the caller and leave the sink idle.
    pub fn start<P: AsRef<Path>>(
        &self,
        path: P,
        width: u32,
        height: u32,
    ) -> Result<Option<RecordSummary>, RecordError> {
        let mut active = self.lock();

        let previous = match active.take() {
            Some(a) => {
                self.recording.store(false, Ordering::Relaxed);
                Some(finish(a)?)
            }
            None => None,
        };

        if width == 0 || height == 0 {
            return Err(RecordError::InvalidSize(width, height));
        }

        let path = path.as_ref().to_path_buf();
        let writer = (self.opener)(&path, width, height)?;

        info!(
            "Recording started: {:?} ({}x{} at {} fps)",
            path, width, height, DEFAULT_FRAME_RATE
        );

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        *active = Some(ActiveRecording {
            generation,
            writer,
            summary: RecordSummary {
                path,
                width,
                height,
                frame_rate: DEFAULT_FRAME_RATE,
                frames: 0,
            },
        });
        self.recording.store(true, Ordering::Relaxed);

        Ok(previous)
    }

    /// Stop the current recording, returning its summary, or `None` if not recording.
    pub fn stop(&self) -> Result<Option<RecordSummary>, RecordError> {
        let mut active = self.lock();
        self.recording.store(false, Ordering::Relaxed);

        match active.take() {
            Some(a) => finish(a).map(Some),
            None => Ok(None),
        }
    }

    /// Write a frame to the current recording. Does nothing if not recording.
    pub fn append(&self, image: &RgbImage) -> Result<(), RecordError> {
        let mut active = self.lock();

        if let Some(ref mut a) = *active {
            a.writer.write_frame(image)?;
            a.summary.frames += 1;
        }

        Ok(())
    }

    /// Write a frame captured during the recording of the given generation.
    ///
    /// Does nothing if that recording is no longer the open one.
    pub fn append_to(&self, generation: u64, image: &RgbImage) -> Result<(), RecordError> {
        let mut active = self.lock();

        match *active {
            Some(ref mut a) if a.generation == generation => {
                a.writer.write_frame(image)?;
                a.summary.frames += 1;
            }
            _ => (),
        }

        Ok(())
    }

    /// Generation of the open recording, or `None` if not recording.
    pub fn active_generation(&self) -> Option<u64> {
        self.lock().as_ref().map(|a| a.generation)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<Option<ActiveRecording>> {
        match self.active.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        }
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Could not finalise the recording: {}", e);
        }
    }
}

impl MjpegWriter {
    pub fn create(path: &Path, width: u32, height: u32, quality: u8) -> Result<Self, RecordError> {
        let file = File::create(path).map_err(RecordError::OpenError)?;

        Ok(Self {
            out: BufWriter::new(file),
            width,
            height,
            quality,
        })
    }
}

impl VideoWriter for MjpegWriter {
    fn write_frame(&mut self, image: &RgbImage) -> Result<(), RecordError> {
        // Frames of the wrong size are scaled to the recording size
        let resized;
        let image = if image.dimensions() != (self.width, self.height) {
            resized = imageops::resize(
                image,
                self.width,
                self.height,
                imageops::FilterType::Triangle,
            );
            &resized
        } else {
            image
        };

        JpegEncoder::new_with_quality(&mut self.out, self.quality)
            .encode(image.as_raw(), self.width, self.height, ColorType::Rgb8)
            .map_err(RecordError::EncodeError)
    }

    fn finish(mut self: Box<Self>) -> Result<(), RecordError> {
        self.out.flush().map_err(RecordError::WriteError)
    }
}

fn finish(active: ActiveRecording) -> Result<RecordSummary, RecordError> {
    active.writer.finish()?;
    info!(
        "Recording finished: {:?}, {} frames",
        active.summary.path, active.summary.frames
    );
    Ok(active.summary)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    /// Writer which records the id stored in the first pixel of every frame
    struct TestWriter {
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl VideoWriter for TestWriter {
        fn write_frame(&mut self, image: &RgbImage) -> Result<(), RecordError> {
            self.written.lock().unwrap().push(image.get_pixel(0, 0)[0]);
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<(), RecordError> {
            Ok(())
        }
    }

    fn test_sink() -> (RecordingSink, Arc<Mutex<Vec<u8>>>) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let w = written.clone();
        let sink = RecordingSink::with_opener(move |_, _, _| {
            Ok(Box::new(TestWriter { written: w.clone() }) as Box<dyn VideoWriter>)
        });
        (sink, written)
    }

    fn frame(id: u8) -> RgbImage {
        RgbImage::from_pixel(4, 4, image::Rgb([id, 0, 0]))
    }

    #[test]
    fn test_only_frames_between_start_and_stop() {
        let (sink, written) = test_sink();

        sink.append(&frame(1)).unwrap();
        assert!(!sink.is_recording());

        assert!(sink.start("a.mjpeg", 4, 4).unwrap().is_none());
        assert!(sink.is_recording());
        sink.append(&frame(2)).unwrap();
        sink.append(&frame(3)).unwrap();

        let summary = sink.stop().unwrap().unwrap();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.frame_rate, DEFAULT_FRAME_RATE);
        assert!(!sink.is_recording());

        sink.append(&frame(4)).unwrap();
        assert!(sink.stop().unwrap().is_none());

        assert_eq!(*written.lock().unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_restart_finalises_previous() {
        let (sink, _) = test_sink();

        sink.start("a.mjpeg", 4, 4).unwrap();
        sink.append(&frame(1)).unwrap();

        let prev = sink.start("b.mjpeg", 4, 4).unwrap().unwrap();
        assert_eq!(prev.path, PathBuf::from("a.mjpeg"));
        assert_eq!(prev.frames, 1);

        sink.append(&frame(2)).unwrap();
        let b = sink.stop().unwrap().unwrap();
        assert_eq!(b.path, PathBuf::from("b.mjpeg"));
        assert_eq!(b.frames, 1);
    }

    #[test]
    fn test_stale_generation_ignored() {
        let (sink, written) = test_sink();
        assert!(sink.active_generation().is_none());

        sink.start("a.mjpeg", 4, 4).unwrap();
        let first = sink.active_generation().unwrap();
        sink.append_to(first, &frame(1)).unwrap();
        sink.stop().unwrap();

        // Frame from the first recording still queued when the second starts
        sink.start("b.mjpeg", 4, 4).unwrap();
        let second = sink.active_generation().unwrap();
        assert_ne!(first, second);

        sink.append_to(first, &frame(2)).unwrap();
        sink.append_to(second, &frame(3)).unwrap();

        let b = sink.stop().unwrap().unwrap();
        assert_eq!(b.frames, 1);
        assert_eq!(*written.lock().unwrap(), vec![1, 3]);

        // Nothing is open, so nothing is written
        sink.append_to(second, &frame(4)).unwrap();
        assert_eq!(written.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_open_error_surfaced() {
        let sink = RecordingSink::new(&RecorderParams::default());
        let res = sink.start("/nonexistent_dir/for/sure/rec.mjpeg", 4, 4);
        assert!(matches!(res, Err(RecordError::OpenError(_))));
        assert!(!sink.is_recording());

        assert!(matches!(
            sink.start("rec.mjpeg", 0, 4),
            Err(RecordError::InvalidSize(0, 4))
        ));
    }

    #[test]
    fn test_mjpeg_file() {
        let path = std::env::temp_dir().join("track_exec_test_recording.mjpeg");
        let sink = RecordingSink::new(&RecorderParams::default());

        sink.start(&path, 16, 8).unwrap();
        sink.append(&RgbImage::new(16, 8)).unwrap();
        // Mismatched frames are resized rather than rejected
        sink.append(&RgbImage::new(32, 32)).unwrap();
        sink.stop().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let soi = bytes
            .windows(2)
            .filter(|w| w[0] == 0xFF && w[1] == 0xD8)
            .count();
        assert_eq!(bytes[0], 0xFF);
        assert_eq!(bytes[1], 0xD8);
        assert_eq!(soi, 2);

        std::fs::remove_file(&path).ok();
    }
}
