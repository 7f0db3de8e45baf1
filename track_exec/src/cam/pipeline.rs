//! # Video Pipeline
//!
//! Runs the capture, preprocessing, detection and recording stages as independent named threads,
//! connected by [`FrameQueue`]s:
//!
//! ```text
//!  capture --raw--> preproc --+--> converter --> tracking state, display
//!                             |
//!                             +--> recorder (only while recording)
//! ```
//!
//! Stopping the pipeline closes every queue. Each stage finishes the frame it is holding and then
//! exits, anything still queued is discarded.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, error, info, warn};
use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::Sender,
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{
    converter::{Converter, ConverterError, Detection},
    frame::{Frame, PreprocessedFrame},
    modifier::ModifierKind,
    params::CamParams,
    preproc::{PreprocError, Preprocessor},
    queue::FrameQueue,
    recorder::{RecordError, RecordSummary, RecordingSink},
    source::FrameSource,
    tracking::TrackingState,
    view::ViewScale,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum number of frames waiting for the preprocessor or recorder.
const STAGE_QUEUE_CAP: usize = 64;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct Pipeline {
    preproc: Arc<Preprocessor>,
    converter: Arc<Converter>,
    recorder: Arc<RecordingSink>,

    raw_queue: Arc<FrameQueue<Frame>>,
    /// Frames for the recorder, tagged with the recording generation they were captured in
    rec_queue: Arc<FrameQueue<(u64, Frame)>>,

    resolution: (u32, u32),

    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Could not spawn the {0} thread: {1}")]
    SpawnError(&'static str, std::io::Error),

    #[error("Preprocessor error: {0}")]
    PreprocError(#[from] PreprocError),

    #[error("Converter error: {0}")]
    ConverterError(#[from] ConverterError),

    #[error("Recorder error: {0}")]
    RecordError(#[from] RecordError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Pipeline {
    /// Start all pipeline stages.
    ///
    /// Boxes found by the detector are written into `tracking`. If `display` is given every
    /// detection is also sent to it.
    pub fn start(
        source: Box<dyn FrameSource>,
        params: &CamParams,
        tracking: Arc<TrackingState>,
        display: Option<Sender<Detection>>,
    ) -> Result<Self, PipelineError> {
        let preproc = Arc::new(Preprocessor::new(&params.preproc)?);
        let converter = Arc::new(Converter::new(&params.detector, tracking)?);
        let recorder = Arc::new(RecordingSink::new(&params.recorder));

        let raw_queue = Arc::new(FrameQueue::new(false, STAGE_QUEUE_CAP));
        let rec_queue = Arc::new(FrameQueue::new(false, STAGE_QUEUE_CAP));
        let stop = Arc::new(AtomicBool::new(false));
        let resolution = source.resolution();

        let mut pipeline = Self {
            preproc,
            converter,
            recorder,
            raw_queue,
            rec_queue,
            resolution,
            stop,
            handles: Vec::new(),
        };

        // Spawn stages from the end of the pipeline backwards, so nothing is produced before its
        // consumer exists
        let r = pipeline.spawn_recorder();
        pipeline.push_handle(r)?;
        let c = pipeline.spawn_converter(display);
        pipeline.push_handle(c)?;
        let p = pipeline.spawn_preproc();
        pipeline.push_handle(p)?;
        let interval = Duration::from_millis(params.source.frame_interval_ms);
        let c = pipeline.spawn_capture(source, interval);
        pipeline.push_handle(c)?;

        info!(
            "Pipeline started ({}x{}, {} ms frame interval)",
            resolution.0, resolution.1, params.source.frame_interval_ms
        );

        Ok(pipeline)
    }

    /// Stop all stages and wait for them to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Live view of the screen to path space scale.
    pub fn view_scale(&self) -> ViewScale {
        ViewScale::new(self.preproc.shared_transform(), self.converter.output_scale())
    }

    pub fn set_zoom(&self, zoom: f64) -> Result<(), PipelineError> {
        self.preproc.set_zoom(zoom).map_err(PipelineError::from)
    }

    pub fn zoom(&self) -> f64 {
        self.preproc.zoom()
    }

    pub fn set_rotation(&self, angle_deg: f64) {
        self.preproc.set_rotation(angle_deg)
    }

    pub fn increment_rotation(&self) -> f64 {
        self.preproc.increment_rotation()
    }

    pub fn set_modifier(&self, index: usize) -> Result<ModifierKind, PipelineError> {
        self.converter.set_modifier(index).map_err(PipelineError::from)
    }

    pub fn set_process_all(&self, process_all: bool) {
        self.converter.set_process_all(process_all)
    }

    /// Frames processed by the detector since the last poll.
    pub fn poll_frames(&self) -> u64 {
        self.converter.get_and_reset_frames()
    }

    /// Start recording preprocessed frames at the source resolution.
    pub fn start_recording<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<Option<RecordSummary>, PipelineError> {
        let (w, h) = self.resolution;
        self.start_recording_with_size(path, w, h)
    }

    pub fn start_recording_with_size<P: AsRef<Path>>(
        &self,
        path: P,
        width: u32,
        height: u32,
    ) -> Result<Option<RecordSummary>, PipelineError> {
        self.recorder
            .start(path, width, height)
            .map_err(PipelineError::from)
    }

    pub fn stop_recording(&self) -> Result<Option<RecordSummary>, PipelineError> {
        self.recorder.stop().map_err(PipelineError::from)
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn save_screenshot<P: AsRef<Path>>(&self, path: P) -> Result<(), PipelineError> {
        self.converter
            .save_screenshot(path)
            .map_err(PipelineError::from)
    }

    fn push_handle(
        &mut self,
        handle: Result<JoinHandle<()>, PipelineError>,
    ) -> Result<(), PipelineError> {
        match handle {
            Ok(h) => {
                self.handles.push(h);
                Ok(())
            }
            Err(e) => {
                // Stop anything already running before reporting the error
                self.shutdown();
                Err(e)
            }
        }
    }

    fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }

        info!("Stopping pipeline");

        self.stop.store(true, Ordering::Relaxed);
        self.raw_queue.close();
        self.converter.queue().close();
        self.rec_queue.close();

        for h in self.handles.drain(..) {
            let name = h.thread().name().unwrap_or("-").to_string();
            if h.join().is_err() {
                error!("Pipeline thread {} panicked", name);
            }
        }

        info!("Pipeline stopped");
    }

    fn spawn_capture(
        &self,
        mut source: Box<dyn FrameSource>,
        interval: Duration,
    ) -> Result<JoinHandle<()>, PipelineError> {
        let stop = self.stop.clone();
        let out = self.raw_queue.clone();

        spawn("capture", move || {
            info!("Capture started");
            let mut next_id: u64 = 1;

            while !stop.load(Ordering::Relaxed) {
                let start = Instant::now();

                match source.capture() {
                    Ok(Some(image)) => {
                        out.push(Frame::new(next_id, image));
                        next_id += 1;
                    }
                    Ok(None) => (),
                    Err(e) => warn!("Capture failed: {}", e),
                }

                if let Some(d) = interval.checked_sub(start.elapsed()) {
                    thread::sleep(d);
                }
            }

            info!("Capture stopped after {} frames", next_id - 1);
        })
    }

    fn spawn_preproc(&self) -> Result<JoinHandle<()>, PipelineError> {
        let preproc = self.preproc.clone();
        let recorder = self.recorder.clone();
        let input = self.raw_queue.clone();
        let rec_out = self.rec_queue.clone();
        let conv_out = self.converter.queue();

        spawn("preproc", move || {
            info!("Preprocessor started");

            while let Some(frame) = input.pop() {
                let pp: PreprocessedFrame = preproc.preprocess(frame);

                if let Some(generation) = recorder.active_generation() {
                    rec_out.push((generation, pp.frame.clone()));
                }

                conv_out.push(pp);
            }

            info!("Preprocessor stopped");
        })
    }

    fn spawn_converter(
        &self,
        display: Option<Sender<Detection>>,
    ) -> Result<JoinHandle<()>, PipelineError> {
        let converter = self.converter.clone();

        spawn("converter", move || {
            let mut display = display;

            converter.run(|det| {
                let disconnected = match display {
                    Some(ref tx) => tx.send(det).is_err(),
                    None => false,
                };

                if disconnected {
                    debug!("Display receiver dropped, no longer sending detections");
                    display = None;
                }
            });
        })
    }

    fn spawn_recorder(&self) -> Result<JoinHandle<()>, PipelineError> {
        let recorder = self.recorder.clone();
        let input = self.rec_queue.clone();

        spawn("recorder", move || {
            info!("Recorder started");

            while let Some((generation, frame)) = input.pop() {
                if let Err(e) = recorder.append_to(generation, &frame.image) {
                    warn!("Could not record frame {}: {}", frame.id, e);
                }
            }

            info!("Recorder stopped");
        })
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn<F>(name: &'static str, f: F) -> Result<JoinHandle<()>, PipelineError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(f)
        .map_err(|e| PipelineError::SpawnError(name, e))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cam::{
        params::{DetectorParams, PreprocParams, RecorderParams, SourceKind, SourceParams},
        source::{SimTarget, SyntheticSource},
    };
    use nalgebra::Vector2;
    use std::sync::mpsc::channel;

    fn params() -> CamParams {
        CamParams {
            source: SourceParams {
                kind: SourceKind::Synthetic,
                image_dir: None,
                frame_interval_ms: 5,
                synthetic_width: 160,
                synthetic_height: 120,
            },
            preproc: PreprocParams::default(),
            detector: DetectorParams {
                modifier_index: 1,
                color_lower: [0, 0, 0],
                color_upper: [60, 60, 60],
                ..Default::default()
            },
            recorder: RecorderParams::default(),
        }
    }

    #[test]
    fn test_end_to_end_detection() {
        let target = Arc::new(SimTarget::new(Vector2::new(60.0, 50.0), 160, 120));
        let source = SyntheticSource::new(160, 120, target).unwrap();
        let tracking = Arc::new(TrackingState::new());
        let (tx, rx) = channel();

        let pipeline =
            Pipeline::start(Box::new(source), &params(), tracking.clone(), Some(tx)).unwrap();

        // Wait for a few valid detections
        let mut valid = 0;
        while valid < 3 {
            let det = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            if det.is_valid() {
                valid += 1;
            }
        }

        let bbox = tracking.peek();
        assert!(tracking.is_valid());
        assert!((bbox.center() - Vector2::new(60.0, 50.0)).norm() < 1.0);
        assert!(pipeline.poll_frames() >= 3);

        pipeline.stop();
    }

    #[test]
    fn test_zoom_visible_in_view_scale() {
        let target = Arc::new(SimTarget::new(Vector2::new(60.0, 50.0), 160, 120));
        let source = SyntheticSource::new(160, 120, target).unwrap();
        let tracking = Arc::new(TrackingState::new());
        let (tx, rx) = channel();

        let pipeline = Pipeline::start(Box::new(source), &params(), tracking, Some(tx)).unwrap();
        let view = pipeline.view_scale();

        pipeline.set_zoom(2.0).unwrap();
        assert_eq!(pipeline.zoom(), 2.0);
        assert!(pipeline.set_zoom(-1.0).is_err());

        // Once a zoomed frame is through, the target maps back to its path space position
        loop {
            let det = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            if det.frame.transform.zoom == 2.0 {
                if let Some(b) = det.bbox {
                    let p = view.screen_to_path(&b.center());
                    assert!((p - Vector2::new(60.0, 50.0)).norm() < 1.0);
                    break;
                }
            }
        }

        pipeline.stop();
    }

    #[test]
    fn test_recording_lifecycle() {
        let target = Arc::new(SimTarget::new(Vector2::new(60.0, 50.0), 160, 120));
        let source = SyntheticSource::new(160, 120, target).unwrap();
        let tracking = Arc::new(TrackingState::new());

        let pipeline = Pipeline::start(Box::new(source), &params(), tracking, None).unwrap();
        let path = std::env::temp_dir().join("track_exec_test_pipeline.mjpeg");

        assert!(!pipeline.is_recording());
        pipeline.start_recording(&path).unwrap();
        assert!(pipeline.is_recording());
        thread::sleep(Duration::from_millis(200));
        let summary = pipeline.stop_recording().unwrap().unwrap();

        assert_eq!(summary.width, 160);
        assert!(summary.frames > 0);
        assert!(!pipeline.is_recording());

        pipeline.stop();
        std::fs::remove_file(&path).ok();
    }
}
