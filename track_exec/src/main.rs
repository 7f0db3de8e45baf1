//! Main tracker executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Start the video pipeline, which keeps the tracked position of the actuator up to date
//!     - Connect to the actuator, or simulate one if no device is configured
//!     - Wait for the actuator to be found on screen
//!     - Control loop, once per tick:
//!         - Handle console commands
//!         - Run one step of the path following procedure
//!         - Update the status board
//!     - Stop the pipeline and archive the results

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, error, info, warn};
use nalgebra::Vector2;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{channel, Receiver},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use track_lib::{
    act_client::{Actuator, ActuatorLink, SimActuator},
    cam::{
        params::SourceKind, FrameSource, ImageDirSource, Pipeline, SimTarget, Spinner,
        SyntheticSource, TrackingState,
    },
    comp_state::CompState,
    console::{ConsoleCmd, ConsoleError, SpinState},
    ctrl::{run_procedure, IntervalTicker, Procedure},
    params::TrackExecParams,
    path,
    status::{self, StatusBoard},
};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
    time::duration_to_millis,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Period at which the tracking state is checked while waiting for the actuator to be found.
const ACQUIRE_POLL_PERIOD: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Follow a path with a camera tracked actuator.
#[derive(Debug, StructOpt)]
#[structopt(name = "track_exec")]
struct Opt {
    /// CSV path file to follow, overriding the one in the parameters.
    #[structopt(parse(from_os_str))]
    path_file: Option<PathBuf>,

    /// The path file is in pixels of the displayed frame rather than camera pixels.
    #[structopt(long)]
    pixel_path: bool,

    /// Directory of images to use as the camera, overriding the parameters.
    #[structopt(long, parse(from_os_str))]
    image_dir: Option<PathBuf>,

    /// Record the preprocessed video into the session directory.
    #[structopt(long)]
    record: bool,

    /// Index of the visual modifier to use.
    #[structopt(long)]
    modifier: Option<usize>,

    /// Process every captured frame rather than only the latest.
    #[structopt(long)]
    process_all: bool,

    /// Initial zoom factor.
    #[structopt(long)]
    zoom: Option<f64>,

    /// Save a screenshot of the last annotated frame on exit.
    #[structopt(long)]
    screenshot: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("track_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Waypoint Tracker Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let mut params: TrackExecParams =
        util::params::load("track_exec.toml").wrap_err("Could not load exec params")?;

    if let Some(index) = opt.modifier {
        params.cam.detector.modifier_index = index;
    }
    if opt.process_all {
        params.cam.detector.process_latest = false;
    }
    if let Some(zoom) = opt.zoom {
        params.cam.preproc.zoom = zoom;
    }

    let sw_root = util::params::get_sw_root().wrap_err("Could not get the software root")?;

    info!("Exec parameters loaded");

    // ---- FRAME SOURCE ----

    let mut sim_target = None;

    let source: Box<dyn FrameSource> = match (opt.image_dir.as_ref(), params.cam.source.kind) {
        (Some(dir), _) => open_image_dir(dir.clone())?,
        (None, SourceKind::ImageDir) => {
            let dir = params
                .cam
                .source
                .image_dir
                .as_ref()
                .map(|d| sw_root.join(d))
                .ok_or_else(|| eyre!("The image_dir source needs an image directory"))?;
            open_image_dir(dir)?
        }
        (None, SourceKind::Synthetic) => {
            let w = params.cam.source.synthetic_width;
            let h = params.cam.source.synthetic_height;
            let target = Arc::new(SimTarget::new(
                Vector2::new(w as f64 * 0.5, h as f64 * 0.5),
                w,
                h,
            ));
            sim_target = Some(target.clone());

            info!("Using a {}x{} synthetic camera", w, h);
            Box::new(SyntheticSource::new(w, h, target).wrap_err("Invalid synthetic camera")?)
        }
    };

    // ---- ACTUATOR ----

    let link = Arc::new(ActuatorLink::new(&params.act));
    let link_status = link.subscribe();

    let actuator: Arc<dyn Actuator> = match (params.act.device.as_ref(), sim_target) {
        (Some(device), _) => {
            if let Err(e) = link.connect(device) {
                warn!("Actuator not connected, movement commands will be dropped: {}", e);
            }
            link.clone()
        }
        (None, Some(target)) => {
            info!("No actuator device set, simulating the actuator");
            Arc::new(SimActuator::new(target, params.sim_gain))
        }
        (None, None) => {
            warn!("No actuator device set, movement commands will be dropped");
            link.clone()
        }
    };

    // ---- VIDEO PIPELINE ----

    let tracking = Arc::new(TrackingState::new());
    let pipeline = Pipeline::start(source, &params.cam, tracking.clone(), None)
        .wrap_err("Failed to start the video pipeline")?;

    if opt.record {
        start_recording(&pipeline, &session);
    }

    // ---- STATUS BOARD ----

    let board = Arc::new(StatusBoard::new());
    let fps_label = board.add_label("FPS: 0.0");
    let link_label = board.add_label(format!("Actuator: {}", actuator.status()));

    // ---- ACQUISITION ----

    let acquire_start = Instant::now();
    let acquire_wait = Duration::from_millis(params.ctrl.acquire_wait_ms);

    while !tracking.is_valid() && acquire_start.elapsed() < acquire_wait {
        thread::sleep(ACQUIRE_POLL_PERIOD);
    }

    if tracking.is_valid() {
        info!(
            "Actuator found after {} ms",
            duration_to_millis(acquire_start.elapsed())
        );
    } else {
        warn!(
            "Actuator not found after {} ms, starting anyway",
            params.ctrl.acquire_wait_ms
        );
    }

    // ---- PATH ----

    // Loaded after acquisition so the view scale of pixel paths is known
    let state = Arc::new(CompState::new(tracking.clone()));
    let view = pipeline.view_scale();

    let path_file = opt
        .path_file
        .clone()
        .or_else(|| params.path_file.as_ref().map(|p| sw_root.join(p)));

    match path_file {
        Some(file) => {
            let points = path::load_csv(&file)
                .wrap_err_with(|| format!("Could not load the path from {:?}", file))?;
            info!("Loaded {} waypoints from {:?}", points.len(), file);

            if opt.pixel_path {
                state.set_path_from_pixels(&points, &view);
            } else {
                state.set_path(points);
            }
        }
        None => warn!("No path file given, the path is empty"),
    }

    // ---- CONSOLE ----

    let console = spawn_console().wrap_err("Could not start the console")?;

    // ---- MAIN LOOP ----

    let mut procedure = Procedure::new(
        &params.ctrl,
        state.clone(),
        view,
        Arc::downgrade(&actuator),
        Some(&board),
    );
    procedure
        .start()
        .wrap_err("Could not start the procedure")?;

    let stop = AtomicBool::new(false);
    let mut ticker = IntervalTicker::from_millis(procedure.tick_interval_ms());
    let fps_interval = Duration::from_millis(params.fps_poll_interval_ms);
    let mut last_fps_poll = Instant::now();
    let mut spinner = Spinner::new(Duration::from_millis(params.cam.preproc.spin_interval_ms));

    let mode = run_procedure(&mut procedure, &mut ticker, &stop, |_, _| {
        // Commands typed on the console
        for line in console.try_iter() {
            match ConsoleCmd::parse(&line) {
                Ok(ConsoleCmd::Stop) => stop.store(true, Ordering::Relaxed),
                Ok(cmd) => {
                    handle_console_cmd(cmd, &pipeline, &mut spinner, &link, &board, &session)
                }
                Err(ConsoleError::Empty) => (),
                Err(e) => warn!("Invalid command: {}", e),
            }
        }

        for status in link_status.try_iter() {
            board.set_label(link_label, format!("Actuator: {}", status));
        }

        if spinner.due(Instant::now()) {
            pipeline.increment_rotation();
        }

        if last_fps_poll.elapsed() >= fps_interval {
            let fps = status::frame_rate(pipeline.poll_frames(), last_fps_poll.elapsed());
            board.set_label(fps_label, format!("FPS: {:.1}", fps));
            last_fps_poll = Instant::now();
        }
    });

    info!("Procedure ended {:?}", mode);
    util::session::save_with_timestamp("procedures/report.json", procedure.report().clone());

    // ---- SHUTDOWN ----

    if opt.screenshot {
        let path = session.session_root.join("screenshot.png");
        match pipeline.save_screenshot(&path) {
            Ok(()) => info!("Screenshot saved to {:?}", path),
            Err(e) => warn!("Could not save a screenshot: {}", e),
        }
    }

    stop_recording(&pipeline, &session);
    drop(procedure);
    pipeline.stop();
    link.disconnect();

    info!("End of execution");

    session.exit();

    Ok(())
}

fn open_image_dir(dir: PathBuf) -> Result<Box<dyn FrameSource>, Report> {
    let source = ImageDirSource::open(&dir)
        .wrap_err_with(|| format!("Could not open the image directory {:?}", dir))?;
    info!("Using {} images from {:?}", source.num_images(), dir);
    Ok(Box::new(source))
}

fn start_recording(pipeline: &Pipeline, session: &Session) {
    let path = session.session_root.join("recording.mjpeg");

    match pipeline.start_recording(&path) {
        Ok(prev) => {
            if let Some(summary) = prev {
                session.save("recording.json", summary);
            }
            info!("Recording to {:?}", path);
        }
        Err(e) => error!("Could not start recording: {}", e),
    }
}

fn stop_recording(pipeline: &Pipeline, session: &Session) {
    match pipeline.stop_recording() {
        Ok(Some(summary)) => {
            info!("Recorded {} frames to {:?}", summary.frames, summary.path);
            session.save("recording.json", summary);
        }
        Ok(None) => (),
        Err(e) => error!("Could not finish the recording: {}", e),
    }
}

fn handle_console_cmd(
    cmd: ConsoleCmd,
    pipeline: &Pipeline,
    spinner: &mut Spinner,
    link: &ActuatorLink,
    board: &StatusBoard,
    session: &Session,
) {
    debug!("Console command: {:?}", cmd);

    match cmd {
        ConsoleCmd::Stop => (),
        ConsoleCmd::Zoom { factor } => match pipeline.set_zoom(factor) {
            Ok(()) => info!("Zoom set to {}", factor),
            Err(e) => warn!("{}", e),
        },
        ConsoleCmd::Rotate { angle_deg } => {
            let angle = match angle_deg {
                Some(a) => {
                    pipeline.set_rotation(a);
                    a
                }
                None => pipeline.increment_rotation(),
            };
            info!("Rotation set to {} deg", angle);
        }
        ConsoleCmd::Spin { state } => {
            let enabled = match state {
                Some(SpinState::On) => {
                    spinner.set_enabled(true);
                    true
                }
                Some(SpinState::Off) => {
                    spinner.set_enabled(false);
                    false
                }
                None => spinner.toggle(),
            };
            info!(
                "Continuous rotation {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        ConsoleCmd::Modifier { index } => match pipeline.set_modifier(index) {
            Ok(kind) => info!("Visual modifier set to {:?}", kind),
            Err(e) => warn!("{}", e),
        },
        ConsoleCmd::ProcessAll => pipeline.set_process_all(true),
        ConsoleCmd::ProcessLatest => pipeline.set_process_all(false),
        ConsoleCmd::Record => start_recording(pipeline, session),
        ConsoleCmd::EndRecord => stop_recording(pipeline, session),
        ConsoleCmd::Screenshot => {
            let path = session
                .session_root
                .join(format!("screenshot_{:.3}.png", util::session::get_elapsed_seconds()));
            match pipeline.save_screenshot(&path) {
                Ok(()) => info!("Screenshot saved to {:?}", path),
                Err(e) => warn!("Could not save a screenshot: {}", e),
            }
        }
        ConsoleCmd::Delay { delay_ms } => {
            if let Err(e) = link.set_delay(delay_ms) {
                warn!("Could not set the actuator delay: {}", e);
            }
        }
        ConsoleCmd::Status => info!("Status:\n{}", board.render()),
    }
}

/// Read lines from standard input on a background thread.
fn spawn_console() -> Result<Receiver<String>, io::Error> {
    let (tx, rx) = channel();

    thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(l) => {
                        if tx.send(l).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        })?;

    Ok(rx)
}
