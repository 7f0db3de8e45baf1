//! # Path Following Procedure
//!
//! A procedure drives the actuator along the current path once. Each control tick it reads the
//! tracked position of the actuator and issues at most one single-axis movement command:
//!
//! 1. If every waypoint has been reached, or the actuator no longer exists, the procedure
//!    finishes.
//! 2. If the tracking state isn't both fresh and valid the tick is skipped.
//! 3. The error is the vector from the actuator to the current waypoint. If it is shorter than
//!    the acceptance radius the waypoint is reached and the next tick targets the following one.
//! 4. If the actuator has drifted further than the deviation threshold from the line through the
//!    previous and current waypoints, it is steered back to the foot of the perpendicular on that
//!    line instead.
//! 5. The actuator is moved along whichever axis has the larger error, with a power equal to the
//!    magnitude of that error.
//!
//! The segment "source" is the previous waypoint, or for the first waypoint the actuator's
//! position when the procedure was started.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::act::{Direction, MoveDemand};
use log::{debug, info, trace, warn};
use nalgebra::Vector2;
use serde::Serialize;
use std::sync::{
    mpsc::{channel, Receiver, Sender},
    Arc, Weak,
};

use super::params::CtrlParams;
use crate::{
    act_client::Actuator,
    cam::view::ViewScale,
    comp_state::CompState,
    status::{LabelId, StatusBoard},
};
use util::maths::perp_intersect;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct Procedure {
    params: CtrlParams,

    /// Snapshot of the path taken when the procedure was created
    path: Vec<Vector2<f64>>,

    /// Index of the waypoint currently being targeted
    index: usize,

    /// Position of the actuator when the procedure was started
    initial: Vector2<f64>,

    state: Arc<CompState>,
    view: ViewScale,
    actuator: Weak<dyn Actuator>,

    mode: ProcMode,
    done: bool,

    labels: Option<ProcLabels>,
    events: Vec<Sender<ProcEvent>>,
    report: ProcReport,
}

/// Counts describing how a procedure went, archived by the executable once it ends.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProcReport {
    pub path_len: usize,
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub waypoints_reached: usize,
    pub commands: u64,
    pub corrections: u64,
    pub initial_position: [f64; 2],
    pub actuator_expired: bool,

    /// Mode the procedure ended in, `None` while it hasn't
    pub end_mode: Option<ProcMode>,
}

/// Status board labels owned by a procedure, removed when the procedure is dropped.
struct ProcLabels {
    board: Weak<StatusBoard>,
    dir: LabelId,
    err: LabelId,
    index: LabelId,
    perp: LabelId,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ProcMode {
    Idle,
    Running,
    Finished,
    Stopped,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProcEvent {
    Started,
    Stopped,
    Finished,
}

/// What happened during a single tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The procedure isn't running, nothing was done
    NotRunning,

    /// The procedure finished on this tick
    Finished,

    /// No fresh valid position was available
    Skipped,

    /// The waypoint with this index was reached, no command was issued
    WaypointReached(usize),

    /// The actuator was commanded to move
    Moved(MoveDemand),
}

#[derive(Debug, thiserror::Error)]
pub enum ProcedureError {
    #[error("The procedure can only be started once, it is currently {0:?}")]
    AlreadyStarted(ProcMode),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Procedure {
    /// Create a procedure following the state's current path.
    ///
    /// If a status board is given the procedure adds its labels to it, and removes them when it is
    /// dropped.
    pub fn new(
        params: &CtrlParams,
        state: Arc<CompState>,
        view: ViewScale,
        actuator: Weak<dyn Actuator>,
        board: Option<&Arc<StatusBoard>>,
    ) -> Self {
        let path = state.path();

        let labels = board.map(|b| ProcLabels {
            board: Arc::downgrade(b),
            dir: b.add_label("IDLE"),
            err: b.add_label(err_text(0.0, 0.0)),
            index: b.add_label(index_text(0)),
            perp: b.add_label(perp_text(0.0, 0.0, 0.0)),
        });

        let report = ProcReport {
            path_len: path.len(),
            ..Default::default()
        };

        Self {
            params: params.clone(),
            path,
            index: 0,
            initial: Vector2::zeros(),
            state,
            view,
            actuator,
            mode: ProcMode::Idle,
            done: false,
            labels,
            events: Vec::new(),
            report,
        }
    }

    /// Receive the procedure's started, stopped and finished events.
    pub fn subscribe(&mut self) -> Receiver<ProcEvent> {
        let (tx, rx) = channel();
        self.events.push(tx);
        rx
    }

    /// Start following the path from the actuator's current position.
    ///
    /// The position is read without consuming the tracking state's freshness.
    pub fn start(&mut self) -> Result<(), ProcedureError> {
        if self.mode != ProcMode::Idle {
            return Err(ProcedureError::AlreadyStarted(self.mode));
        }

        let tracking = self.state.tracking();
        if !tracking.is_valid() {
            warn!("Starting procedure without a valid actuator position");
        }
        self.initial = self.view.screen_to_path(&tracking.peek().center());
        self.report.initial_position = [self.initial.x, self.initial.y];

        self.mode = ProcMode::Running;
        info!(
            "Procedure started: {} waypoints from ({:.1}, {:.1})",
            self.path.len(),
            self.initial.x,
            self.initial.y
        );
        self.emit(ProcEvent::Started);

        Ok(())
    }

    /// Stop the procedure. Has no effect unless it is running.
    pub fn stop(&mut self) {
        if self.mode == ProcMode::Running {
            self.mode = ProcMode::Stopped;
            self.report.end_mode = Some(ProcMode::Stopped);
            info!("Procedure stopped at waypoint {}", self.index);
            self.emit(ProcEvent::Stopped);
        }
    }

    /// Run a single control step.
    pub fn tick(&mut self) -> TickOutcome {
        if self.mode != ProcMode::Running {
            return TickOutcome::NotRunning;
        }

        self.report.ticks += 1;

        // Finish once the path is done or the actuator has gone
        let actuator = match self.actuator.upgrade() {
            Some(a) if self.index < self.path.len() => a,
            Some(_) => {
                self.finish();
                return TickOutcome::Finished;
            }
            None => {
                info!("Actuator no longer exists");
                self.report.actuator_expired = true;
                self.finish();
                return TickOutcome::Finished;
            }
        };

        // Tracking lost, skip this tick
        let bbox = match self.state.tracking().take_actionable() {
            Some(b) => b,
            None => {
                trace!("No fresh position, skipping tick");
                self.report.skipped_ticks += 1;
                return TickOutcome::Skipped;
            }
        };

        let current = self.view.screen_to_path(&bbox.center());
        let target = self.path[self.index];
        let source = if self.index > 0 {
            self.path[self.index - 1]
        } else {
            self.initial
        };

        let mut err = target - current;
        self.set_label(|l| l.err, err_text(err.x, err.y));

        if err.norm() < self.params.acceptance_radius {
            let reached = self.index;
            self.index += 1;
            self.report.waypoints_reached += 1;
            info!(
                "Waypoint {} of {} reached at ({:.1}, {:.1})",
                reached + 1,
                self.path.len(),
                current.x,
                current.y
            );
            return TickOutcome::WaypointReached(reached);
        }
        self.set_label(|l| l.index, index_text(self.index));

        // Pull back onto the segment if too far away from it
        let foot = perp_intersect(&current, &source, &target);
        let perp = foot - current;
        let perp_sq = perp.norm_squared();
        self.set_label(|l| l.perp, perp_text(perp.x, perp.y, perp_sq));

        if perp_sq > self.params.deviation_threshold.powi(2) {
            debug!(
                "Deviation {:.1} over threshold, correcting towards ({:.1}, {:.1})",
                perp_sq.sqrt(),
                foot.x,
                foot.y
            );
            err = perp;
            self.report.corrections += 1;
        }

        let demand = demand_for(&err);
        if let Some(dir) = demand.direction() {
            self.set_label(|l| l.dir, dir.to_string());
        }

        debug!(
            "Moving ({}, {}) towards waypoint {}",
            demand.x, demand.y, self.index
        );
        actuator.move_by(demand);
        self.report.commands += 1;

        TickOutcome::Moved(demand)
    }

    pub fn mode(&self) -> ProcMode {
        self.mode
    }

    /// True once the procedure has finished. Never reset.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn initial_position(&self) -> Vector2<f64> {
        self.initial
    }

    pub fn report(&self) -> &ProcReport {
        &self.report
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.params.tick_interval_ms
    }

    fn finish(&mut self) {
        self.mode = ProcMode::Finished;
        self.done = true;
        self.report.end_mode = Some(ProcMode::Finished);

        info!(
            "Procedure finished: {}/{} waypoints, {} commands, {} skipped ticks",
            self.index,
            self.path.len(),
            self.report.commands,
            self.report.skipped_ticks
        );
        self.emit(ProcEvent::Finished);
    }

    fn emit(&mut self, event: ProcEvent) {
        self.events.retain(|tx| tx.send(event).is_ok());
    }

    fn set_label<F: Fn(&ProcLabels) -> LabelId>(&self, which: F, text: String) {
        if let Some(ref labels) = self.labels {
            if let Some(board) = labels.board.upgrade() {
                board.set_label(which(labels), text);
            }
        }
    }
}

impl Drop for ProcLabels {
    fn drop(&mut self) {
        if let Some(board) = self.board.upgrade() {
            for id in [self.dir, self.err, self.index, self.perp].iter() {
                board.remove_label(*id);
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Single axis demand reducing the larger component of the error. Power is the magnitude of that
/// component, truncated.
pub fn demand_for(err: &Vector2<f64>) -> MoveDemand {
    if err.x.abs() > err.y.abs() {
        let dir = if err.x > 0.0 {
            Direction::Right
        } else {
            Direction::Left
        };
        MoveDemand::along(dir, err.x.abs() as i32)
    } else {
        let dir = if err.y > 0.0 {
            Direction::Down
        } else {
            Direction::Up
        };
        MoveDemand::along(dir, err.y.abs() as i32)
    }
}

fn err_text(x: f64, y: f64) -> String {
    format!("Error: ({:6.1} , {:6.1} )", x, y)
}

fn index_text(index: usize) -> String {
    format!("Index: {}", index)
}

fn perp_text(x: f64, y: f64, norm_sq: f64) -> String {
    format!("PerpD: ({:6.1} , {:6.1} ) : {:6.1}", x, y, norm_sq)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cam::tracking::BoundingBox;
    use comms_if::eqpt::act::LinkStatus;
    use std::sync::Mutex;

    /// Actuator recording every demand
    #[derive(Default)]
    struct Recorder {
        demands: Mutex<Vec<MoveDemand>>,
    }

    impl Actuator for Recorder {
        fn move_by(&self, demand: MoveDemand) {
            self.demands.lock().unwrap().push(demand);
        }

        fn status(&self) -> LinkStatus {
            LinkStatus::Connected
        }
    }

    impl Recorder {
        fn count(&self) -> usize {
            self.demands.lock().unwrap().len()
        }
    }

    /// Box of size 2x2 centred on the point
    fn box_at(x: f64, y: f64) -> BoundingBox {
        BoundingBox::new(x - 1.0, y - 1.0, x + 1.0, y + 1.0)
    }

    fn params() -> CtrlParams {
        CtrlParams {
            tick_interval_ms: 10,
            acceptance_radius: 5.0,
            deviation_threshold: 20.0,
            acquire_wait_ms: 0,
        }
    }

    struct Fixture {
        state: Arc<CompState>,
        act: Arc<Recorder>,
        board: Arc<StatusBoard>,
    }

    impl Fixture {
        fn new(path: Vec<Vector2<f64>>) -> Self {
            let state = Arc::new(CompState::default());
            state.set_path(path);
            Self {
                state,
                act: Arc::new(Recorder::default()),
                board: Arc::new(StatusBoard::new()),
            }
        }

        fn procedure(&self) -> Procedure {
            let act: Arc<dyn Actuator> = self.act.clone();
            Procedure::new(
                &params(),
                self.state.clone(),
                ViewScale::fixed(1.0, 1.0),
                Arc::downgrade(&act),
                Some(&self.board),
            )
        }

        fn see(&self, x: f64, y: f64) {
            self.state.tracking().update(box_at(x, y));
        }
    }

    fn spec_path() -> Vec<Vector2<f64>> {
        vec![Vector2::new(100.0, 0.0), Vector2::new(100.0, 100.0)]
    }

    #[test]
    fn test_waypoint_acceptance() {
        let fx = Fixture::new(spec_path());
        fx.see(0.0, 0.0);

        let mut p = fx.procedure();
        p.start().unwrap();
        assert_eq!(p.initial_position(), Vector2::new(0.0, 0.0));

        fx.see(98.0, 0.0);
        assert_eq!(p.tick(), TickOutcome::WaypointReached(0));
        assert_eq!(p.index(), 1);
        assert_eq!(fx.act.count(), 0);
    }

    #[test]
    fn test_perpendicular_correction() {
        let fx = Fixture::new(spec_path());
        fx.see(0.0, 0.0);

        let mut p = fx.procedure();
        p.start().unwrap();

        fx.see(0.0, 50.0);
        assert_eq!(p.tick(), TickOutcome::Moved(MoveDemand::new(0, -50)));
        assert_eq!(p.index(), 0);

        let demands = fx.act.demands.lock().unwrap().clone();
        assert_eq!(demands, vec![MoveDemand::new(0, -50)]);

        let lines = fx.board.lines();
        assert_eq!(lines[0], "UP");
        assert_eq!(lines[1], "Error: ( 100.0 ,  -50.0 )");
        assert_eq!(lines[2], "Index: 0");
        assert_eq!(lines[3], "PerpD: (   0.0 ,  -50.0 ) : 2500.0");
        assert_eq!(p.report().corrections, 1);
    }

    #[test]
    fn test_no_correction_under_threshold() {
        let fx = Fixture::new(spec_path());
        fx.see(0.0, 0.0);

        let mut p = fx.procedure();
        p.start().unwrap();

        // 10 px off the segment, under the 20 px threshold, so chase the waypoint
        fx.see(40.0, 10.0);
        assert_eq!(p.tick(), TickOutcome::Moved(MoveDemand::new(60, 0)));

        // Power is truncated
        fx.see(40.6, 2.0);
        assert_eq!(p.tick(), TickOutcome::Moved(MoveDemand::new(59, 0)));
    }

    #[test]
    fn test_stale_and_invalid_ticks() {
        let fx = Fixture::new(spec_path());
        fx.see(0.0, 0.0);

        let mut p = fx.procedure();
        p.start().unwrap();

        // First tick consumes the position captured at start
        assert!(matches!(p.tick(), TickOutcome::Moved(_)));

        // Stale
        assert_eq!(p.tick(), TickOutcome::Skipped);

        // Fresh but invalid
        fx.see(98.0, 0.0);
        fx.state.tracking().invalidate();
        assert_eq!(p.tick(), TickOutcome::Skipped);

        assert_eq!(p.index(), 0);
        assert_eq!(fx.act.count(), 1);
        assert_eq!(p.report().skipped_ticks, 2);
    }

    #[test]
    fn test_empty_path() {
        let fx = Fixture::new(vec![]);
        let mut p = fx.procedure();
        let events = p.subscribe();

        assert_eq!(p.mode(), ProcMode::Idle);
        p.start().unwrap();
        assert_eq!(p.mode(), ProcMode::Running);

        assert_eq!(p.report().end_mode, None);
        assert_eq!(p.tick(), TickOutcome::Finished);
        assert_eq!(p.mode(), ProcMode::Finished);
        assert!(p.is_done());
        assert_eq!(p.report().end_mode, Some(ProcMode::Finished));
        assert_eq!(p.tick(), TickOutcome::NotRunning);

        let got: Vec<_> = events.try_iter().collect();
        assert_eq!(got, vec![ProcEvent::Started, ProcEvent::Finished]);
        assert_eq!(fx.act.count(), 0);
    }

    #[test]
    fn test_expired_actuator_finishes() {
        let fx = Fixture::new(spec_path());
        fx.see(0.0, 0.0);

        let act: Arc<dyn Actuator> = Arc::new(Recorder::default());
        let mut p = Procedure::new(
            &params(),
            fx.state.clone(),
            ViewScale::fixed(1.0, 1.0),
            Arc::downgrade(&act),
            None,
        );
        p.start().unwrap();
        drop(act);

        assert_eq!(p.tick(), TickOutcome::Finished);
        assert!(p.is_done());
        assert!(p.report().actuator_expired);
    }

    #[test]
    fn test_start_stop() {
        let fx = Fixture::new(spec_path());
        let mut p = fx.procedure();
        let events = p.subscribe();

        // Not running yet
        assert_eq!(p.tick(), TickOutcome::NotRunning);

        p.start().unwrap();
        assert!(matches!(
            p.start(),
            Err(ProcedureError::AlreadyStarted(ProcMode::Running))
        ));

        p.stop();
        assert_eq!(p.mode(), ProcMode::Stopped);
        assert!(!p.is_done());
        assert_eq!(p.report().end_mode, Some(ProcMode::Stopped));
        fx.see(50.0, 0.0);
        assert_eq!(p.tick(), TickOutcome::NotRunning);
        assert_eq!(fx.act.count(), 0);

        // Stopping twice only emits once
        p.stop();
        let got: Vec<_> = events.try_iter().collect();
        assert_eq!(got, vec![ProcEvent::Started, ProcEvent::Stopped]);
    }

    #[test]
    fn test_start_does_not_consume() {
        let fx = Fixture::new(spec_path());
        fx.see(10.0, 0.0);

        let mut p = fx.procedure();
        p.start().unwrap();
        assert!(fx.state.tracking().peek_fresh());
    }

    #[test]
    fn test_view_scale_applied() {
        let fx = Fixture::new(spec_path());
        let act: Arc<dyn Actuator> = fx.act.clone();
        let mut p = Procedure::new(
            &params(),
            fx.state.clone(),
            ViewScale::fixed(2.0, 1.0),
            Arc::downgrade(&act),
            None,
        );

        // Screen (196, 0) is path (98, 0)
        fx.see(0.0, 0.0);
        p.start().unwrap();
        fx.see(196.0, 0.0);
        assert_eq!(p.tick(), TickOutcome::WaypointReached(0));
    }

    #[test]
    fn test_labels_removed_on_drop() {
        let fx = Fixture::new(spec_path());
        let other = fx.board.add_label("fps");

        let p = fx.procedure();
        assert_eq!(fx.board.len(), 5);
        assert_eq!(fx.board.lines()[1], "IDLE");

        drop(p);
        assert_eq!(fx.board.len(), 1);
        assert_eq!(fx.board.label(other), Some("fps".to_string()));
    }

    #[test]
    fn test_demand_for() {
        assert_eq!(demand_for(&Vector2::new(-12.7, 3.0)), MoveDemand::new(-12, 0));
        assert_eq!(demand_for(&Vector2::new(3.0, 12.7)), MoveDemand::new(0, 12));
        // Ties go vertical
        assert_eq!(demand_for(&Vector2::new(5.0, -5.0)), MoveDemand::new(0, -5));
    }

    #[test]
    fn test_index_monotone_and_bounded() {
        let path = vec![
            Vector2::new(10.0, 0.0),
            Vector2::new(20.0, 0.0),
            Vector2::new(20.0, 10.0),
        ];
        let fx = Fixture::new(path.clone());
        fx.see(0.0, 0.0);

        let mut p = fx.procedure();
        p.start().unwrap();

        // Teleport onto each waypoint in turn, interleaved with stale ticks
        let mut last = 0;
        for (i, wp) in path.iter().enumerate() {
            fx.see(wp.x, wp.y);
            assert_eq!(p.tick(), TickOutcome::WaypointReached(i));
            assert_eq!(p.tick(), TickOutcome::Skipped);
            assert!(p.index() > last);
            assert!(p.index() <= path.len());
            last = p.index();
        }

        assert_eq!(p.index(), path.len());
        assert_eq!(p.tick(), TickOutcome::Finished);
    }
}
