//! # Control Ticker
//!
//! Paces the procedure's control loop. The executable uses an [`IntervalTicker`] which keeps a
//! fixed period, tests drive the loop with their own tickers.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::procedure::{ProcMode, Procedure, TickOutcome};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

pub trait Ticker {
    /// Block until the next tick is due.
    fn wait(&mut self);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Ticks with a fixed period, measured from the start of the previous tick.
pub struct IntervalTicker {
    period: Duration,
    cycle_start: Instant,

    /// Number of consecutive ticks which took longer than the period
    num_consec_overruns: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            cycle_start: Instant::now(),
            num_consec_overruns: 0,
        }
    }

    pub fn from_millis(period_ms: u64) -> Self {
        Self::new(Duration::from_millis(period_ms))
    }

    pub fn num_consec_overruns(&self) -> u64 {
        self.num_consec_overruns
    }
}

impl Ticker for IntervalTicker {
    fn wait(&mut self) {
        let cycle_dur = Instant::now() - self.cycle_start;

        match self.period.checked_sub(cycle_dur) {
            Some(d) => {
                self.num_consec_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - self.period.as_secs_f64()
                );
                self.num_consec_overruns += 1;
            }
        }

        self.cycle_start = Instant::now();
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Run a started procedure until it finishes or `stop` is set.
///
/// `on_tick` is called after every tick with the outcome. Returns the mode the procedure ended
/// in.
pub fn run_procedure<T, F>(
    procedure: &mut Procedure,
    ticker: &mut T,
    stop: &AtomicBool,
    mut on_tick: F,
) -> ProcMode
where
    T: Ticker + ?Sized,
    F: FnMut(&Procedure, TickOutcome),
{
    loop {
        ticker.wait();

        if stop.load(Ordering::Relaxed) {
            info!("Stop requested");
            procedure.stop();
            break;
        }

        let outcome = procedure.tick();
        on_tick(procedure, outcome);

        match outcome {
            TickOutcome::Finished | TickOutcome::NotRunning => break,
            _ => (),
        }
    }

    procedure.mode()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        act_client::{Actuator, SimActuator},
        cam::{source::SimTarget, tracking::BoundingBox, view::ViewScale},
        comp_state::CompState,
        ctrl::params::CtrlParams,
    };
    use nalgebra::Vector2;
    use std::sync::Arc;

    /// Ticker which doesn't wait, instead calling a closure standing in for the camera
    struct FakeTicker<F: FnMut(u64)> {
        ticks: u64,
        on_wait: F,
    }

    impl<F: FnMut(u64)> Ticker for FakeTicker<F> {
        fn wait(&mut self) {
            (self.on_wait)(self.ticks);
            self.ticks += 1;
        }
    }

    fn params() -> CtrlParams {
        CtrlParams {
            tick_interval_ms: 1,
            acceptance_radius: 5.0,
            deviation_threshold: 20.0,
            acquire_wait_ms: 0,
        }
    }

    fn box_around(pos: Vector2<f64>) -> BoundingBox {
        BoundingBox::new(pos.x - 10.0, pos.y - 10.0, pos.x + 10.0, pos.y + 10.0)
    }

    #[test]
    fn test_closed_loop_finishes() {
        let target = Arc::new(SimTarget::new(Vector2::new(50.0, 50.0), 200, 200));
        let sim = Arc::new(SimActuator::new(target.clone(), 0.5));
        let act: Arc<dyn Actuator> = sim.clone();

        let state = Arc::new(CompState::default());
        state.set_path(vec![Vector2::new(100.0, 50.0), Vector2::new(100.0, 100.0)]);
        state.tracking().update(box_around(target.position()));

        let mut procedure = Procedure::new(
            &params(),
            state.clone(),
            ViewScale::fixed(1.0, 1.0),
            Arc::downgrade(&act),
            None,
        );
        procedure.start().unwrap();

        // A fresh detection of the target before every tick
        let tracking = state.tracking().clone();
        let cam_target = target.clone();
        let mut ticker = FakeTicker {
            ticks: 0,
            on_wait: move |_| tracking.update(box_around(cam_target.position())),
        };

        let stop = AtomicBool::new(false);
        let mut outcomes = Vec::new();
        let mode = run_procedure(&mut procedure, &mut ticker, &stop, |_, o| outcomes.push(o));

        assert_eq!(mode, ProcMode::Finished);
        assert!(procedure.is_done());
        assert_eq!(procedure.index(), 2);
        assert!(ticker.ticks < 100);

        // Single axis commands only
        assert!(sim.demands().iter().all(|d| d.x == 0 || d.y == 0));
        assert!((target.position() - Vector2::new(100.0, 100.0)).norm() < 5.0);
        assert_eq!(outcomes.last(), Some(&TickOutcome::Finished));
    }

    #[test]
    fn test_stop_flag() {
        let target = Arc::new(SimTarget::new(Vector2::new(50.0, 50.0), 200, 200));
        let act: Arc<dyn Actuator> = Arc::new(SimActuator::new(target, 0.5));

        let state = Arc::new(CompState::default());
        state.set_path(vec![Vector2::new(150.0, 50.0)]);

        let mut procedure = Procedure::new(
            &params(),
            state.clone(),
            ViewScale::fixed(1.0, 1.0),
            Arc::downgrade(&act),
            None,
        );
        procedure.start().unwrap();

        // Tracking is never valid so every tick skips, until the stop flag is raised
        let stop = AtomicBool::new(false);
        let mut skipped = 0;
        let mut ticker = FakeTicker {
            ticks: 0,
            on_wait: |_| (),
        };
        let mode = run_procedure(&mut procedure, &mut ticker, &stop, |_, o| {
            assert_eq!(o, TickOutcome::Skipped);
            skipped += 1;
            if skipped == 5 {
                stop.store(true, Ordering::Relaxed);
            }
        });

        assert_eq!(mode, ProcMode::Stopped);
        assert_eq!(skipped, 5);
        assert!(!procedure.is_done());
    }

    #[test]
    fn test_interval_ticker() {
        let mut ticker = IntervalTicker::from_millis(5);
        let start = Instant::now();
        ticker.wait();
        ticker.wait();
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert_eq!(ticker.num_consec_overruns(), 0);
    }
}
