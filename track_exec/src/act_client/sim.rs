//! Simulated actuator

use comms_if::eqpt::act::{LinkStatus, MoveDemand};
use log::trace;
use nalgebra::Vector2;
use std::sync::{Arc, Mutex};

use super::Actuator;
use crate::cam::source::SimTarget;

/// Moves a [`SimTarget`] by `gain` pixels per unit of power, and keeps every demand it was given.
pub struct SimActuator {
    target: Arc<SimTarget>,
    gain: f64,
    demands: Mutex<Vec<MoveDemand>>,
}

impl SimActuator {
    pub fn new(target: Arc<SimTarget>, gain: f64) -> Self {
        Self {
            target,
            gain,
            demands: Mutex::new(Vec::new()),
        }
    }

    /// All demands received so far.
    pub fn demands(&self) -> Vec<MoveDemand> {
        match self.demands.lock() {
            Ok(d) => d.clone(),
            Err(e) => e.into_inner().clone(),
        }
    }
}

impl Actuator for SimActuator {
    fn move_by(&self, demand: MoveDemand) {
        let delta = Vector2::new(demand.x as f64, demand.y as f64) * self.gain;
        self.target.move_by(delta);
        trace!("Sim target moved to {:?}", self.target.position());

        match self.demands.lock() {
            Ok(mut d) => d.push(demand),
            Err(e) => e.into_inner().push(demand),
        }
    }

    fn status(&self) -> LinkStatus {
        LinkStatus::Connected
    }
}
