//! # Actuator Client
//!
//! Provides the [`Actuator`] abstraction used by the controller, along with `ActuatorLink`, which
//! drives the real actuator over a byte transport (usually a serial device), and `SimActuator`
//! which moves a simulated target.
//!
//! The link is safe to use while disconnected: movement commands are simply dropped.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod params;
mod sim;

pub use params::ActParams;
pub use sim::SimActuator;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::act::{ActCmd, LinkStatus, MoveDemand, PowerLimits};
use log::{debug, info, warn};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{
    mpsc::{channel, Receiver, Sender},
    Mutex, MutexGuard,
};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Something which can be told to move.
pub trait Actuator: Send + Sync {
    /// Move by the given demand. Must never block for long or fail; an actuator that can't move
    /// drops the command.
    fn move_by(&self, demand: MoveDemand);

    fn status(&self) -> LinkStatus;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct ActuatorLink {
    inner: Mutex<LinkInner>,
    subscribers: Mutex<Vec<Sender<LinkStatus>>>,
}

struct LinkInner {
    transport: Option<Box<dyn Write + Send>>,
    status: LinkStatus,
    limits: PowerLimits,
    delay_ms: u32,
    commands_sent: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Could not open the actuator device {0:?}: {1}")]
    OpenError(String, std::io::Error),

    #[error("The link is not connected")]
    NotConnected,

    #[error("Could not write to the actuator: {0}")]
    WriteError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ActuatorLink {
    /// Create a disconnected link.
    pub fn new(params: &ActParams) -> Self {
        Self {
            inner: Mutex::new(LinkInner {
                transport: None,
                status: LinkStatus::Disconnected,
                limits: params.power_limits,
                delay_ms: params.delay_ms,
                commands_sent: 0,
            }),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Connect to the device at the given path.
    pub fn connect<P: AsRef<Path>>(&self, device: P) -> Result<(), LinkError> {
        self.set_status(LinkStatus::Connecting);

        let file = OpenOptions::new()
            .write(true)
            .open(device.as_ref())
            .map_err(|e| {
                self.set_status(LinkStatus::Disconnected);
                LinkError::OpenError(device.as_ref().display().to_string(), e)
            })?;

        info!("Actuator device {:?} opened", device.as_ref());
        self.connect_with(Box::new(file))
    }

    /// Connect using an already open transport.
    ///
    /// The current delay setting is sent as soon as the link is up.
    pub fn connect_with(&self, transport: Box<dyn Write + Send>) -> Result<(), LinkError> {
        {
            let mut inner = self.lock();
            inner.transport = Some(transport);
            inner.status = LinkStatus::Connected;
        }
        self.notify(LinkStatus::Connected);

        let delay_ms = self.lock().delay_ms;
        self.send(ActCmd::SetDelay { delay_ms })
    }

    pub fn disconnect(&self) {
        let was_connected = {
            let mut inner = self.lock();
            inner.transport = None;
            inner.status != LinkStatus::Disconnected
        };

        if was_connected {
            self.set_status(LinkStatus::Disconnected);
        }
    }

    /// Receive every future status change of the link.
    pub fn subscribe(&self) -> Receiver<LinkStatus> {
        let (tx, rx) = channel();
        match self.subscribers.lock() {
            Ok(mut s) => s.push(tx),
            Err(e) => e.into_inner().push(tx),
        }
        rx
    }

    pub fn power_limits(&self) -> PowerLimits {
        self.lock().limits
    }

    /// Change the delay between actuator pulses, sending it straight away if connected.
    pub fn set_delay(&self, delay_ms: u32) -> Result<(), LinkError> {
        let connected = {
            let mut inner = self.lock();
            inner.delay_ms = delay_ms;
            inner.status == LinkStatus::Connected
        };

        if connected {
            self.send(ActCmd::SetDelay { delay_ms })
        } else {
            Ok(())
        }
    }

    /// Number of commands successfully written.
    pub fn commands_sent(&self) -> u64 {
        self.lock().commands_sent
    }

    /// Write a command to the transport. A write failure drops the link.
    fn send(&self, cmd: ActCmd) -> Result<(), LinkError> {
        let result = {
            let mut inner = self.lock();

            let transport = match inner.transport {
                Some(ref mut t) => t,
                None => return Err(LinkError::NotConnected),
            };

            let line = cmd.to_line();
            let result = transport
                .write_all(line.as_bytes())
                .and_then(|_| transport.flush());

            match result {
                Ok(()) => {
                    inner.commands_sent += 1;
                    Ok(())
                }
                Err(e) => {
                    inner.transport = None;
                    inner.status = LinkStatus::Disconnected;
                    Err(e)
                }
            }
        };

        result.map_err(|e| {
            warn!("Actuator link lost: {}", e);
            self.notify(LinkStatus::Disconnected);
            LinkError::WriteError(e)
        })
    }

    fn set_status(&self, status: LinkStatus) {
        let changed = {
            let mut inner = self.lock();
            let changed = inner.status != status;
            inner.status = status;
            changed
        };

        if changed {
            self.notify(status);
        }
    }

    /// Send the status to all subscribers, forgetting any which have gone away.
    fn notify(&self, status: LinkStatus) {
        info!("Actuator link {}", status);

        let mut subs = match self.subscribers.lock() {
            Ok(s) => s,
            Err(e) => e.into_inner(),
        };
        subs.retain(|tx| tx.send(status).is_ok());
    }

    fn lock(&self) -> MutexGuard<LinkInner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        }
    }
}

impl Actuator for ActuatorLink {
    fn move_by(&self, demand: MoveDemand) {
        let clamped = self.power_limits().apply(demand);

        match self.send(ActCmd::Move(clamped)) {
            Ok(()) => debug!("Sent move ({}, {})", clamped.x, clamped.y),
            Err(LinkError::NotConnected) => {
                debug!("Link not connected, dropping move ({}, {})", clamped.x, clamped.y)
            }
            Err(e) => warn!("Move ({}, {}) not sent: {}", clamped.x, clamped.y, e),
        }
    }

    fn status(&self) -> LinkStatus {
        self.lock().status
    }
}
