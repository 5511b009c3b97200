//! Synchronous JetDrive bring-up
//!
//! Blocking wrapper for command-line use: connects, runs the full start-up
//! handshake and waits for each step to finish before returning. It drives
//! the same [`JetDrive`] controller as the event loop, through the polling
//! [`BlockingDriver`], so the command sequence and settle times are the ones
//! of the asynchronous path.

use std::time::{Duration, Instant};
use thiserror::Error;

use super::builder::BuildError;
use super::command::Command;
use super::controller::{JetDrive, START_COMMAND};
use crate::protocol::{
    open_port, BlockingDriver, CommunicationChannel, DeviceEvent, PortError, SerialChannel,
    SerialDevice,
};

/// Why a blocking JetDrive call did not complete
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LegacyError {
    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Build(#[from] BuildError),

    /// The device dropped the connection; carries the last error reported
    #[error("{0}")]
    Disconnected(String),

    #[error("JetDrive did not finish within {0:?}")]
    Stalled(Duration),
}

/// A JetDrive driven synchronously over a blocking channel
pub struct LegacyJetDrive<C> {
    driver: BlockingDriver<C>,
    jet: JetDrive,
    events: Vec<DeviceEvent>,
}

impl LegacyJetDrive<SerialChannel> {
    /// Open `port` with the controller's line settings
    pub fn open(port: &str, jet: JetDrive) -> Result<Self, LegacyError> {
        let serial = open_port(port, &jet.port_settings())?;
        Ok(Self::new(SerialChannel::new(serial), port, jet))
    }
}

impl<C: CommunicationChannel> LegacyJetDrive<C> {
    /// Drive `jet` over an already open channel
    pub fn new(channel: C, port_name: &str, jet: JetDrive) -> Self {
        Self {
            driver: BlockingDriver::new(channel, port_name),
            jet,
            events: Vec::new(),
        }
    }

    pub fn controller(&self) -> &JetDrive {
        &self.jet
    }

    pub fn channel_mut(&mut self) -> &mut C {
        self.driver.channel_mut()
    }

    /// Signals reported since the last call
    pub fn take_events(&mut self) -> Vec<DeviceEvent> {
        self.collect();
        std::mem::take(&mut self.events)
    }

    fn collect(&mut self) {
        self.events.extend(self.driver.take_events());
    }

    /// Upper bound on how long the handshake may take
    fn bring_up_limit(&self) -> Duration {
        let timing = self.jet.timing();
        let frames = 1 + START_COMMAND.len() + timing.bring_up.len();
        let settles: Duration = timing.bring_up.iter().map(|(_, settle)| *settle).sum();
        timing.connect_delay
            + timing.slow_responder_wait
            + timing.echo_settle * START_COMMAND.len() as u32
            + timing.start_settle
            + settles
            + timing.response_timeout * frames as u32
    }

    /// Connect and block until the JetDrive is initialized
    pub fn bring_up(&mut self) -> Result<(), LegacyError> {
        let limit = self.bring_up_limit();
        self.driver.connect(&mut self.jet);
        let done = self
            .driver
            .run_until(&mut self.jet, limit, |jet| jet.is_initialized());
        self.finish(done, limit)
    }

    /// Run `request` against the controller and block until every frame it
    /// queued has been answered
    pub fn run(
        &mut self,
        request: impl FnOnce(&mut JetDrive, Instant) -> Result<(), BuildError>,
    ) -> Result<(), LegacyError> {
        request(&mut self.jet, Instant::now())?;
        let limit = self.jet.timing().response_timeout * 4;
        let done = self
            .driver
            .run_until(&mut self.jet, limit, |jet| jet.link().is_idle());
        self.finish(done, limit)
    }

    /// Jet continuously for `hold`, then return to single jetting
    pub fn fire(&mut self, hold: Duration) -> Result<(), LegacyError> {
        self.run(|jet, now| jet.soft_trigger(now))?;

        let still_up = !self.driver.run_until(&mut self.jet, hold, |jet| !jet.is_connected());
        self.finish(still_up, hold)?;

        self.run(|jet, now| {
            if jet.settings().continuous {
                jet.set_single_jetting(now)
            } else {
                jet.send_command(Command::ContMode, now)
            }
        })
    }

    /// Close the connection and flush the final signals
    pub fn disconnect(&mut self) {
        self.jet.disconnect();
        self.driver.step(&mut self.jet);
        self.collect();
    }

    fn finish(&mut self, done: bool, limit: Duration) -> Result<(), LegacyError> {
        self.collect();
        if !self.jet.is_connected() {
            let reason = self
                .events
                .iter()
                .rev()
                .find(|e| e.is_error() || e.is_timeout())
                .map(|e| e.text().to_string())
                .unwrap_or_else(|| "JetDrive disconnected".to_string());
            return Err(LegacyError::Disconnected(reason));
        }
        if !done {
            return Err(LegacyError::Stalled(limit));
        }
        Ok(())
    }
}
