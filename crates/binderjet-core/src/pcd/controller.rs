//! PCD pressure controller
//!
//! After the port settles the controller sends `Q` and expects the
//! identification string back. Until that reply arrives every other command
//! waits in the write queue.

use bytes::Bytes;
use std::time::{Duration, Instant};
use tokio_util::codec::Decoder;

use super::command::{set_point_frame, PcdCommand};
use crate::protocol::{
    DeviceEvent, Fault, LineCodec, Link, Outgoing, PortError, PortSettings, SerialDevice,
    DEFAULT_RESPONSE_TIMEOUT,
};

/// Device name used in messages
pub const NAME: &str = "Pressure Controller";

pub const DEFAULT_BAUD_RATE: u32 = 19200;

/// Quiet time between opening the port and sending `Q`
pub const DEFAULT_CONNECT_DELAY: Duration = Duration::from_millis(1500);

/// Identification string answering `Q`
pub const DEFAULT_INIT_REPLY: &str = "PCD";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    NotInitialized,
    Initialized,
}

/// What the in-flight frame expects back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Identification string
    Init,
    /// Any reply line
    Line(PcdCommand),
}

/// Controller for one PCD pressure controller
#[derive(Debug)]
pub struct Pcd {
    link: Link<Expect>,
    init_state: InitState,
    init_reply: String,
    connect_delay: Duration,
    port_settings: PortSettings,
    codec: LineCodec,
    set_point: Option<f64>,
    last_reply: Option<String>,
}

impl Default for Pcd {
    fn default() -> Self {
        Self::new()
    }
}

impl Pcd {
    /// Disconnected controller with the default timing and init reply
    pub fn new() -> Self {
        Self {
            link: Link::new(NAME, DEFAULT_RESPONSE_TIMEOUT),
            init_state: InitState::NotInitialized,
            init_reply: DEFAULT_INIT_REPLY.to_string(),
            connect_delay: DEFAULT_CONNECT_DELAY,
            port_settings: PortSettings::new(DEFAULT_BAUD_RATE),
            codec: LineCodec,
            set_point: None,
            last_reply: None,
        }
    }

    /// Quiet time between opening the port and the init command
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.link = Link::new(NAME, timeout);
        self
    }

    /// Identification the unit must answer `Q` with
    pub fn with_init_reply(mut self, reply: impl Into<String>) -> Self {
        self.init_reply = reply.into();
        self
    }

    pub fn with_port_settings(mut self, port_settings: PortSettings) -> Self {
        self.port_settings = port_settings;
        self
    }

    pub fn init_state(&self) -> InitState {
        self.init_state
    }

    pub fn is_initialized(&self) -> bool {
        self.init_state == InitState::Initialized
    }

    /// Last set point handed to [`update_set_point`](Self::update_set_point)
    pub fn set_point(&self) -> Option<f64> {
        self.set_point
    }

    /// Last line received in the initialized state
    pub fn last_reply(&self) -> Option<&str> {
        self.last_reply.as_deref()
    }

    pub fn link(&self) -> &Link<Expect> {
        &self.link
    }

    /// Queue a new pressure set point (psig)
    pub fn update_set_point(&mut self, psig: f64, now: Instant) -> bool {
        let Some(frame) = set_point_frame(psig) else {
            self.link
                .events()
                .error(format!("Invalid set point for {NAME}: {psig}"));
            return false;
        };
        self.set_point = Some(psig);
        self.link
            .send(Outgoing::new(frame, Expect::Line(PcdCommand::UnitId)), now)
    }

    /// Open the purge valve
    pub fn purge(&mut self, now: Instant) -> bool {
        self.send(PcdCommand::PurgeOn, now)
    }

    /// Close the purge valve
    pub fn stop_purge(&mut self, now: Instant) -> bool {
        self.send(PcdCommand::PurgeOff, now)
    }

    pub fn query_unit_id(&mut self, now: Instant) -> bool {
        self.send(PcdCommand::UnitId, now)
    }

    /// Take the set point from the serial line
    pub fn use_soft_serial(&mut self, now: Instant) -> bool {
        self.send(PcdCommand::UseSoftSerial, now)
    }

    /// Take the set point from the analog input
    pub fn use_analog(&mut self, now: Instant) -> bool {
        self.send(PcdCommand::UseAnalog, now)
    }

    fn send(&mut self, command: PcdCommand, now: Instant) -> bool {
        self.link
            .send(Outgoing::new(command.frame(), Expect::Line(command)), now)
    }

    fn handle_line(&mut self, expect: Expect, line: String, now: Instant) {
        match expect {
            Expect::Init if line == self.init_reply => {
                self.init_state = InitState::Initialized;
                self.link.events().response(format!("Connected to {NAME}"));
                self.link.complete(now);
            }
            Expect::Init => {
                self.link.events().error(format!(
                    "Unexpected response from device. Expected {} from device but got {}",
                    self.init_reply, line
                ));
                self.disconnect();
            }
            Expect::Line(command) => {
                tracing::debug!(device = NAME, ?command, reply = %line, "reply");
                self.link.events().response(line.clone());
                self.last_reply = Some(line);
                self.link.complete(now);
            }
        }
    }

    fn fail(&mut self, fault: Fault) {
        self.link.fail(fault);
        self.init_state = InitState::NotInitialized;
    }
}

impl SerialDevice for Pcd {
    fn name(&self) -> &str {
        NAME
    }

    fn port_settings(&self) -> PortSettings {
        self.port_settings
    }

    fn is_connected(&self) -> bool {
        self.link.is_open()
    }

    fn connect(&mut self, port: &str, now: Instant) {
        if !self.link.open(port) {
            return;
        }
        self.init_state = InitState::NotInitialized;
        self.link.events().response(format!("Connecting to {NAME}"));
        self.link.hold(now, self.connect_delay);
        self.link
            .send_first(vec![Outgoing::new(PcdCommand::Init.frame(), Expect::Init)], now);
    }

    fn connect_failed(&mut self, error: &PortError) {
        let reason = error.reason().unwrap_or("port unavailable");
        self.link.open_failed(error.port(), reason);
    }

    fn disconnect(&mut self) {
        self.link.close();
        self.init_state = InitState::NotInitialized;
    }

    fn handle_bytes(&mut self, data: &[u8], now: Instant) {
        if !self.link.accept(data) {
            return;
        }
        while let Some(expect) = self.link.in_flight().map(|f| f.tag) {
            let line = match self.codec.decode(self.link.rx_mut()) {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => return,
            };
            // Stray line endings between replies
            if line.is_empty() {
                continue;
            }
            self.handle_line(expect, line, now);
        }
    }

    fn handle_tick(&mut self, now: Instant) {
        if let Some(fault) = self.link.poll(now) {
            self.fail(fault);
        }
    }

    fn handle_port_error(&mut self, error: PortError) {
        self.fail(Fault::Transport(error));
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.link.deadline()
    }

    fn take_outbound(&mut self) -> Option<Bytes> {
        self.link.take_outbound()
    }

    fn take_purge_request(&mut self) -> bool {
        self.link.take_purge_request()
    }

    fn drain_events(&mut self) -> Vec<DeviceEvent> {
        self.link.drain_events()
    }
}
