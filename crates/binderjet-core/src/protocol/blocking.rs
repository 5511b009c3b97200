//! Polling driver for synchronous callers
//!
//! Drives a [`SerialDevice`] over a blocking [`CommunicationChannel`] by
//! polling `bytes_to_read()` instead of blocking in `read()`, which keeps
//! the device's timers serviced while the port is quiet.

use std::io::ErrorKind;
use std::time::{Duration, Instant};

use super::{CommunicationChannel, DeviceEvent, PortError, SerialDevice};

/// Default sleep between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Moves bytes between a blocking channel and one device
pub struct BlockingDriver<C> {
    channel: C,
    port_name: String,
    poll_interval: Duration,
    events: Vec<DeviceEvent>,
}

impl<C: CommunicationChannel> BlockingDriver<C> {
    pub fn new(channel: C, port_name: impl Into<String>) -> Self {
        Self {
            channel,
            port_name: port_name.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            events: Vec::new(),
        }
    }

    /// Sleep between polls of a quiet channel
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Give the channel back
    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Start the device's connection on this channel
    pub fn connect<D: SerialDevice>(&mut self, device: &mut D) {
        device.connect(&self.port_name, Instant::now());
        self.flush(device);
    }

    /// Service timers, feed whatever the port has buffered and write out
    /// whatever the device queued
    pub fn step<D: SerialDevice>(&mut self, device: &mut D) {
        let now = Instant::now();
        if device.next_deadline().is_some_and(|at| now >= at) {
            device.handle_tick(now);
            // A purge requested by the timer must happen before the next read
            self.flush(device);
        }

        if device.is_connected() {
            self.read_available(device);
        }
        self.flush(device);
    }

    /// Step the device until `done` holds, the device disconnects or `limit`
    /// elapses. Returns whether `done` was reached.
    pub fn run_until<D: SerialDevice>(
        &mut self,
        device: &mut D,
        limit: Duration,
        mut done: impl FnMut(&D) -> bool,
    ) -> bool {
        let start = Instant::now();
        loop {
            self.step(device);
            if done(device) {
                return true;
            }
            if !device.is_connected() || start.elapsed() >= limit {
                return false;
            }

            let nap = match device.next_deadline() {
                Some(at) => at
                    .saturating_duration_since(Instant::now())
                    .min(self.poll_interval),
                None => self.poll_interval,
            };
            std::thread::sleep(nap);
        }
    }

    /// Signals collected from the device since the last call
    pub fn take_events(&mut self) -> Vec<DeviceEvent> {
        std::mem::take(&mut self.events)
    }

    fn read_available<D: SerialDevice>(&mut self, device: &mut D) {
        let available = match self.channel.bytes_to_read() {
            Ok(n) => n as usize,
            Err(e) => {
                device.handle_port_error(self.read_error(e));
                return;
            }
        };
        if available == 0 {
            return;
        }

        let mut buffer = [0u8; 512];
        let to_read = available.min(buffer.len());
        match self.channel.read(&mut buffer[..to_read]) {
            Ok(0) => device.handle_port_error(PortError::Disconnected {
                port: self.port_name.clone(),
            }),
            Ok(n) => device.handle_bytes(&buffer[..n], Instant::now()),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => device.handle_port_error(self.read_error(e)),
        }
    }

    fn read_error(&self, e: std::io::Error) -> PortError {
        PortError::Read {
            port: self.port_name.clone(),
            reason: e.to_string(),
        }
    }

    fn flush<D: SerialDevice>(&mut self, device: &mut D) {
        if device.take_purge_request() {
            if let Err(e) = self.channel.clear_input_buffer() {
                tracing::warn!(device = %device.name(), "failed to purge receive buffer: {e}");
            }
        }

        while let Some(out) = device.take_outbound() {
            let written = self
                .channel
                .write_all(&out)
                .and_then(|_| self.channel.flush());
            if let Err(e) = written {
                device.handle_port_error(PortError::Write {
                    port: self.port_name.clone(),
                    reason: e.to_string(),
                });
                break;
            }
        }

        self.events.extend(device.drain_events());
    }
}
