//! The seam between device controllers and drivers

use bytes::Bytes;
use std::time::Instant;

use super::{DeviceEvent, PortError, PortSettings};

/// A serial device controller that can be driven by an event loop.
///
/// Controllers never touch the port. A driver feeds them received bytes and
/// timer ticks, then moves the bytes they queued for transmission onto the
/// wire. Every method runs on the driver's thread, so a controller is only
/// ever mutated by one writer.
pub trait SerialDevice: Send {
    /// Device name used in messages
    fn name(&self) -> &str;

    /// Line settings the port must be opened with
    fn port_settings(&self) -> PortSettings;

    fn is_connected(&self) -> bool;

    /// The port was opened; start the connection
    fn connect(&mut self, port: &str, now: Instant);

    /// The port could not be opened
    fn connect_failed(&mut self, error: &PortError);

    fn disconnect(&mut self);

    /// Bytes arrived from the port
    fn handle_bytes(&mut self, data: &[u8], now: Instant);

    /// A timer armed through [`next_deadline`](Self::next_deadline) expired
    fn handle_tick(&mut self, now: Instant);

    /// The port reported a fault; always fatal to the connection
    fn handle_port_error(&mut self, error: PortError);

    /// When the driver must call [`handle_tick`](Self::handle_tick) next
    fn next_deadline(&self) -> Option<Instant>;

    /// Bytes that must be written to the port now
    fn take_outbound(&mut self) -> Option<Bytes>;

    /// Whether the OS receive buffer must be cleared before writing
    fn take_purge_request(&mut self) -> bool;

    /// Signals raised since the last call
    fn drain_events(&mut self) -> Vec<DeviceEvent>;
}
