//! Connection state for one serial device
//!
//! A [`Link`] owns everything a device controller needs to hold a
//! conversation with its hardware: the write queue, the bytes received so
//! far for the in-flight frame, bytes waiting to be put on the wire, and the
//! signals raised for collaborators. It performs no I/O itself. A driver
//! moves bytes between the link and the physical port.

use bytes::{Bytes, BytesMut};
use std::time::{Duration, Instant};

use super::codec::hex;
use super::event::{DeviceEvent, EventLog};
use super::queue::{Outgoing, QueuePoll, WriteQueue};
use super::{Fault, PortError};

/// One open (or closed) serial connection
#[derive(Debug)]
pub struct Link<T> {
    /// Device name used in every message
    name: String,
    /// Port the link is open on, `None` while disconnected
    port: Option<String>,
    queue: WriteQueue<T>,
    /// Partially received reply for the in-flight frame
    rx: BytesMut,
    /// Bytes written by the queue but not yet handed to the port
    outbox: BytesMut,
    events: EventLog,
    /// Purge the receive buffer once the current settle delay ends
    purge_after_settle: bool,
    /// The driver should clear the OS receive buffer
    purge_requested: bool,
}

impl<T: std::fmt::Debug> Link<T> {
    /// Closed link for the device `name`, answering within `timeout`
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        let name = name.into();
        Self {
            events: EventLog::new(name.clone()),
            name,
            port: None,
            queue: WriteQueue::new(timeout),
            rx: BytesMut::new(),
            outbox: BytesMut::new(),
            purge_after_settle: false,
            purge_requested: false,
        }
    }

    /// Device name used in every message
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Port the link is open on
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Mark the link open on `port`.
    ///
    /// Returns false (and reports it) when the link is already open.
    pub fn open(&mut self, port: &str) -> bool {
        if self.is_open() {
            self.events
                .response(format!("Already connected to {}", self.name));
            return false;
        }
        self.reset();
        self.port = Some(port.to_string());
        tracing::debug!(device = %self.name, port, "link opened");
        true
    }

    /// Report that the port could not be opened
    pub fn open_failed(&mut self, port: &str, reason: &str) {
        self.events
            .error(format!("Can't open {} on {}, error: {}", self.name, port, reason));
    }

    /// Close the link, dropping all queued and partially received data
    pub fn close(&mut self) {
        self.reset();
        if self.port.take().is_some() {
            self.events.response(format!("Disconnecting {}", self.name));
        } else {
            self.events
                .response(format!("{} is already disconnected", self.name));
        }
    }

    fn reset(&mut self) {
        self.queue.clear();
        self.rx.clear();
        self.outbox.clear();
        self.purge_after_settle = false;
        self.purge_requested = false;
    }

    /// Report a fatal fault and close the link
    pub fn fail(&mut self, fault: Fault) {
        if fault.is_timeout() {
            self.events.timeout(fault.to_string());
        } else {
            self.events.error(fault.to_string());
        }
        self.close();
    }

    /// Queue a frame at the tail; writes it immediately if the channel is idle.
    ///
    /// Returns false, and transmits nothing, when the link is closed.
    pub fn send(&mut self, frame: Outgoing<T>, now: Instant) -> bool {
        if !self.is_open() {
            let err = PortError::NotConnected(self.name.clone());
            self.events.error(format!("Can't send command. {err}"));
            return false;
        }
        if self.queue.enqueue(frame) {
            self.write_next(now);
        }
        true
    }

    /// Queue a handshake batch ahead of every pending frame
    pub fn send_first(&mut self, batch: Vec<Outgoing<T>>, now: Instant) -> bool {
        if !self.is_open() {
            return false;
        }
        if self.queue.enqueue_front(batch) {
            self.write_next(now);
        }
        true
    }

    /// Hold the queue for `delay` (connection settle time)
    pub fn hold(&mut self, now: Instant, delay: Duration) {
        self.queue.hold_until(now + delay);
    }

    fn write_next(&mut self, now: Instant) {
        self.rx.clear();
        if let Some(frame) = self.queue.write_next(now) {
            tracing::debug!(
                device = %self.name,
                tag = ?frame.tag,
                "TX {}",
                hex(&frame.bytes)
            );
            self.outbox.extend_from_slice(&frame.bytes);
        }
    }

    /// The frame whose reply is currently awaited
    pub fn in_flight(&self) -> Option<&Outgoing<T>> {
        self.queue.in_flight()
    }

    /// Append received bytes to the reply buffer.
    ///
    /// Bytes arriving while nothing is in flight have no frame to be
    /// attributed to and are discarded; returns false in that case.
    pub fn accept(&mut self, data: &[u8]) -> bool {
        if self.queue.in_flight().is_none() {
            if !data.is_empty() {
                tracing::debug!(device = %self.name, "RX (discarded) {}", hex(data));
            }
            return false;
        }
        tracing::debug!(device = %self.name, "RX {}", hex(data));
        self.rx.extend_from_slice(data);
        true
    }

    /// Receive buffer of the in-flight frame
    pub fn rx(&self) -> &BytesMut {
        &self.rx
    }

    /// Receive buffer of the in-flight frame, for decoders that consume it
    pub fn rx_mut(&mut self) -> &mut BytesMut {
        &mut self.rx
    }

    /// The in-flight frame's reply has been consumed; release the next frame
    pub fn complete(&mut self, now: Instant) -> Option<Outgoing<T>> {
        let done = self.queue.complete(now);
        self.rx.clear();
        if self.queue.is_write_ready() {
            self.write_next(now);
        }
        done
    }

    /// Complete the in-flight frame, wait `settle`, purge the receive buffer,
    /// then release the next frame.
    pub fn complete_and_purge(&mut self, now: Instant, settle: Duration) -> Option<Outgoing<T>> {
        let done = self.queue.complete_with_settle(now, settle);
        self.rx.clear();
        self.purge_after_settle = true;
        if self.queue.is_write_ready() {
            self.purge();
            self.write_next(now);
        }
        done
    }

    fn purge(&mut self) {
        tracing::debug!(device = %self.name, "purging receive buffer");
        self.purge_after_settle = false;
        self.purge_requested = true;
        self.rx.clear();
    }

    /// Service the timeout and settle timers.
    ///
    /// Returns the timeout fault when the in-flight frame went unanswered.
    /// The caller decides how to tear down; see [`fail`](Self::fail).
    pub fn poll(&mut self, now: Instant) -> Option<Fault> {
        match self.queue.poll(now) {
            QueuePoll::Pending => None,
            QueuePoll::TimedOut(frame) => {
                tracing::debug!(device = %self.name, tag = ?frame.tag, "response timeout");
                Some(Fault::Timeout {
                    device: self.name.clone(),
                    partial: hex(&self.rx),
                })
            }
            QueuePoll::Settled => {
                if self.purge_after_settle {
                    self.purge();
                }
                self.write_next(now);
                None
            }
        }
    }

    /// Next instant at which [`poll`](Self::poll) must run
    pub fn deadline(&self) -> Option<Instant> {
        self.queue.deadline()
    }

    /// Bytes that must now be written to the port
    pub fn take_outbound(&mut self) -> Option<Bytes> {
        if self.outbox.is_empty() {
            None
        } else {
            Some(self.outbox.split().freeze())
        }
    }

    /// Whether the driver must clear the OS receive buffer
    pub fn take_purge_request(&mut self) -> bool {
        std::mem::take(&mut self.purge_requested)
    }

    /// Signal log, for raising device-specific signals
    pub fn events(&mut self) -> &mut EventLog {
        &mut self.events
    }

    /// Signals raised since the last call
    pub fn drain_events(&mut self) -> Vec<DeviceEvent> {
        self.events.drain()
    }

    /// Frames waiting behind the in-flight one
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Nothing in flight, settling or queued
    pub fn is_idle(&self) -> bool {
        self.queue.is_write_ready() && self.queue.is_empty()
    }
}
