//! Signals emitted by serial devices
//!
//! These are the only things a collaborator (UI, print job, CLI) sees of a
//! device's conversation with the hardware.

use serde::{Deserialize, Serialize};

/// A signal raised by a device controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceEvent {
    /// Informational line for display or logging
    Response(String),
    /// A surfaced fault. Protocol-level faults are always followed by a disconnect.
    Error(String),
    /// A write-acknowledgment timeout
    Timeout(String),
}

impl DeviceEvent {
    /// The human-readable text carried by the signal
    pub fn text(&self) -> &str {
        match self {
            DeviceEvent::Response(s) | DeviceEvent::Error(s) | DeviceEvent::Timeout(s) => s,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DeviceEvent::Error(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DeviceEvent::Timeout(_))
    }
}

/// Collects signals until the owner drains them
#[derive(Debug, Default)]
pub struct EventLog {
    device: String,
    pending: Vec<DeviceEvent>,
}

impl EventLog {
    /// Empty log for `device`
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            pending: Vec::new(),
        }
    }

    /// Record and log an informational response
    pub fn response(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::info!(device = %self.device, "{text}");
        self.pending.push(DeviceEvent::Response(text));
    }

    /// Record and log a non-timeout error
    pub fn error(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!(device = %self.device, "{text}");
        self.pending.push(DeviceEvent::Error(text));
    }

    /// Record and log a response timeout
    pub fn timeout(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!(device = %self.device, "{text}");
        self.pending.push(DeviceEvent::Timeout(text));
    }

    /// Take every signal raised since the last drain, oldest first
    pub fn drain(&mut self) -> Vec<DeviceEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
