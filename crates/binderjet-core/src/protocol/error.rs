//! Protocol errors

use thiserror::Error;

/// Faults reported by the byte-stream transport (the physical serial port)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("Error opening port {port}, error: {reason}")]
    Open { port: String, reason: String },

    #[error("Read error on port {port}, error: {reason}")]
    Read { port: String, reason: String },

    #[error("Error writing to port {port}, error: {reason}")]
    Write { port: String, reason: String },

    #[error("Port {port} was disconnected unexpectedly")]
    Disconnected { port: String },

    /// A write was requested while the named device has no open port
    #[error("{0} is not connected")]
    NotConnected(String),
}

impl PortError {
    /// Name of the port the fault was reported on (the device name for
    /// `NotConnected`, which has no port)
    pub fn port(&self) -> &str {
        match self {
            PortError::Open { port, .. }
            | PortError::Read { port, .. }
            | PortError::Write { port, .. }
            | PortError::Disconnected { port }
            | PortError::NotConnected(port) => port,
        }
    }

    /// OS-level reason, when the port reported one
    pub fn reason(&self) -> Option<&str> {
        match self {
            PortError::Open { reason, .. }
            | PortError::Read { reason, .. }
            | PortError::Write { reason, .. } => Some(reason),
            PortError::Disconnected { .. } | PortError::NotConnected(_) => None,
        }
    }
}

/// Faults that are fatal to a connection.
///
/// Raising one of these always clears the write queue, closes the link and
/// resets the device back to its uninitialized state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error(transparent)]
    Transport(#[from] PortError),

    #[error("Unexpected response from {device}: {reason}")]
    Protocol { device: String, reason: String },

    #[error("Serial IO Timeout: No response from {device} (received: [{partial}])")]
    Timeout { device: String, partial: String },

    #[error("{device} initialization failed: {reason}")]
    Initialization { device: String, reason: String },
}

impl Fault {
    /// True for write-acknowledgment timeouts
    pub fn is_timeout(&self) -> bool {
        matches!(self, Fault::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_messages_name_component() {
        let fault = Fault::Timeout {
            device: "JetDrive".into(),
            partial: "06 01".into(),
        };
        assert!(fault.is_timeout());
        assert_eq!(
            fault.to_string(),
            "Serial IO Timeout: No response from JetDrive (received: [06 01])"
        );

        let fault: Fault = PortError::Write {
            port: "/dev/ttyUSB0".into(),
            reason: "broken pipe".into(),
        }
        .into();
        assert!(!fault.is_timeout());
        assert_eq!(
            fault.to_string(),
            "Error writing to port /dev/ttyUSB0, error: broken pipe"
        );
    }

    #[test]
    fn test_not_connected_names_device() {
        let err = PortError::NotConnected("JetDrive".into());
        assert_eq!(err.port(), "JetDrive");
        assert_eq!(err.reason(), None);
        assert_eq!(err.to_string(), "JetDrive is not connected");
    }
}
