//! Serial protocol plumbing shared by every device
//!
//! Write queue, reply framing, connection state and the drivers that move
//! bytes between a device controller and its port.

pub mod blocking;
mod channel;
pub mod codec;
mod device;
pub mod driver;
mod error;
mod event;
mod link;
pub mod port;
mod queue;

pub use blocking::BlockingDriver;
pub use channel::{CommunicationChannel, SerialChannel};
pub use codec::{FixedLengthCodec, LineCodec};
pub use device::SerialDevice;
pub use driver::{DeviceHandle, DriverStopped, PurgeInput, RunningDevice};
pub use error::{Fault, PortError};
pub use event::{DeviceEvent, EventLog};
pub use link::Link;
pub use port::{list_ports, open_port, PortInfo, PortSettings};
pub use queue::{Outgoing, QueuePoll, WriteQueue};

use std::time::Duration;

/// Time allowed for a device to answer a written frame
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(3000);
