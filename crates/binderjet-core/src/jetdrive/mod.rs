//! JetDrive piezo controller
//!
//! Binary protocol of the MicroJet JetDrive: checksummed frames built from
//! the current settings, fixed-size ACK/NAK replies and the start-up
//! handshake.

pub mod builder;
pub mod command;
mod controller;
pub mod legacy;
pub mod reply;
mod settings;

pub use builder::{checksum, BuildError, Frame, FrameBuilder, FREQBASE};
pub use command::Command;
pub use controller::{
    Expect, InitState, JetDrive, Timing, DEFAULT_BAUD_RATE, NAME, SLOW_RESPONDER_SIGNATURE,
    START_COMMAND, STOP_COMMAND,
};
pub use legacy::{LegacyError, LegacyJetDrive};
pub use reply::{interpret, Reply, ReplyError};
pub use settings::{ControllerKind, DeviceProfile, Settings, TriggerSource, Waveform};
