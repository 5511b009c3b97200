//! # BinderJet Core Library
//!
//! Serial device control for a binder-jetting 3D printer.

#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - A shared serial link with a single-outstanding write queue and
//!   response timeouts
//! - The JetDrive piezo controller's binary protocol and start-up handshake
//! - The PCD pressure controller's ASCII protocol
//! - A sequential print queue for the motion controller
//! - Simulated devices for demo mode and tests
//!
//! Device controllers never touch a port themselves. They are driven either
//! by the tokio event loop in [`protocol::driver`] or by the polling
//! [`protocol::BlockingDriver`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use binderjet_core::prelude::*;
//!
//! let config = PrinterConfig::load_or_default(&path)?;
//! let jet = config.jetdrive.controller();
//!
//! let running = open_and_spawn(jet, "/dev/ttyUSB0").map_err(|(_, e)| e)?;
//! running.handle.call(|jet, now| {
//!     let _ = jet.set_continuous_mode_frequency(2000, now);
//! })?;
//! while let Some(event) = running.events.recv().await {
//!     println!("{}", event.text());
//! }
//! ```

pub mod config;
pub mod jetdrive;
pub mod motion;
pub mod pcd;
pub mod protocol;
pub mod sim;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ConfigError, JetDriveConfig, PcdConfig, PrinterConfig};
    pub use crate::jetdrive::{
        BuildError, Command, ControllerKind, DeviceProfile, InitState, JetDrive, LegacyJetDrive,
        Settings, Timing, TriggerSource, Waveform,
    };
    pub use crate::motion::{MotionCommand, MotionController, MotionError, MotionEvent, PrintQueue};
    pub use crate::pcd::Pcd;
    pub use crate::protocol::driver::{open_and_spawn, spawn};
    pub use crate::protocol::{
        BlockingDriver, DeviceEvent, DeviceHandle, Fault, PortError, PortSettings, RunningDevice,
        SerialDevice,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
