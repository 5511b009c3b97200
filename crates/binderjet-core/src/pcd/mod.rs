//! PCD pressure controller
//!
//! ASCII protocol: single-character commands terminated by a carriage
//! return, free-form CR-terminated replies.

pub mod command;
mod controller;

pub use command::{format_set_point, PcdCommand};
pub use controller::{
    Expect, InitState, Pcd, DEFAULT_BAUD_RATE, DEFAULT_CONNECT_DELAY, DEFAULT_INIT_REPLY, NAME,
};
