//! PCD ASCII commands
//!
//! Every command is a single character followed by a carriage return. The
//! set point command is the unit id, a literal `s` and the value.

use serde::{Deserialize, Serialize};

use crate::protocol::codec::CR;

/// Single-character command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PcdCommand {
    /// Initialize; answered with the identification string
    Init,
    /// Unit id query, also the prefix of the set point command
    UnitId,
    PurgeOn,
    PurgeOff,
    /// Take the set point from the serial line
    UseSoftSerial,
    /// Take the set point from the analog input
    UseAnalog,
}

impl PcdCommand {
    /// ASCII command character
    pub fn code(self) -> u8 {
        match self {
            PcdCommand::Init => b'Q',
            PcdCommand::UnitId => b'a',
            PcdCommand::PurgeOn => b'P',
            PcdCommand::PurgeOff => b'O',
            PcdCommand::UseSoftSerial => b'S',
            PcdCommand::UseAnalog => b'X',
        }
    }

    /// The command as sent on the wire
    pub fn frame(self) -> Vec<u8> {
        vec![self.code(), CR]
    }
}

/// Set point in psig, rounded to 4 decimals and printed in its shortest
/// form (`5`, not `5.0`)
pub fn format_set_point(psig: f64) -> String {
    let rounded = (psig * 10_000.0).round() / 10_000.0;
    if rounded == 0.0 {
        // Avoid printing -0
        return "0".to_string();
    }
    format!("{rounded}")
}

/// Frame updating the pressure set point, `None` for non-finite values
pub fn set_point_frame(psig: f64) -> Option<Vec<u8>> {
    if !psig.is_finite() {
        return None;
    }
    let mut frame = vec![PcdCommand::UnitId.code(), b's'];
    frame.extend_from_slice(format_set_point(psig).as_bytes());
    frame.push(CR);
    Some(frame)
}
