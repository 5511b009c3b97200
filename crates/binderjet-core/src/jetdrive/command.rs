//! JetDrive commands
//!
//! Command identifiers of the MicroJet binary protocol and the size of the
//! reply each one produces.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Header byte opening every binary frame
pub const HEADER: u8 = b'S';

/// Reply header: command understood
pub const ACK: u8 = 0x06;

/// Reply header: command not understood
pub const NAK: u8 = 0x15;

/// Reply size of every command not listed in [`Command::reply_size`]
pub const DEFAULT_REPLY_SIZE: usize = 4;

/// Binary protocol commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Command {
    /// Builds an empty frame; nothing is transmitted
    NoCommand = 0x00,
    /// Soft reset
    Reset = 0x01,
    PollStatus = 0x02,
    /// Number of drops per trigger
    Drops = 0x03,
    /// Continuous (1) or single (0) jetting
    ContMode = 0x04,
    /// Jetting frequency as a divider of the 625 kHz base clock
    Frequency = 0x05,
    /// Drive waveform
    Pulse = 0x06,
    StrobeDiv = 0x07,
    /// Trigger source, external (1) or internal (0)
    Source = 0x08,
    SoftTrigger = 0x09,
    ExternEnable = 0x0C,
    MultiTrigger = 0x0D,
    /// Multi-channel editing; not supported by the frame builder
    EditChannel = 0x0E,
    StrobeEnable = 0x10,
    /// Jetting frequency below 256 Hz, newer firmware only
    LowFreq = 0x11,
    /// Jetting frequency in Hz
    FullFreq = 0x12,
    StrobeDelay = 0x13,
    DumpInput = 0x60,
    Debug = 0x61,
    Poke = 0xEF,
    GetVersion = 0xF0,
}

impl Command {
    /// Every command, in code order
    pub const ALL: [Command; 21] = [
        Command::NoCommand,
        Command::Reset,
        Command::PollStatus,
        Command::Drops,
        Command::ContMode,
        Command::Frequency,
        Command::Pulse,
        Command::StrobeDiv,
        Command::Source,
        Command::SoftTrigger,
        Command::ExternEnable,
        Command::MultiTrigger,
        Command::EditChannel,
        Command::StrobeEnable,
        Command::LowFreq,
        Command::FullFreq,
        Command::StrobeDelay,
        Command::DumpInput,
        Command::Debug,
        Command::Poke,
        Command::GetVersion,
    ];

    /// Command byte placed at offset 2 of a frame
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Command for a wire code
    pub fn from_code(code: u8) -> Option<Command> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }

    /// Number of bytes the JetDrive answers this command with
    pub fn reply_size(self) -> usize {
        match self {
            Command::GetVersion | Command::MultiTrigger => 5,
            Command::DumpInput => 27,
            _ => DEFAULT_REPLY_SIZE,
        }
    }

    /// Name as used in the MicroJet command reference
    pub fn name(self) -> &'static str {
        match self {
            Command::NoCommand => "NOCOMMAND",
            Command::Reset => "RESET",
            Command::PollStatus => "POLLSTATUS",
            Command::Drops => "DROPS",
            Command::ContMode => "CONTMODE",
            Command::Frequency => "FREQUENCY",
            Command::Pulse => "PULSE",
            Command::StrobeDiv => "STROBEDIV",
            Command::Source => "SOURCE",
            Command::SoftTrigger => "SOFTTRIGGER",
            Command::ExternEnable => "EXTERNENABLE",
            Command::MultiTrigger => "MULTITRIGGER",
            Command::EditChannel => "EDITCHANNEL",
            Command::StrobeEnable => "STROBEENABLE",
            Command::LowFreq => "LOWFREQ",
            Command::FullFreq => "FULLFREQ",
            Command::StrobeDelay => "STROBEDELAY",
            Command::DumpInput => "DUMPINPUT",
            Command::Debug => "DEBUG",
            Command::Poke => "POKE",
            Command::GetVersion => "GETVERSION",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for cmd in Command::ALL {
            assert_eq!(Command::from_code(cmd.code()), Some(cmd));
        }
        assert_eq!(Command::from_code(0x42), None);
    }

    #[test]
    fn test_reply_sizes() {
        assert_eq!(Command::Reset.reply_size(), 4);
        assert_eq!(Command::Pulse.reply_size(), 4);
        assert_eq!(Command::GetVersion.reply_size(), 5);
        assert_eq!(Command::MultiTrigger.reply_size(), 5);
        assert_eq!(Command::DumpInput.reply_size(), 27);
    }

    #[test]
    fn test_display() {
        assert_eq!(Command::FullFreq.to_string(), "FULLFREQ");
        assert_eq!(Command::GetVersion.code(), 0xF0);
    }
}
