//! Response Interpreter
//!
//! JetDrive replies have a fixed size that depends on the command they
//! answer. Byte 0 is ACK or NAK, byte 2 carries the status code and
//! GETVERSION puts the firmware version in the last byte.

use bytes::Bytes;
use thiserror::Error;

use super::command::{Command, ACK, NAK};
use crate::protocol::codec::hex;

/// A well-formed reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The device understood the command
    Ack {
        command: Command,
        status: u8,
        raw: Bytes,
    },
    /// The device did not understand the command
    Nak { command: Command, raw: Bytes },
}

impl Reply {
    /// Command the reply answers
    pub fn command(&self) -> Command {
        match self {
            Reply::Ack { command, .. } | Reply::Nak { command, .. } => *command,
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Reply::Ack { .. })
    }

    /// Status code of an acknowledged command
    pub fn status(&self) -> Option<u8> {
        match self {
            Reply::Ack { status, .. } => Some(*status),
            Reply::Nak { .. } => None,
        }
    }

    /// Firmware version carried by an acknowledged GETVERSION
    pub fn version(&self) -> Option<u8> {
        match self {
            Reply::Ack {
                command: Command::GetVersion,
                raw,
                ..
            } => raw.last().copied(),
            _ => None,
        }
    }

    /// Reply bytes as received
    pub fn raw(&self) -> &Bytes {
        match self {
            Reply::Ack { raw, .. } | Reply::Nak { raw, .. } => raw,
        }
    }
}

/// A reply that cannot be attributed to the command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error("{command} reply too short: expected {expected} bytes, got [{received}]")]
    Short {
        command: Command,
        expected: usize,
        received: String,
    },

    #[error("{command} reply has unknown header 0x{header:02X} [{received}]")]
    BadHeader {
        command: Command,
        header: u8,
        received: String,
    },
}

/// Classify the reply to `command`.
///
/// Replies shorter than [`Command::reply_size`] are reported as failures;
/// extra bytes beyond that size are ignored. The reply checksum is not
/// validated.
pub fn interpret(command: Command, reply: &[u8]) -> Result<Reply, ReplyError> {
    let expected = command.reply_size();
    if reply.len() < expected {
        return Err(ReplyError::Short {
            command,
            expected,
            received: hex(reply),
        });
    }

    let raw = Bytes::copy_from_slice(&reply[..expected]);
    match raw[0] {
        ACK => Ok(Reply::Ack {
            command,
            status: raw[2],
            raw,
        }),
        NAK => Ok(Reply::Nak { command, raw }),
        header => Err(ReplyError::BadHeader {
            command,
            header,
            received: hex(reply),
        }),
    }
}
