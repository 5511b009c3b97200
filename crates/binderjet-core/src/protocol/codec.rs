//! Reply framing
//!
//! Incoming bytes accumulate in a connection's receive buffer until one of
//! these decoders recognizes a complete reply.

use bytes::{Buf, BytesMut};
use std::io;
use tokio_util::codec::Decoder;

/// Carriage return, the ASCII reply terminator
pub const CR: u8 = b'\r';

/// Decodes CR-terminated ASCII lines, whitespace-simplified
#[derive(Debug, Default, Clone, Copy)]
pub struct LineCodec;

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        match src.iter().position(|&b| b == CR) {
            Some(pos) => {
                let line = src.split_to(pos + 1);
                Ok(Some(simplified(&line)))
            }
            None => Ok(None),
        }
    }
}

/// Decodes replies of a known, fixed size
#[derive(Debug, Clone, Copy)]
pub struct FixedLengthCodec {
    len: usize,
}

impl FixedLengthCodec {
    /// Decoder yielding `len`-byte replies; a zero length never yields
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Decoder for FixedLengthCodec {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, io::Error> {
        if self.len == 0 {
            return Ok(None);
        }
        if src.len() >= self.len {
            Ok(Some(src.split_to(self.len)))
        } else {
            Ok(None)
        }
    }
}

/// Drop leading bytes that match `skip`
pub fn skip_leading(src: &mut BytesMut, skip: impl Fn(u8) -> bool) {
    let n = src.iter().take_while(|&&b| skip(b)).count();
    src.advance(n);
}

/// Lossy UTF-8 with whitespace runs collapsed to one space and the ends trimmed
pub fn simplified(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render bytes as space-separated upper-case hex
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
