//! Simulated devices
//!
//! Stand-ins for the JetDrive and the PCD that answer the way the hardware
//! does, for demo mode and tests. A [`Responder`] turns bytes written by the
//! host into reply bytes; [`SimChannel`] and [`serve`] put one behind the
//! blocking and the async driver respectively. Replies can be split into
//! random-sized chunks to exercise reply accumulation.

use bytes::{Buf, BytesMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use crate::jetdrive::builder::checksum;
use crate::jetdrive::command::{Command, ACK, HEADER, NAK};
use crate::protocol::codec::{simplified, CR};
use crate::protocol::CommunicationChannel;

/// Banner a JetDrive prints when its firmware program is stopped
pub const JETDRIVE_BANNER: &[u8] = b"Q - This is a dummy response. BEEP>";

/// Banner of the slow-responding firmware variant
pub const SLOW_RESPONDER_BANNER: &[u8] = b"MFJET32 Ver 3.2\r\n";

/// Turns host writes into device replies
pub trait Responder: Send {
    fn receive(&mut self, data: &[u8]) -> Vec<u8>;
}

/// Simulated JetDrive
#[derive(Debug, Clone)]
pub struct SimJetDrive {
    firmware_version: u8,
    slow_responder: bool,
    pending: BytesMut,
    frames: Vec<Vec<u8>>,
}

impl Default for SimJetDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl SimJetDrive {
    pub fn new() -> Self {
        Self {
            firmware_version: 40,
            slow_responder: false,
            pending: BytesMut::new(),
            frames: Vec::new(),
        }
    }

    /// Version reported to GETVERSION
    pub fn with_firmware_version(mut self, version: u8) -> Self {
        self.firmware_version = version;
        self
    }

    /// Answer the stop command with the slow responder's banner
    pub fn slow_responder(mut self) -> Self {
        self.slow_responder = true;
        self
    }

    /// Binary frames received so far
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    /// Command codes of the binary frames received so far
    pub fn commands(&self) -> Vec<Command> {
        self.frames
            .iter()
            .filter_map(|f| f.get(2).copied().and_then(Command::from_code))
            .collect()
    }

    fn reply_to(&mut self, frame: Vec<u8>) -> Vec<u8> {
        let code = frame[2];
        let valid = checksum(&frame[..frame.len() - 1]) == frame[frame.len() - 1];
        let command = Command::from_code(code).filter(|_| valid);
        self.frames.push(frame);

        let Some(command) = command else {
            let mut reply = vec![NAK, 0x02, code];
            reply.push(checksum_all(&reply));
            return reply;
        };

        let size = command.reply_size();
        let mut reply = vec![0u8; size];
        reply[0] = ACK;
        reply[1] = (size - 2) as u8;
        if command == Command::GetVersion {
            reply[3] = command.code();
            reply[size - 1] = self.firmware_version;
        } else {
            reply[size - 1] = checksum_all(&reply[..size - 1]);
        }
        reply
    }
}

fn checksum_all(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

impl Responder for SimJetDrive {
    fn receive(&mut self, data: &[u8]) -> Vec<u8> {
        self.pending.extend_from_slice(data);
        let mut out = Vec::new();
        while let Some(&first) = self.pending.first() {
            if first != HEADER {
                self.pending.advance(1);
                if first == b'Q' {
                    let banner = if self.slow_responder {
                        SLOW_RESPONDER_BANNER
                    } else {
                        JETDRIVE_BANNER
                    };
                    out.extend_from_slice(banner);
                } else {
                    out.push(first);
                }
                continue;
            }
            let Some(&len) = self.pending.get(1) else {
                break;
            };
            let total = len as usize + 2;
            if total < 4 {
                // Not a frame; resynchronise on the next byte
                self.pending.advance(1);
                continue;
            }
            if self.pending.len() < total {
                break;
            }
            let frame = self.pending.split_to(total).to_vec();
            out.extend(self.reply_to(frame));
        }
        out
    }
}

/// Simulated PCD pressure controller
#[derive(Debug, Clone)]
pub struct SimPcd {
    init_reply: String,
    unit_id: char,
    pending: BytesMut,
    lines: Vec<String>,
}

impl Default for SimPcd {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPcd {
    pub fn new() -> Self {
        Self {
            init_reply: crate::pcd::DEFAULT_INIT_REPLY.to_string(),
            unit_id: 'A',
            pending: BytesMut::new(),
            lines: Vec::new(),
        }
    }

    /// Answer to `Q`
    pub fn with_init_reply(mut self, reply: impl Into<String>) -> Self {
        self.init_reply = reply.into();
        self
    }

    /// Command lines received so far, without terminators
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn reply_to(&self, line: &str) -> String {
        match line.as_bytes().first() {
            Some(b'Q') => self.init_reply.clone(),
            Some(b'a' | b'P' | b'O' | b'S' | b'X') => self.unit_id.to_string(),
            _ => "?".to_string(),
        }
    }
}

impl Responder for SimPcd {
    fn receive(&mut self, data: &[u8]) -> Vec<u8> {
        self.pending.extend_from_slice(data);
        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == CR) {
            let raw = self.pending.split_to(pos + 1);
            let line = simplified(&raw[..pos]);
            out.extend_from_slice(self.reply_to(&line).as_bytes());
            out.push(CR);
            self.lines.push(line);
        }
        out
    }
}

/// Splits replies into random-sized pieces
#[derive(Debug)]
struct Chunker {
    rng: Option<StdRng>,
    max: usize,
}

impl Chunker {
    fn whole() -> Self {
        Self { rng: None, max: 0 }
    }

    fn random(seed: u64, max: usize) -> Self {
        Self {
            rng: Some(StdRng::seed_from_u64(seed)),
            max: max.max(1),
        }
    }

    fn split(&mut self, mut data: Vec<u8>) -> Vec<Vec<u8>> {
        let Some(rng) = self.rng.as_mut() else {
            return if data.is_empty() { Vec::new() } else { vec![data] };
        };
        let mut chunks = Vec::new();
        while !data.is_empty() {
            let n = rng.gen_range(1..=self.max).min(data.len());
            let rest = data.split_off(n);
            chunks.push(data);
            data = rest;
        }
        chunks
    }
}

/// Blocking channel with a simulated device on the other end
pub struct SimChannel<R> {
    responder: R,
    chunker: Chunker,
    inbound: VecDeque<Vec<u8>>,
}

impl<R: Responder> SimChannel<R> {
    /// Channel returning each reply as one read
    pub fn new(responder: R) -> Self {
        Self {
            responder,
            chunker: Chunker::whole(),
            inbound: VecDeque::new(),
        }
    }

    /// Deliver replies in pieces of 1 to `max` bytes, one piece per read
    pub fn with_random_chunks(mut self, seed: u64, max: usize) -> Self {
        self.chunker = Chunker::random(seed, max);
        self
    }

    pub fn responder(&self) -> &R {
        &self.responder
    }
}

impl<R: Responder> Read for SimChannel<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(chunk) = self.inbound.front_mut() else {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        chunk.drain(..n);
        if chunk.is_empty() {
            self.inbound.pop_front();
        }
        Ok(n)
    }
}

impl<R: Responder> Write for SimChannel<R> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let reply = self.responder.receive(buf);
        self.inbound.extend(self.chunker.split(reply));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<R: Responder> CommunicationChannel for SimChannel<R> {
    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.inbound.clear();
        Ok(())
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        Ok(self.inbound.front().map_or(0, |c| c.len() as u32))
    }
}

/// Answer host writes on `stream` until the host closes it, then hand the
/// responder back.
///
/// With a `seed`, replies are written in random pieces of at most `max`
/// bytes with a yield in between.
pub async fn serve<R: Responder>(
    mut responder: R,
    mut stream: DuplexStream,
    seed: Option<(u64, usize)>,
) -> R {
    let mut chunker = match seed {
        Some((seed, max)) => Chunker::random(seed, max),
        None => Chunker::whole(),
    };
    let mut buf = [0u8; 256];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        for chunk in chunker.split(responder.receive(&buf[..n])) {
            if stream.write_all(&chunk).await.is_err() {
                return responder;
            }
            tokio::task::yield_now().await;
        }
    }
    responder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jetdrive::{interpret, FrameBuilder, Settings};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_jetdrive_handshake_replies() {
        let mut sim = SimJetDrive::new();
        assert_eq!(sim.receive(b"Q"), JETDRIVE_BANNER);
        assert_eq!(sim.receive(b"X"), b"X");
        assert_eq!(sim.receive(b"2000"), b"2000");
    }

    #[test]
    fn test_jetdrive_acks_frames_with_reply_size() {
        let mut sim = SimJetDrive::new().with_firmware_version(51);
        let builder = FrameBuilder::default();
        let settings = Settings::default();

        let version = builder.build(Command::GetVersion, &settings).unwrap();
        let reply = sim.receive(version.bytes());
        assert_eq!(interpret(Command::GetVersion, &reply).unwrap().version(), Some(51));

        let pulse = builder.build(Command::Pulse, &settings).unwrap();
        let (head, tail) = pulse.bytes().split_at(3);
        assert!(sim.receive(head).is_empty());
        let reply = sim.receive(tail);
        assert_eq!(reply.len(), 4);
        assert!(interpret(Command::Pulse, &reply).unwrap().is_ack());
        assert_eq!(sim.commands(), vec![Command::GetVersion, Command::Pulse]);
    }

    #[test]
    fn test_jetdrive_naks_bad_checksum() {
        let mut sim = SimJetDrive::new();
        let reply = sim.receive(&[HEADER, 0x02, 0x01, 0x00]);
        assert_eq!(reply[0], NAK);
    }

    #[test]
    fn test_pcd_replies() {
        let mut sim = SimPcd::new();
        assert_eq!(sim.receive(b"Q\r"), b"PCD\r");
        assert_eq!(sim.receive(b"as12"), b"");
        assert_eq!(sim.receive(b".5\r"), b"A\r");
        assert_eq!(sim.lines(), ["Q", "as12.5"]);
    }

    #[test]
    fn test_channel_delivers_chunks() {
        let mut channel = SimChannel::new(SimPcd::new()).with_random_chunks(7, 2);
        channel.write_all(b"Q\r").unwrap();

        let mut received = Vec::new();
        while channel.bytes_to_read().unwrap() > 0 {
            let n = channel.bytes_to_read().unwrap() as usize;
            assert!(n <= 2);
            let mut buf = vec![0u8; n];
            channel.read_exact(&mut buf).unwrap();
            received.extend(buf);
        }
        assert_eq!(received, b"PCD\r");
    }
}
