//! JetDrive device controller
//!
//! Owns the connection to one JetDrive, keeps its settings and runs the
//! start-up handshake:
//!
//! 1. `Q` stops any firmware program that is running. The reply ends in a
//!    `>` prompt; a slow responder identifies itself with `MFJET32` and gets
//!    an extra wait plus a receive purge.
//! 2. `X2000` restarts the firmware, one byte at a time, each byte echoed.
//! 3. The bring-up sequence pushes every setting to the device.
//!
//! Frames are only written through the connection's write queue, one at a
//! time, so every reply is attributed to the frame that caused it.

use bytes::Bytes;
use std::time::{Duration, Instant};
use tokio_util::codec::Decoder;

use super::builder::{BuildError, FrameBuilder};
use super::command::Command;
use super::reply::{interpret, Reply};
use super::settings::{DeviceProfile, Settings, Waveform};
use crate::protocol::codec::skip_leading;
use crate::protocol::{
    DeviceEvent, Fault, FixedLengthCodec, Link, Outgoing, PortError, PortSettings, SerialDevice,
    DEFAULT_RESPONSE_TIMEOUT,
};

/// Device name used in messages
pub const NAME: &str = "JetDrive";

/// Line speed of the legacy bring-up
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Stops a running firmware program
pub const STOP_COMMAND: &[u8] = b"Q";

/// Starts the firmware program, sent one byte at a time
pub const START_COMMAND: &[u8] = b"X2000";

/// Signature of the slow-responding controller generation
pub const SLOW_RESPONDER_SIGNATURE: &str = "MFJET32";

/// Prompt closing the reply to the stop command
pub const PROMPT: u8 = b'>';

/// Handshake progress of a JetDrive connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    NotInitialized,
    /// Waiting for the reply to the stop command
    InitQ,
    /// Echoing the start command
    InitX2000,
    /// Pushing settings to the device
    BringUp,
    Initialized,
}

/// What the in-flight frame expects back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Reply to the stop command
    Banner,
    /// Echo of one start command byte
    Echo { byte: u8, last: bool },
    /// Fixed-size binary reply
    Reply { command: Command, bring_up: bool },
}

/// Waits of the connection handshake
#[derive(Debug, Clone, PartialEq)]
pub struct Timing {
    /// Quiet time between opening the port and the first write
    pub connect_delay: Duration,
    pub response_timeout: Duration,
    /// Extra wait before purging when the slow responder answers
    pub slow_responder_wait: Duration,
    /// Settle after each start command byte but the last
    pub echo_settle: Duration,
    /// Settle after the last start command byte
    pub start_settle: Duration,
    /// Bring-up frames in order, each with its settle time
    pub bring_up: Vec<(Command, Duration)>,
}

impl Timing {
    /// Same sequence with every wait removed
    pub fn without_waits() -> Self {
        let mut timing = Self {
            connect_delay: Duration::ZERO,
            slow_responder_wait: Duration::ZERO,
            echo_settle: Duration::ZERO,
            start_settle: Duration::ZERO,
            ..Self::default()
        };
        for (_, settle) in &mut timing.bring_up {
            *settle = Duration::ZERO;
        }
        timing
    }
}

impl Default for Timing {
    fn default() -> Self {
        let ms = Duration::from_millis;
        Self {
            connect_delay: ms(500),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            slow_responder_wait: ms(2000),
            echo_settle: ms(100),
            start_settle: ms(1000),
            bring_up: vec![
                (Command::Reset, ms(3000)),
                (Command::GetVersion, ms(100)),
                (Command::Pulse, ms(550)),
                (Command::ContMode, ms(100)),
                (Command::Drops, ms(1000)),
                (Command::FullFreq, ms(1000)),
                (Command::StrobeDiv, ms(100)),
                (Command::StrobeEnable, ms(100)),
                (Command::StrobeDelay, ms(100)),
                (Command::Source, ms(100)),
            ],
        }
    }
}

/// Controller for one JetDrive
#[derive(Debug)]
pub struct JetDrive {
    link: Link<Expect>,
    builder: FrameBuilder,
    settings: Settings,
    timing: Timing,
    port_settings: PortSettings,
    init_state: InitState,
    /// Bring-up frames still waiting for their reply
    bring_up_remaining: usize,
    last_status: Option<u8>,
}

impl Default for JetDrive {
    fn default() -> Self {
        Self::new(DeviceProfile::default(), Settings::default())
    }
}

impl JetDrive {
    /// Disconnected controller with the default handshake timing
    pub fn new(profile: DeviceProfile, settings: Settings) -> Self {
        Self::with_timing(profile, settings, Timing::default())
    }

    pub fn with_timing(profile: DeviceProfile, settings: Settings, timing: Timing) -> Self {
        Self {
            link: Link::new(NAME, timing.response_timeout),
            builder: FrameBuilder::new(profile),
            settings,
            timing,
            port_settings: PortSettings::new(DEFAULT_BAUD_RATE),
            init_state: InitState::NotInitialized,
            bring_up_remaining: 0,
            last_status: None,
        }
    }

    pub fn with_port_settings(mut self, port_settings: PortSettings) -> Self {
        self.port_settings = port_settings;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn waveform(&self) -> &Waveform {
        &self.settings.waveform
    }

    pub fn profile(&self) -> &DeviceProfile {
        self.builder.profile()
    }

    /// Firmware version used by the builder; updated by GETVERSION
    pub fn firmware_version(&self) -> u8 {
        self.builder.profile().firmware_version
    }

    pub fn init_state(&self) -> InitState {
        self.init_state
    }

    pub fn is_initialized(&self) -> bool {
        self.init_state == InitState::Initialized
    }

    /// Status byte of the last acknowledged command
    pub fn last_status(&self) -> Option<u8> {
        self.last_status
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Connection state, for inspection
    pub fn link(&self) -> &Link<Expect> {
        &self.link
    }

    // ---- settings ------------------------------------------------------

    /// Change the drive waveform (PULSE)
    pub fn set_waveform(&mut self, waveform: Waveform, now: Instant) -> Result<(), BuildError> {
        if self.settings.waveform == waveform {
            return Ok(());
        }
        self.update(Command::Pulse, now, |s| s.waveform = waveform)
    }

    /// Jet continuously at the set frequency (CONTMODE)
    pub fn set_continuous_jetting(&mut self, now: Instant) -> Result<(), BuildError> {
        if self.settings.continuous {
            return Ok(());
        }
        self.update(Command::ContMode, now, |s| s.continuous = true)
    }

    /// One burst per trigger (CONTMODE)
    pub fn set_single_jetting(&mut self, now: Instant) -> Result<(), BuildError> {
        if !self.settings.continuous {
            return Ok(());
        }
        self.update(Command::ContMode, now, |s| s.continuous = false)
    }

    /// Continuous jetting frequency in Hz (FULLFREQ)
    pub fn set_continuous_mode_frequency(&mut self, frequency_hz: u32, now: Instant) -> Result<(), BuildError> {
        if self.settings.frequency_hz == frequency_hz {
            return Ok(());
        }
        self.update(Command::FullFreq, now, |s| s.frequency_hz = frequency_hz)
    }

    /// Drops fired per trigger (DROPS)
    pub fn set_num_drops_per_trigger(&mut self, drops: u16, now: Instant) -> Result<(), BuildError> {
        if self.settings.drops == drops {
            return Ok(());
        }
        self.update(Command::Drops, now, |s| s.drops = drops)
    }

    /// Trigger from the external TTL input (SOURCE)
    pub fn set_external_trigger(&mut self, now: Instant) -> Result<(), BuildError> {
        self.set_trigger_source(super::TriggerSource::External, now)
    }

    /// Trigger from the internal clock or soft trigger (SOURCE)
    pub fn set_internal_trigger(&mut self, now: Instant) -> Result<(), BuildError> {
        self.set_trigger_source(super::TriggerSource::Internal, now)
    }

    fn set_trigger_source(&mut self, source: super::TriggerSource, now: Instant) -> Result<(), BuildError> {
        if self.settings.source == source {
            return Ok(());
        }
        self.update(Command::Source, now, |s| s.source = source)
    }

    /// Continuous mode, internal trigger, then a soft trigger
    pub fn start_continuous_jetting(&mut self, now: Instant) -> Result<(), BuildError> {
        self.set_continuous_jetting(now)?;
        self.set_internal_trigger(now)?;
        self.soft_trigger(now)
    }

    /// Back to single jetting
    pub fn stop_continuous_jetting(&mut self, now: Instant) -> Result<(), BuildError> {
        self.set_single_jetting(now)
    }

    pub fn enable_strobe(&mut self, now: Instant) -> Result<(), BuildError> {
        if self.settings.strobe_enable {
            return Ok(());
        }
        self.update(Command::StrobeEnable, now, |s| s.strobe_enable = true)
    }

    pub fn disable_strobe(&mut self, now: Instant) -> Result<(), BuildError> {
        if !self.settings.strobe_enable {
            return Ok(());
        }
        self.update(Command::StrobeEnable, now, |s| s.strobe_enable = false)
    }

    /// Strobe delay in microseconds (STROBEDELAY)
    pub fn set_strobe_delay(&mut self, delay_us: u16, now: Instant) -> Result<(), BuildError> {
        if self.settings.strobe_delay_us == delay_us {
            return Ok(());
        }
        self.update(Command::StrobeDelay, now, |s| s.strobe_delay_us = delay_us)
    }

    /// Strobe on every n-th pulse (STROBEDIV)
    pub fn set_strobe_divider(&mut self, divider: u8, now: Instant) -> Result<(), BuildError> {
        if self.settings.strobe_divider == divider {
            return Ok(());
        }
        self.update(Command::StrobeDiv, now, |s| s.strobe_divider = divider)
    }

    pub fn poll_status(&mut self, now: Instant) -> Result<(), BuildError> {
        self.send_command(Command::PollStatus, now)
    }

    /// Request the input state dump (DUMPINPUT)
    pub fn dump_input(&mut self, now: Instant) -> Result<(), BuildError> {
        self.send_command(Command::DumpInput, now)
    }

    /// Fire one trigger from software (SOFTTRIGGER)
    pub fn soft_trigger(&mut self, now: Instant) -> Result<(), BuildError> {
        self.send_command(Command::SoftTrigger, now)
    }

    /// Apply a settings change and send the frame that carries it.
    ///
    /// The change is dropped when the frame cannot be built.
    fn update(
        &mut self,
        command: Command,
        now: Instant,
        apply: impl FnOnce(&mut Settings),
    ) -> Result<(), BuildError> {
        let mut next = self.settings;
        apply(&mut next);
        let frame = self.builder.build(command, &next)?;
        self.settings = next;
        self.enqueue(command, frame.into_bytes(), now);
        Ok(())
    }

    /// Build `command` from the current settings and queue it
    pub fn send_command(&mut self, command: Command, now: Instant) -> Result<(), BuildError> {
        let frame = self.builder.build(command, &self.settings)?;
        self.enqueue(command, frame.into_bytes(), now);
        Ok(())
    }

    fn enqueue(&mut self, command: Command, bytes: Bytes, now: Instant) {
        if bytes.is_empty() {
            return;
        }
        let command = bytes
            .get(2)
            .and_then(|&code| Command::from_code(code))
            .unwrap_or(command);
        let expect = Expect::Reply {
            command,
            bring_up: false,
        };
        self.link.send(Outgoing::new(bytes, expect), now);
    }

    // ---- connection ----------------------------------------------------

    fn handshake_batch(&self) -> Vec<Outgoing<Expect>> {
        let mut batch = vec![Outgoing::new(STOP_COMMAND, Expect::Banner)];
        let last = START_COMMAND.len() - 1;
        for (i, &byte) in START_COMMAND.iter().enumerate() {
            let settle = if i == last {
                self.timing.start_settle
            } else {
                self.timing.echo_settle
            };
            batch.push(
                Outgoing::new(vec![byte], Expect::Echo { byte, last: i == last }).with_settle(settle),
            );
        }
        batch
    }

    fn bring_up_batch(&mut self) -> Vec<Outgoing<Expect>> {
        let mut batch = Vec::with_capacity(self.timing.bring_up.len());
        for &(command, settle) in &self.timing.bring_up {
            match self.builder.build(command, &self.settings) {
                Ok(frame) if frame.is_empty() => {}
                Ok(frame) => {
                    let command = frame.command().unwrap_or(command);
                    let expect = Expect::Reply {
                        command,
                        bring_up: true,
                    };
                    batch.push(Outgoing::new(frame.into_bytes(), expect).with_settle(settle));
                }
                Err(e) => {
                    self.link
                        .events()
                        .error(format!("Skipping {command} during {NAME} bring-up: {e}"));
                }
            }
        }
        batch
    }

    fn fail(&mut self, fault: Fault) {
        self.link.fail(fault);
        self.reset_state();
    }

    fn reset_state(&mut self) {
        self.init_state = InitState::NotInitialized;
        self.bring_up_remaining = 0;
    }

    fn initialized(&mut self) {
        self.init_state = InitState::Initialized;
        self.link.events().response(format!("Connected to {NAME}"));
    }

    fn handle_banner(&mut self, now: Instant) {
        let rx = self.link.rx();
        let slow = rx
            .windows(SLOW_RESPONDER_SIGNATURE.len())
            .any(|w| w == SLOW_RESPONDER_SIGNATURE.as_bytes());
        if !slow && !rx.contains(&PROMPT) {
            return;
        }

        self.init_state = InitState::InitX2000;
        if slow {
            tracing::info!(device = NAME, "slow responder detected, waiting before purge");
            self.link.complete_and_purge(now, self.timing.slow_responder_wait);
        } else {
            self.link.complete(now);
        }
    }

    fn handle_echo(&mut self, expected: u8, last: bool, now: Instant) {
        skip_leading(self.link.rx_mut(), |b| b == b'\r' || b == b'\n');
        let Some(&got) = self.link.rx().first() else {
            return;
        };

        if got != expected {
            self.fail(Fault::Initialization {
                device: NAME.to_string(),
                reason: format!(
                    "start command echo mismatch: expected '{}' but got '{}'",
                    expected.escape_ascii(),
                    got.escape_ascii()
                ),
            });
            return;
        }

        if last {
            self.init_state = InitState::BringUp;
            let batch = self.bring_up_batch();
            self.bring_up_remaining = batch.len();
            self.link.send_first(batch, now);
        }
        self.link.complete(now);

        if last && self.bring_up_remaining == 0 {
            self.initialized();
        }
    }

    fn handle_reply(&mut self, command: Command, bring_up: bool, now: Instant) {
        let reply = match FixedLengthCodec::new(command.reply_size()).decode(self.link.rx_mut()) {
            Ok(Some(reply)) => reply,
            Ok(None) | Err(_) => return,
        };

        match interpret(command, &reply) {
            Ok(reply) => self.accept_reply(&reply),
            Err(e) => {
                self.fail(Fault::Protocol {
                    device: NAME.to_string(),
                    reason: e.to_string(),
                });
                return;
            }
        }
        self.link.complete(now);

        if bring_up {
            self.bring_up_remaining = self.bring_up_remaining.saturating_sub(1);
            if self.bring_up_remaining == 0 && self.init_state == InitState::BringUp {
                self.initialized();
            }
        }
    }

    fn accept_reply(&mut self, reply: &Reply) {
        match reply {
            Reply::Ack { command, status, .. } => {
                tracing::debug!(device = NAME, %command, status, "ACK");
                self.last_status = Some(*status);
                if let Some(version) = reply.version() {
                    self.builder.set_firmware_version(version);
                    self.link
                        .events()
                        .response(format!("{NAME} firmware version {version}"));
                }
            }
            Reply::Nak { command, .. } => {
                self.link
                    .events()
                    .error(format!("{NAME} did not understand {command} (NAK)"));
            }
        }
    }
}

impl SerialDevice for JetDrive {
    fn name(&self) -> &str {
        NAME
    }

    fn port_settings(&self) -> PortSettings {
        self.port_settings
    }

    fn is_connected(&self) -> bool {
        self.link.is_open()
    }

    fn connect(&mut self, port: &str, now: Instant) {
        if !self.link.open(port) {
            return;
        }
        self.reset_state();
        self.link.events().response(format!("Connecting to {NAME}"));
        self.link.hold(now, self.timing.connect_delay);
        self.init_state = InitState::InitQ;
        let batch = self.handshake_batch();
        self.link.send_first(batch, now);
    }

    fn connect_failed(&mut self, error: &PortError) {
        let reason = error.reason().unwrap_or("port unavailable");
        self.link.open_failed(error.port(), reason);
    }

    fn disconnect(&mut self) {
        self.link.close();
        self.reset_state();
    }

    fn handle_bytes(&mut self, data: &[u8], now: Instant) {
        if !self.link.accept(data) {
            return;
        }
        let Some(expect) = self.link.in_flight().map(|f| f.tag) else {
            return;
        };
        match expect {
            Expect::Banner => self.handle_banner(now),
            Expect::Echo { byte, last } => self.handle_echo(byte, last, now),
            Expect::Reply { command, bring_up } => self.handle_reply(command, bring_up, now),
        }
    }

    fn handle_tick(&mut self, now: Instant) {
        if let Some(fault) = self.link.poll(now) {
            self.fail(fault);
        }
    }

    fn handle_port_error(&mut self, error: PortError) {
        self.fail(Fault::Transport(error));
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.link.deadline()
    }

    fn take_outbound(&mut self) -> Option<Bytes> {
        self.link.take_outbound()
    }

    fn take_purge_request(&mut self) -> bool {
        self.link.take_purge_request()
    }

    fn drain_events(&mut self) -> Vec<DeviceEvent> {
        self.link.drain_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jetdrive::command::ACK;
    use pretty_assertions::assert_eq;

    fn ack(command: Command) -> Vec<u8> {
        let mut reply = vec![ACK, command.reply_size() as u8 - 1, 0x00];
        reply.resize(command.reply_size(), command.code());
        reply
    }

    /// Connected controller with the handshake done and no waits
    fn initialized() -> (JetDrive, Instant) {
        let now = Instant::now();
        let mut jet = JetDrive::with_timing(
            DeviceProfile::default(),
            Settings::default(),
            Timing::without_waits(),
        );
        jet.connect("/dev/ttyTEST", now);
        jet.handle_tick(now);
        assert_eq!(jet.take_outbound().as_deref(), Some(&b"Q"[..]));
        jet.handle_bytes(b"Q - This is a dummy response. BEEP>", now);
        for &byte in START_COMMAND {
            jet.handle_tick(now);
            assert_eq!(jet.take_outbound().as_deref(), Some(&[byte][..]));
            jet.handle_bytes(&[byte], now);
        }
        for (command, _) in Timing::default().bring_up {
            jet.handle_tick(now);
            let out = jet.take_outbound().expect("bring-up frame");
            assert_eq!(out[2], command.code());
            jet.handle_bytes(&ack(command), now);
        }
        assert_eq!(jet.init_state(), InitState::Initialized);
        jet.drain_events();
        (jet, now)
    }

    #[test]
    fn test_handshake_reaches_initialized() {
        let (jet, _) = initialized();
        assert!(jet.is_connected());
        assert!(jet.link().is_idle());
    }

    #[test]
    fn test_setter_only_sends_on_change() {
        let (mut jet, now) = initialized();
        jet.set_num_drops_per_trigger(1, now).unwrap();
        assert_eq!(jet.take_outbound(), None);

        jet.set_num_drops_per_trigger(300, now).unwrap();
        let out = jet.take_outbound().unwrap();
        assert_eq!(&out[..5], &[b'S', 0x04, 0x03, 0x01, 0x2C]);
        assert_eq!(jet.settings().drops, 300);
    }

    #[test]
    fn test_build_failure_keeps_settings_and_link() {
        let (mut jet, now) = initialized();
        let err = jet.set_continuous_mode_frequency(70_000, now).unwrap_err();
        assert_eq!(err, BuildError::FullFrequencyOutOfRange(70_000));
        assert_eq!(jet.settings().frequency_hz, 1000);
        assert_eq!(jet.take_outbound(), None);
        assert!(jet.is_connected());
    }

    #[test]
    fn test_nak_keeps_link_up() {
        let (mut jet, now) = initialized();
        jet.poll_status(now).unwrap();
        jet.take_outbound();
        jet.handle_bytes(&[0x15, 0x03, 0x02, 0x1A], now);
        assert!(jet.is_connected());
        assert_eq!(
            jet.drain_events(),
            vec![DeviceEvent::Error("JetDrive did not understand POLLSTATUS (NAK)".into())]
        );
    }

    #[test]
    fn test_garbage_reply_disconnects() {
        let (mut jet, now) = initialized();
        jet.poll_status(now).unwrap();
        jet.take_outbound();
        jet.handle_bytes(&[0x41, 0x42, 0x43, 0x44], now);
        assert!(!jet.is_connected());
        assert_eq!(jet.init_state(), InitState::NotInitialized);
        let events = jet.drain_events();
        assert!(events[0].is_error());
        assert!(events[0].text().starts_with("Unexpected response from JetDrive"));
    }

    #[test]
    fn test_echo_mismatch_is_fatal() {
        let now = Instant::now();
        let mut jet = JetDrive::with_timing(
            DeviceProfile::default(),
            Settings::default(),
            Timing::without_waits(),
        );
        jet.connect("/dev/ttyTEST", now);
        jet.handle_tick(now);
        jet.take_outbound();
        jet.handle_bytes(b">", now);
        jet.handle_tick(now);
        assert_eq!(jet.take_outbound().as_deref(), Some(&b"X"[..]));
        jet.handle_bytes(b"\r\nY", now);

        assert!(!jet.is_connected());
        assert_eq!(jet.init_state(), InitState::NotInitialized);
        let events = jet.drain_events();
        assert!(events.iter().any(|e| e.text()
            == "JetDrive initialization failed: start command echo mismatch: expected 'X' but got 'Y'"));
    }

    #[test]
    fn test_slow_responder_waits_then_purges() {
        let start = Instant::now();
        let mut jet = JetDrive::new(DeviceProfile::default(), Settings::default());
        jet.connect("/dev/ttyTEST", start);

        let after_connect = start + Duration::from_millis(500);
        jet.handle_tick(after_connect);
        assert_eq!(jet.take_outbound().as_deref(), Some(&b"Q"[..]));

        let banner = after_connect + Duration::from_millis(40);
        jet.handle_bytes(b"MFJET32 Ver 3.2\r\n", banner);
        assert_eq!(jet.init_state(), InitState::InitX2000);
        assert_eq!(jet.take_outbound(), None);

        jet.handle_tick(banner + Duration::from_millis(1999));
        assert_eq!(jet.take_outbound(), None);
        assert!(!jet.take_purge_request());

        jet.handle_tick(banner + Duration::from_millis(2000));
        assert!(jet.take_purge_request());
        assert_eq!(jet.take_outbound().as_deref(), Some(&b"X"[..]));
    }

    #[test]
    fn test_reply_waits_for_full_size() {
        let (mut jet, now) = initialized();
        let before = jet.firmware_version();
        jet.send_command(Command::GetVersion, now).unwrap();
        jet.take_outbound();

        jet.handle_bytes(&[ACK, 0x04, 0x00], now);
        assert!(jet.link().in_flight().is_some());
        assert_eq!(jet.firmware_version(), before);

        jet.handle_bytes(&[0xF0, 43], now);
        assert!(jet.link().in_flight().is_none());
        assert_eq!(jet.firmware_version(), 43);
        assert!(jet.is_connected());
    }

    #[test]
    fn test_getversion_updates_firmware() {
        let (mut jet, now) = initialized();
        jet.send_command(Command::GetVersion, now).unwrap();
        jet.take_outbound();
        jet.handle_bytes(&[ACK, 0x04, 0x00, 0xF0, 44], now);
        assert_eq!(jet.firmware_version(), 44);
    }

    #[test]
    fn test_start_continuous_jetting() {
        let (mut jet, now) = initialized();
        jet.start_continuous_jetting(now).unwrap();

        let mut sent = Vec::new();
        while let Some(out) = jet.take_outbound() {
            sent.push(out[2]);
            let command = Command::from_code(out[2]).unwrap();
            jet.handle_bytes(&ack(command), now);
        }
        assert_eq!(
            sent,
            vec![
                Command::ContMode.code(),
                Command::Source.code(),
                Command::SoftTrigger.code()
            ]
        );
        assert!(jet.settings().continuous);
        assert_eq!(jet.settings().source, crate::jetdrive::TriggerSource::Internal);
    }
}
