//! Command Frame Builder
//!
//! Maps a command plus the current settings to the exact bytes the JetDrive
//! expects:
//!
//! ```text
//! +-----+-----+-----+-------------+----------+
//! | 'S' | len | cmd | payload ... | checksum |
//! +-----+-----+-----+-------------+----------+
//! ```
//!
//! `len` counts every byte after the header, up to but excluding the
//! checksum. The checksum is the unsigned sum of bytes `1..` truncated to
//! 8 bits. Multi-byte values are big-endian.

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use thiserror::Error;

use super::command::{Command, HEADER};
use super::settings::{DeviceProfile, Settings, Waveform};

/// Base clock the FREQUENCY divider applies to (Hz)
pub const FREQBASE: f64 = 625_000.0;

/// Largest divider that fits the 12-bit FREQUENCY field
pub const MAX_DIVIDER: i64 = 4095;

/// Oldest firmware that understands LOWFREQ
pub const LOWFREQ_MIN_FIRMWARE: u8 = 40;

/// Voltage slew limit used for the minimum transition times (V/µs)
pub const RATE_LIMIT: f64 = 30.0;

/// Floor added to every computed transition time (tenths of µs)
pub const MIN_TRANSITION: i32 = 10;

/// Longest frame before the checksum
const MAX_FRAME: usize = 22;

/// A request that cannot be encoded; nothing may be transmitted for it
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    #[error("LOWFREQ needs a frequency below 256 Hz and firmware 40 or newer (got {frequency_hz} Hz, firmware {firmware})")]
    LowFrequencyOutOfRange { frequency_hz: u32, firmware: u8 },

    #[error("FULLFREQ frequency {0} Hz does not fit in 16 bits")]
    FullFrequencyOutOfRange(u32),

    #[error("{0} cannot be built")]
    Unsupported(Command),
}

/// A finished, checksummed frame. Empty for NOCOMMAND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Encoded frame, empty for NOCOMMAND
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Total size including header and checksum
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// An empty frame must not be transmitted
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The command byte actually on the wire, which may differ from the
    /// requested one (FREQUENCY falls back to LOWFREQ, EXTERNENABLE to SOURCE)
    pub fn command(&self) -> Option<Command> {
        self.bytes.get(2).and_then(|&code| Command::from_code(code))
    }

    /// Length byte (bytes after the header, before the checksum)
    pub fn length_byte(&self) -> Option<u8> {
        self.bytes.get(1).copied()
    }

    /// Bytes after the command byte, before the checksum
    pub fn payload(&self) -> &[u8] {
        if self.bytes.len() < 4 {
            &[]
        } else {
            &self.bytes[3..self.bytes.len() - 1]
        }
    }

    /// Trailing checksum byte
    pub fn checksum_byte(&self) -> Option<u8> {
        self.bytes.last().copied()
    }
}

/// Unsigned 8-bit sum of every byte after the header
pub fn checksum(body: &[u8]) -> u8 {
    body.iter()
        .skip(1)
        .fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Tenths of a microsecond, truncated
fn tenths(time_us: f64) -> i32 {
    (time_us * 10.0 + 0.001) as i32
}

/// Shortest transition that respects the slew limit for a voltage step
fn min_transition(delta_v: i32) -> i32 {
    ((delta_v as f64 / RATE_LIMIT).abs() * 10.0) as i32 + MIN_TRANSITION
}

fn put_u16(buf: &mut [u8], value: i64) {
    // Wraps like the 16-bit fields on the device
    BigEndian::write_u16(buf, value as u16);
}

/// Whether a waveform needs the extended 22-byte PULSE layout
pub fn needs_extended_pulse(waveform: &Waveform, profile: &DeviceProfile) -> bool {
    profile.is_dream()
        || waveform.idle_v.unsigned_abs() > 100
        || waveform.dwell_v.unsigned_abs() > 100
        || waveform.echo_v.unsigned_abs() > 100
        || waveform.rise_us > 0.11
        || waveform.fall_us > 0.11
        || waveform.final_us > 0.11
}

/// Whether the compact PULSE layout must carry the echo voltage
pub fn is_crossing(waveform: &Waveform) -> bool {
    let idle = waveform.idle_v as i32;
    (waveform.echo_v as i32 - idle) * (waveform.dwell_v as i32 - idle) < 0
}

/// Builds frames for one JetDrive
#[derive(Debug, Clone, Default)]
pub struct FrameBuilder {
    profile: DeviceProfile,
}

impl FrameBuilder {
    /// Builder for a device with `profile`
    pub fn new(profile: DeviceProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// Record the firmware version reported by the device
    pub fn set_firmware_version(&mut self, version: u8) {
        self.profile.firmware_version = version;
    }

    /// Encode `command` from the current `settings`
    pub fn build(&self, command: Command, settings: &Settings) -> Result<Frame, BuildError> {
        let profile = &self.profile;
        let mut buf = [0u8; MAX_FRAME];
        buf[0] = HEADER;
        buf[2] = command.code();

        let len = match command {
            Command::NoCommand => return Ok(Frame::default()),

            Command::Reset
            | Command::PollStatus
            | Command::SoftTrigger
            | Command::MultiTrigger
            | Command::DumpInput
            | Command::GetVersion => 3,

            Command::Drops => {
                if profile.is_dream() || settings.drops > 255 {
                    BigEndian::write_u16(&mut buf[3..5], settings.drops);
                    5
                } else {
                    buf[3] = settings.drops as u8;
                    4
                }
            }

            Command::ContMode => {
                buf[3] = settings.continuous as u8;
                4
            }

            Command::Frequency => {
                let frequency = settings.frequency_hz.max(1);
                let mut divider = ((FREQBASE / frequency as f64 - 0.5) as i64).max(1);
                if profile.firmware_version < LOWFREQ_MIN_FIRMWARE && divider > MAX_DIVIDER {
                    divider = MAX_DIVIDER;
                }
                if divider <= MAX_DIVIDER {
                    put_u16(&mut buf[3..5], divider);
                    5
                } else {
                    buf[2] = Command::LowFreq.code();
                    buf[3] = frequency as u8;
                    4
                }
            }

            Command::Pulse => {
                Self::encode_pulse(&mut buf, &settings.waveform, profile)
            }

            Command::StrobeDiv => {
                buf[3] = settings.strobe_divider;
                4
            }

            Command::Source => {
                buf[3] = if profile.multi_channel {
                    settings.channel_on as u8
                } else {
                    settings.source.flag() as u8
                };
                4
            }

            Command::ExternEnable => {
                if !profile.multi_channel {
                    buf[2] = Command::Source.code();
                }
                buf[3] = profile.extern_enable as u8;
                4
            }

            Command::StrobeEnable => {
                buf[3] = settings.strobe_enable as u8;
                4
            }

            Command::LowFreq => {
                if settings.frequency_hz >= 256 || profile.firmware_version < LOWFREQ_MIN_FIRMWARE {
                    return Err(BuildError::LowFrequencyOutOfRange {
                        frequency_hz: settings.frequency_hz,
                        firmware: profile.firmware_version,
                    });
                }
                buf[3] = settings.frequency_hz as u8;
                4
            }

            Command::FullFreq => {
                let frequency = u16::try_from(settings.frequency_hz)
                    .map_err(|_| BuildError::FullFrequencyOutOfRange(settings.frequency_hz))?;
                BigEndian::write_u16(&mut buf[3..5], frequency);
                5
            }

            Command::StrobeDelay => {
                // Potentiometer stays on
                buf[3] = 0x01;
                BigEndian::write_u16(&mut buf[4..6], settings.strobe_delay_us);
                6
            }

            Command::Debug => {
                buf[3] = settings.debug_switch;
                buf[4] = settings.debug_value;
                5
            }

            Command::Poke => {
                buf[3..6].copy_from_slice(&[0x40, 0x07, 0x0D]);
                6
            }

            Command::EditChannel => return Err(BuildError::Unsupported(command)),
        };

        Ok(Self::finish(&mut buf[..len]))
    }

    /// Fill the PULSE payload and return the frame length
    fn encode_pulse(buf: &mut [u8; MAX_FRAME], waveform: &Waveform, profile: &DeviceProfile) -> usize {
        put_u16(&mut buf[5..7], tenths(waveform.dwell_us) as i64);
        put_u16(&mut buf[8..10], tenths(waveform.echo_us) as i64);

        if needs_extended_pulse(waveform, profile) {
            buf[3] = 0;
            buf[4] = 0;
            buf[7] = 0;
            BigEndian::write_i16(&mut buf[10..12], waveform.idle_v);
            BigEndian::write_i16(&mut buf[12..14], waveform.dwell_v);
            BigEndian::write_i16(&mut buf[14..16], waveform.echo_v);

            let idle = waveform.idle_v as i32;
            let dwell = waveform.dwell_v as i32;
            let echo = waveform.echo_v as i32;
            let rise = tenths(waveform.rise_us).max(min_transition(dwell - idle));
            let fall = tenths(waveform.fall_us).max(min_transition(echo - dwell));
            let last = tenths(waveform.final_us).max(min_transition(idle - echo));
            put_u16(&mut buf[16..18], rise as i64);
            put_u16(&mut buf[18..20], fall as i64);
            put_u16(&mut buf[20..22], last as i64);
            22
        } else {
            buf[3] = waveform.idle_v as u8;
            buf[4] = waveform.dwell_v as u8;
            if is_crossing(waveform) {
                buf[7] = waveform.echo_v as u8;
                10
            } else {
                7
            }
        }
    }

    /// Write the length byte and append the checksum
    fn finish(body: &mut [u8]) -> Frame {
        if body.len() <= 1 {
            return Frame::default();
        }
        body[1] = (body.len() - 1) as u8;
        let mut bytes = Vec::with_capacity(body.len() + 1);
        bytes.extend_from_slice(body);
        bytes.push(checksum(body));
        Frame {
            bytes: Bytes::from(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jetdrive::settings::ControllerKind;
    use pretty_assertions::assert_eq;

    fn standard() -> FrameBuilder {
        FrameBuilder::new(DeviceProfile {
            kind: ControllerKind::Standard,
            ..DeviceProfile::default()
        })
    }

    #[test]
    fn test_reset_frame() {
        let frame = FrameBuilder::default()
            .build(Command::Reset, &Settings::default())
            .unwrap();
        assert_eq!(&frame.bytes()[..], &[b'S', 0x02, 0x01, 0x03]);
        assert_eq!(frame.command(), Some(Command::Reset));
    }

    #[test]
    fn test_getversion_frame() {
        let frame = FrameBuilder::default()
            .build(Command::GetVersion, &Settings::default())
            .unwrap();
        assert_eq!(&frame.bytes()[..], &[b'S', 0x02, 0xF0, 0xF2]);
    }

    #[test]
    fn test_config_only_fields_are_not_encoded() {
        let builder = FrameBuilder::default();
        let defaults = Settings::default();
        let mut tuned = Settings {
            gain: 90,
            ..Settings::default()
        };
        tuned.waveform.delay_us = 12.5;

        for command in Command::ALL {
            assert_eq!(
                builder.build(command, &defaults),
                builder.build(command, &tuned),
                "{command}"
            );
        }
    }

    #[test]
    fn test_nocommand_is_empty() {
        let frame = FrameBuilder::default()
            .build(Command::NoCommand, &Settings::default())
            .unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.command(), None);
    }

    #[test]
    fn test_editchannel_is_unsupported() {
        let err = FrameBuilder::default()
            .build(Command::EditChannel, &Settings::default())
            .unwrap_err();
        assert_eq!(err, BuildError::Unsupported(Command::EditChannel));
        assert_eq!(err.to_string(), "EDITCHANNEL cannot be built");
    }

    #[test]
    fn test_fullfreq() {
        let settings = Settings {
            frequency_hz: 1000,
            ..Settings::default()
        };
        let frame = FrameBuilder::default().build(Command::FullFreq, &settings).unwrap();
        assert_eq!(&frame.bytes()[..], &[b'S', 0x04, 0x12, 0x03, 0xE8, 0x01]);

        let settings = Settings {
            frequency_hz: 65536,
            ..Settings::default()
        };
        assert_eq!(
            FrameBuilder::default().build(Command::FullFreq, &settings),
            Err(BuildError::FullFrequencyOutOfRange(65536))
        );
    }

    #[test]
    fn test_frequency_uses_divider() {
        let settings = Settings {
            frequency_hz: 1000,
            ..Settings::default()
        };
        let frame = FrameBuilder::default().build(Command::Frequency, &settings).unwrap();
        // 625000 / 1000 - 0.5 = 624.5 -> 624
        assert_eq!(frame.payload(), &[0x02, 0x70]);
        assert_eq!(frame.command(), Some(Command::Frequency));
    }

    #[test]
    fn test_frequency_zero_clamps_to_one_hz() {
        let settings = Settings {
            frequency_hz: 0,
            ..Settings::default()
        };
        let mut builder = FrameBuilder::default();
        builder.set_firmware_version(40);
        let frame = builder.build(Command::Frequency, &settings).unwrap();
        assert_eq!(frame.command(), Some(Command::LowFreq));
        assert_eq!(frame.payload(), &[0x01]);
    }

    #[test]
    fn test_frequency_old_firmware_clamps_divider() {
        let settings = Settings {
            frequency_hz: 100,
            ..Settings::default()
        };
        let frame = FrameBuilder::default().build(Command::Frequency, &settings).unwrap();
        assert_eq!(frame.command(), Some(Command::Frequency));
        assert_eq!(frame.payload(), &[0x0F, 0xFF]);
    }

    #[test]
    fn test_lowfreq_limits() {
        let settings = Settings {
            frequency_hz: 100,
            ..Settings::default()
        };
        assert_eq!(
            FrameBuilder::default().build(Command::LowFreq, &settings),
            Err(BuildError::LowFrequencyOutOfRange {
                frequency_hz: 100,
                firmware: 0
            })
        );

        let mut builder = FrameBuilder::default();
        builder.set_firmware_version(41);
        let frame = builder.build(Command::LowFreq, &settings).unwrap();
        assert_eq!(&frame.bytes()[..], &[b'S', 0x03, 0x11, 100, 0x03 + 0x11 + 100]);

        let settings = Settings {
            frequency_hz: 256,
            ..Settings::default()
        };
        assert!(builder.build(Command::LowFreq, &settings).is_err());
    }

    #[test]
    fn test_drops_width() {
        let settings = Settings {
            drops: 200,
            ..Settings::default()
        };
        assert_eq!(standard().build(Command::Drops, &settings).unwrap().payload(), &[200]);
        assert_eq!(
            FrameBuilder::default().build(Command::Drops, &settings).unwrap().payload(),
            &[0x00, 200]
        );
    }

    #[test]
    fn test_flags() {
        let settings = Settings {
            continuous: true,
            strobe_enable: false,
            strobe_divider: 3,
            ..Settings::default()
        };
        let builder = FrameBuilder::default();
        assert_eq!(builder.build(Command::ContMode, &settings).unwrap().payload(), &[1]);
        assert_eq!(builder.build(Command::StrobeEnable, &settings).unwrap().payload(), &[0]);
        assert_eq!(builder.build(Command::StrobeDiv, &settings).unwrap().payload(), &[3]);
        assert_eq!(builder.build(Command::Source, &settings).unwrap().payload(), &[1]);
    }

    #[test]
    fn test_source_uses_channel_flag_when_multi_channel() {
        let builder = FrameBuilder::new(DeviceProfile {
            multi_channel: true,
            ..DeviceProfile::default()
        });
        let settings = Settings {
            channel_on: true,
            source: crate::jetdrive::TriggerSource::Internal,
            ..Settings::default()
        };
        assert_eq!(builder.build(Command::Source, &settings).unwrap().payload(), &[1]);
    }

    #[test]
    fn test_externenable_becomes_source_on_single_channel() {
        let builder = FrameBuilder::new(DeviceProfile {
            extern_enable: true,
            ..DeviceProfile::default()
        });
        let frame = builder.build(Command::ExternEnable, &Settings::default()).unwrap();
        assert_eq!(frame.command(), Some(Command::Source));
        assert_eq!(frame.payload(), &[1]);
    }

    #[test]
    fn test_strobedelay_debug_poke() {
        let settings = Settings {
            strobe_delay_us: 300,
            debug_switch: 2,
            debug_value: 9,
            ..Settings::default()
        };
        let builder = FrameBuilder::default();
        assert_eq!(
            builder.build(Command::StrobeDelay, &settings).unwrap().payload(),
            &[0x01, 0x01, 0x2C]
        );
        assert_eq!(builder.build(Command::Debug, &settings).unwrap().payload(), &[2, 9]);
        let poke = builder.build(Command::Poke, &settings).unwrap();
        assert_eq!(&poke.bytes()[..], &[b'S', 0x05, 0xEF, 0x40, 0x07, 0x0D, 0x48]);
    }

    #[test]
    fn test_pulse_compact_layout() {
        let settings = Settings {
            waveform: Waveform {
                rise_us: 0.1,
                fall_us: 0.1,
                final_us: 0.1,
                idle_v: 0,
                dwell_v: 20,
                echo_v: 10,
                ..Waveform::default()
            },
            ..Settings::default()
        };
        let frame = standard().build(Command::Pulse, &settings).unwrap();
        // idle, dwell, dwell time 200
        assert_eq!(frame.length_byte(), Some(6));
        assert_eq!(frame.payload(), &[0, 20, 0x00, 0xC8]);
    }

    #[test]
    fn test_pulse_extended_layout() {
        let frame = FrameBuilder::default()
            .build(Command::Pulse, &Settings::default())
            .unwrap();
        assert_eq!(frame.len(), 23);
        assert_eq!(
            frame.payload(),
            &[
                0x00, 0x00, // unused
                0x00, 0xC8, // dwell time 20.0 us
                0x00, // unused
                0x01, 0x90, // echo time 40.0 us
                0x00, 0x00, // idle 0 V
                0x00, 0x14, // dwell 20 V
                0xFF, 0xEC, // echo -20 V
                0x00, 0x1E, // rise max(30, 6 + 10)
                0x00, 0x1E, // fall max(30, 13 + 10)
                0x00, 0x1E, // final max(30, 6 + 10)
            ]
        );
    }

    #[test]
    fn test_pulse_transition_floor() {
        let settings = Settings {
            waveform: Waveform {
                rise_us: 0.0,
                fall_us: 0.0,
                final_us: 0.0,
                idle_v: 0,
                dwell_v: 90,
                echo_v: -90,
                ..Waveform::default()
            },
            ..Settings::default()
        };
        let frame = FrameBuilder::default().build(Command::Pulse, &settings).unwrap();
        let b = frame.bytes();
        // |90|/30*10 + 10 = 40, |-180|/30*10 + 10 = 70
        assert_eq!(&b[16..22], &[0x00, 40, 0x00, 70, 0x00, 40]);
    }

    #[test]
    fn test_checksum_is_unsigned() {
        assert_eq!(checksum(&[b'S', 0x80, 0x90]), 0x10);
        assert_eq!(checksum(&[b'S']), 0);
    }
}
