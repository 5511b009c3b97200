//! JetDrive settings
//!
//! The drive waveform and device parameters the frame builder encodes, plus
//! the hardware profile that decides which encoding variants are used.

use serde::{Deserialize, Serialize};

/// Piezo drive waveform.
///
/// Times are in microseconds, voltages in volts. The pulse rises from the
/// idle voltage to the dwell voltage, falls to the echo voltage and returns
/// to idle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Waveform {
    /// Idle to dwell transition
    pub rise_us: f64,
    pub dwell_us: f64,
    /// Dwell to echo transition
    pub fall_us: f64,
    pub echo_us: f64,
    /// Echo back to idle transition
    pub final_us: f64,
    /// Kept with the printer configuration; no command encodes it
    pub delay_us: f64,

    pub idle_v: i16,
    pub dwell_v: i16,
    pub echo_v: i16,
}

impl Default for Waveform {
    fn default() -> Self {
        Self {
            rise_us: 3.0,
            dwell_us: 20.0,
            fall_us: 3.0,
            echo_us: 40.0,
            final_us: 3.0,
            delay_us: 0.0,
            idle_v: 0,
            dwell_v: 20,
            echo_v: -20,
        }
    }
}

/// What starts a jetting cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerSource {
    /// Internal clock or soft trigger
    Internal,
    /// External TTL trigger
    External,
}

impl TriggerSource {
    pub fn flag(self) -> bool {
        self == TriggerSource::External
    }
}

/// Device parameters sent to the JetDrive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub waveform: Waveform,
    /// Jetting frequency in continuous mode (Hz)
    pub frequency_hz: u32,
    /// Drive amplifier gain. Kept with the printer configuration; no
    /// command encodes it
    pub gain: i16,
    /// Continuous jetting when set, one burst per trigger otherwise
    pub continuous: bool,
    pub source: TriggerSource,
    /// Drops per trigger
    pub drops: u16,
    pub strobe_delay_us: u16,
    /// Strobe flashes every n-th pulse
    pub strobe_divider: u8,
    pub strobe_enable: bool,
    pub debug_switch: u8,
    pub debug_value: u8,
    pub channel_on: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            waveform: Waveform::default(),
            frequency_hz: 1000,
            gain: 225,
            continuous: false,
            source: TriggerSource::External,
            drops: 1,
            strobe_delay_us: 0,
            strobe_divider: 1,
            strobe_enable: true,
            debug_switch: 0,
            debug_value: 0,
            channel_on: false,
        }
    }
}

/// JetDrive hardware generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerKind {
    /// Extended hardware; always uses the wide encodings
    #[default]
    Dream,
    Standard,
}

/// Hardware facts the frame builder depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    pub kind: ControllerKind,
    /// Firmware version as reported by GETVERSION (0 until known)
    pub firmware_version: u8,
    pub multi_channel: bool,
    /// Payload of EXTERNENABLE
    pub extern_enable: bool,
}

impl DeviceProfile {
    pub fn is_dream(&self) -> bool {
        self.kind == ControllerKind::Dream
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            kind: ControllerKind::Dream,
            firmware_version: 0,
            multi_channel: false,
            extern_enable: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.frequency_hz, 1000);
        assert_eq!(settings.source, TriggerSource::External);
        assert_eq!(settings.waveform.echo_v, -20);
        assert!(settings.strobe_enable);
        assert!(DeviceProfile::default().is_dream());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"drops": 300, "waveform": {"dwell_v": 40}}"#).unwrap();
        assert_eq!(settings.drops, 300);
        assert_eq!(settings.waveform.dwell_v, 40);
        assert_eq!(settings.waveform.echo_v, -20);
        assert_eq!(settings.frequency_hz, 1000);
    }
}
