//! Serial port handling
//!
//! Opening, configuring and enumerating the physical ports the devices hang
//! off. Reading and writing is left to a driver (see `driver` and `blocking`).

use serde::{Deserialize, Serialize};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::Duration;

use super::PortError;

/// Line settings for a serial port, 8N1 without flow control by default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSettings {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: ParitySetting,
    pub stop_bits: u8,
}

/// Parity selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParitySetting {
    None,
    Odd,
    Even,
}

impl PortSettings {
    /// 8N1 at `baud_rate`, no flow control
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: 8,
            parity: ParitySetting::None,
            stop_bits: 1,
        }
    }

    fn data_bits(&self) -> serialport::DataBits {
        match self.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            _ => serialport::DataBits::Eight,
        }
    }

    fn parity(&self) -> serialport::Parity {
        match self.parity {
            ParitySetting::None => serialport::Parity::None,
            ParitySetting::Odd => serialport::Parity::Odd,
            ParitySetting::Even => serialport::Parity::Even,
        }
    }

    fn stop_bits(&self) -> serialport::StopBits {
        match self.stop_bits {
            2 => serialport::StopBits::Two,
            _ => serialport::StopBits::One,
        }
    }
}

impl Default for PortSettings {
    fn default() -> Self {
        Self::new(9600)
    }
}

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                name: info.port_name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer,
                product: usb.product,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// Sort key: USB serial adapters (ttyUSB*) first since both controllers sit
/// behind FTDI-style adapters, then ttyACM*, then COM ports by number, then
/// everything else by name.
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    let numbered = [("ttyUSB", 0u8), ("ttyACM", 1), ("COM", 2)];
    for (prefix, rank) in numbered {
        if let Some(rest) = basename.strip_prefix(prefix) {
            let num = rest.parse::<usize>().unwrap_or(usize::MAX);
            return (rank, num, basename.to_string());
        }
    }
    (3, 0, basename.to_string())
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports().unwrap_or_default() {
        let p = PortInfo::from(info);
        map.entry(p.name.clone()).or_insert(p);
    }

    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyACM") || fname.starts_with("ttyUSB") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone())
                        .or_insert_with(|| PortInfo::bare(full));
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

/// Open a blocking serial port with a short read timeout for polling
pub fn open_port(name: &str, settings: &PortSettings) -> Result<Box<dyn SerialPort>, PortError> {
    let mut port = serialport::new(name, settings.baud_rate)
        .timeout(Duration::from_millis(100))
        .open()
        .map_err(|e| open_error(name, e))?;
    configure_port(port.as_mut(), settings).map_err(|e| open_error(name, e))?;
    Ok(port)
}

/// Open a serial port for the tokio driver
pub fn open_async(name: &str, settings: &PortSettings) -> Result<tokio_serial::SerialStream, PortError> {
    use tokio_serial::SerialPortBuilderExt;

    tokio_serial::new(name, settings.baud_rate)
        .data_bits(settings.data_bits())
        .parity(settings.parity())
        .stop_bits(settings.stop_bits())
        .flow_control(serialport::FlowControl::None)
        .open_native_async()
        .map_err(|e| open_error(name, e))
}

fn open_error(name: &str, e: serialport::Error) -> PortError {
    PortError::Open {
        port: name.to_string(),
        reason: e.to_string(),
    }
}

/// Apply line settings to an open port
pub fn configure_port(port: &mut dyn SerialPort, settings: &PortSettings) -> Result<(), serialport::Error> {
    port.set_baud_rate(settings.baud_rate)?;
    port.set_data_bits(settings.data_bits())?;
    port.set_parity(settings.parity())?;
    port.set_stop_bits(settings.stop_bits())?;
    port.set_flow_control(serialport::FlowControl::None)?;
    Ok(())
}
