//! JetDrive bring-up tool
//!
//! Connects to a JetDrive, runs the start-up handshake and optionally fires
//! the head for a while. Talks to the simulator with `--sim`.
//!
//! Usage:
//!   cargo run --example jetdrive_bringup -- [OPTIONS] [PORT]
//!
//! Options:
//!   --port PORT        Serial port (default: /dev/ttyUSB0)
//!   --baud RATE        Baud rate (default: 9600)
//!   --standard         Pre-Dream controller
//!   --frequency HZ     Continuous jetting frequency
//!   --fire MS          Jet continuously for MS milliseconds after bring-up
//!   --sim              Use the simulated JetDrive instead of a port
//!   --list             List serial ports and exit

use anyhow::Context;
use binderjet_core::jetdrive::{ControllerKind, DeviceProfile, JetDrive, LegacyJetDrive, Settings};
use binderjet_core::protocol::{list_ports, CommunicationChannel, DeviceEvent, PortSettings};
use binderjet_core::sim::{SimChannel, SimJetDrive};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut port_name = "/dev/ttyUSB0".to_string();
    let mut baud_rate = 9600u32;
    let mut kind = ControllerKind::Dream;
    let mut frequency_hz = None;
    let mut fire_ms = None;
    let mut simulate = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                if i < args.len() {
                    port_name = args[i].clone();
                }
            }
            "--baud" | "-b" => {
                i += 1;
                if i < args.len() {
                    baud_rate = args[i].parse().unwrap_or(9600);
                }
            }
            "--standard" => {
                kind = ControllerKind::Standard;
            }
            "--frequency" | "-f" => {
                i += 1;
                if i < args.len() {
                    frequency_hz = args[i].parse().ok();
                }
            }
            "--fire" => {
                i += 1;
                if i < args.len() {
                    fire_ms = args[i].parse().ok();
                }
            }
            "--sim" => {
                simulate = true;
            }
            "--list" | "-l" => {
                print_ports();
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            arg if !arg.starts_with('-') => {
                port_name = arg.to_string();
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
            }
        }
        i += 1;
    }

    let profile = DeviceProfile {
        kind,
        ..DeviceProfile::default()
    };
    let jet = JetDrive::new(profile, Settings::default())
        .with_port_settings(PortSettings::new(baud_rate));

    if simulate {
        let channel = SimChannel::new(SimJetDrive::new()).with_random_chunks(1, 8);
        run(LegacyJetDrive::new(channel, "SIM", jet), frequency_hz, fire_ms)
    } else {
        let legacy = LegacyJetDrive::open(&port_name, jet)
            .with_context(|| format!("opening {port_name}"))?;
        run(legacy, frequency_hz, fire_ms)
    }
}

fn run<C: CommunicationChannel>(
    mut jet: LegacyJetDrive<C>,
    frequency_hz: Option<u32>,
    fire_ms: Option<u64>,
) -> anyhow::Result<()> {
    let result = bring_up(&mut jet, frequency_hz, fire_ms);
    print_events(jet.take_events());
    jet.disconnect();
    print_events(jet.take_events());
    result
}

fn bring_up<C: CommunicationChannel>(
    jet: &mut LegacyJetDrive<C>,
    frequency_hz: Option<u32>,
    fire_ms: Option<u64>,
) -> anyhow::Result<()> {
    println!("Bringing up JetDrive...");
    jet.bring_up().context("bring-up failed")?;
    print_events(jet.take_events());
    println!(
        "✓ Initialized, firmware version {}",
        jet.controller().firmware_version()
    );

    if let Some(frequency_hz) = frequency_hz {
        jet.run(|jet, now| jet.set_continuous_mode_frequency(frequency_hz, now))
            .context("setting frequency")?;
        println!("✓ Frequency set to {frequency_hz} Hz");
    }

    if let Some(ms) = fire_ms {
        println!("Firing for {ms}ms...");
        jet.fire(Duration::from_millis(ms)).context("firing")?;
        println!("✓ Back to single jetting");
    }
    Ok(())
}

fn print_events(events: Vec<DeviceEvent>) {
    for event in events {
        match event {
            DeviceEvent::Response(text) => println!("  {text}"),
            DeviceEvent::Error(text) => eprintln!("  ❌ {text}"),
            DeviceEvent::Timeout(text) => eprintln!("  ⏱ {text}"),
        }
    }
}

fn print_ports() {
    let ports = list_ports();
    if ports.is_empty() {
        println!("No serial ports found");
        return;
    }
    for port in ports {
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => println!(
                "  {} [{:04x}:{:04x}] {}",
                port.name,
                vid,
                pid,
                port.product.as_deref().unwrap_or("")
            ),
            _ => println!("  {}", port.name),
        }
    }
}

fn print_help() {
    println!("JetDrive bring-up tool");
    println!();
    println!("Usage: jetdrive_bringup [OPTIONS] [PORT]");
    println!();
    println!("Options:");
    println!("  --port, -p PORT      Serial port (default: /dev/ttyUSB0)");
    println!("  --baud, -b RATE      Baud rate (default: 9600)");
    println!("  --standard           Pre-Dream controller");
    println!("  --frequency, -f HZ   Continuous jetting frequency");
    println!("  --fire MS            Jet continuously for MS milliseconds");
    println!("  --sim                Use the simulated JetDrive");
    println!("  --list, -l           List serial ports and exit");
    println!("  --help, -h           Show this help");
}
