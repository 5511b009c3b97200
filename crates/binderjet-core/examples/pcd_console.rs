//! PCD pressure controller console
//!
//! Runs a PCD on the event-loop driver and forwards commands typed on stdin.
//!
//! Usage:
//!   cargo run --example pcd_console -- [PORT | --sim]
//!
//! Commands:
//!   set PSIG   Change the set point
//!   purge      Start purging
//!   stop       Stop purging
//!   id         Query the unit id
//!   serial     Take the set point from the serial line
//!   analog     Take the set point from the analog input
//!   quit       Disconnect and exit

use anyhow::anyhow;
use binderjet_core::config::PrinterConfig;
use binderjet_core::pcd::Pcd;
use binderjet_core::protocol::driver::{open_and_spawn, spawn};
use binderjet_core::protocol::{DeviceEvent, DeviceHandle, RunningDevice};
use binderjet_core::sim::{serve, SimPcd};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match PrinterConfig::default_path() {
        Some(path) => PrinterConfig::load_or_default(&path)?,
        None => PrinterConfig::default(),
    };

    let arg = std::env::args().nth(1);
    let pcd = config.pressure.controller();
    let running = match arg.as_deref() {
        Some("--sim") => {
            let (host, device) = tokio::io::duplex(64);
            tokio::spawn(serve(SimPcd::new(), device, None));
            spawn(pcd, "SIM", host)
        }
        port => {
            let port = port
                .map(str::to_string)
                .or_else(|| config.pressure.port.clone())
                .ok_or_else(|| anyhow!("no port given and none configured"))?;
            open_and_spawn(pcd, &port).map_err(|(_, e)| e)?
        }
    };

    let RunningDevice {
        handle,
        mut events,
        task,
    } = running;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                DeviceEvent::Response(text) => println!("{text}"),
                DeviceEvent::Error(text) => eprintln!("❌ {text}"),
                DeviceEvent::Timeout(text) => eprintln!("⏱ {text}"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !dispatch(&handle, line.trim())? {
            break;
        }
    }

    let _ = handle.disconnect();
    task.await?;
    Ok(())
}

/// Forward one console command; false once the console should exit
fn dispatch(handle: &DeviceHandle<Pcd>, line: &str) -> anyhow::Result<bool> {
    let mut words = line.split_whitespace();
    let request: Box<dyn FnOnce(&mut Pcd, std::time::Instant) -> bool + Send> = match words.next() {
        Some("set") => {
            let Some(psig) = words.next().and_then(|w| w.parse::<f64>().ok()) else {
                eprintln!("usage: set PSIG");
                return Ok(true);
            };
            Box::new(move |pcd, now| pcd.update_set_point(psig, now))
        }
        Some("purge") => Box::new(|pcd, now| pcd.purge(now)),
        Some("stop") => Box::new(|pcd, now| pcd.stop_purge(now)),
        Some("id") => Box::new(|pcd, now| pcd.query_unit_id(now)),
        Some("serial") => Box::new(|pcd, now| pcd.use_soft_serial(now)),
        Some("analog") => Box::new(|pcd, now| pcd.use_analog(now)),
        Some("quit") | Some("exit") => return Ok(false),
        None => return Ok(true),
        Some(other) => {
            eprintln!("Unknown command: {other}");
            return Ok(true);
        }
    };
    if handle
        .call(move |pcd, now| {
            request(pcd, now);
        })
        .is_err()
    {
        eprintln!("Pressure controller disconnected");
        return Ok(false);
    }
    Ok(true)
}
