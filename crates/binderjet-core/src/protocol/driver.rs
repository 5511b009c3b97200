//! Event-loop driver
//!
//! Runs one [`SerialDevice`] on a tokio task. The task is the only owner of
//! the controller: port readiness, the controller's timers and requests from
//! other threads are multiplexed with `select!` and applied one at a time,
//! so frames are never written out of turn.

use std::io;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{DeviceEvent, PortError, SerialDevice};

/// Ports whose OS receive buffer can be discarded
pub trait PurgeInput {
    fn purge_input(&mut self) -> io::Result<()>;
}

impl PurgeInput for tokio_serial::SerialStream {
    fn purge_input(&mut self) -> io::Result<()> {
        use serialport::SerialPort;
        self.clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::other)
    }
}

impl PurgeInput for tokio::io::DuplexStream {
    fn purge_input(&mut self) -> io::Result<()> {
        // In-memory pipes have nothing buffered beyond what the loop reads
        Ok(())
    }
}

type Request<D> = Box<dyn FnOnce(&mut D, Instant) + Send>;

/// The driver task has stopped (the device disconnected)
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("device driver has stopped")]
pub struct DriverStopped;

/// Handle for issuing requests to a running device from any thread
pub struct DeviceHandle<D> {
    requests: mpsc::UnboundedSender<Request<D>>,
}

impl<D> Clone for DeviceHandle<D> {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
        }
    }
}

impl<D: SerialDevice + 'static> DeviceHandle<D> {
    /// Run `f` against the device on the driver task
    pub fn call(&self, f: impl FnOnce(&mut D, Instant) + Send + 'static) -> Result<(), DriverStopped> {
        self.requests.send(Box::new(f)).map_err(|_| DriverStopped)
    }

    /// Run `f` against the device and wait for its result
    pub async fn query<R: Send + 'static>(
        &self,
        f: impl FnOnce(&mut D, Instant) -> R + Send + 'static,
    ) -> Result<R, DriverStopped> {
        let (tx, rx) = oneshot::channel();
        self.call(move |device, now| {
            let _ = tx.send(f(device, now));
        })?;
        rx.await.map_err(|_| DriverStopped)
    }

    /// Ask the device to disconnect; the driver task ends afterwards
    pub fn disconnect(&self) -> Result<(), DriverStopped> {
        self.call(|device, _| device.disconnect())
    }

    /// False once the driver task has ended
    pub fn is_running(&self) -> bool {
        !self.requests.is_closed()
    }
}

/// A device running on its own task
pub struct RunningDevice<D> {
    pub handle: DeviceHandle<D>,
    pub events: mpsc::UnboundedReceiver<DeviceEvent>,
    /// Resolves to the controller once it disconnects, ready to be
    /// connected again on a fresh port
    pub task: JoinHandle<D>,
}

/// Connect `device` over an already opened `port` and drive it until it
/// disconnects.
pub fn spawn<D, S>(device: D, port_name: impl Into<String>, port: S) -> RunningDevice<D>
where
    D: SerialDevice + 'static,
    S: AsyncRead + AsyncWrite + PurgeInput + Unpin + Send + 'static,
{
    let (requests_tx, requests_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(device, port_name.into(), port, requests_rx, events_tx));
    RunningDevice {
        handle: DeviceHandle {
            requests: requests_tx,
        },
        events: events_rx,
        task,
    }
}

/// Open `port_name` as a native serial port and spawn the driver on it.
///
/// An open failure is reported through the device's own error signal and
/// the controller is handed back unchanged.
pub fn open_and_spawn<D>(mut device: D, port_name: &str) -> Result<RunningDevice<D>, (D, PortError)>
where
    D: SerialDevice + 'static,
{
    match super::port::open_async(port_name, &device.port_settings()) {
        Ok(stream) => Ok(spawn(device, port_name, stream)),
        Err(e) => {
            device.connect_failed(&e);
            Err((device, e))
        }
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn run<D, S>(
    mut device: D,
    port_name: String,
    mut port: S,
    mut requests: mpsc::UnboundedReceiver<Request<D>>,
    events: mpsc::UnboundedSender<DeviceEvent>,
) -> D
where
    D: SerialDevice,
    S: AsyncRead + AsyncWrite + PurgeInput + Unpin,
{
    device.connect(&port_name, now());
    flush(&mut device, &mut port, &port_name, &events).await;

    let mut buf = [0u8; 512];
    while device.is_connected() {
        let deadline = device.next_deadline();
        let timer = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            read = port.read(&mut buf) => match read {
                Ok(0) => device.handle_port_error(PortError::Disconnected {
                    port: port_name.clone(),
                }),
                Ok(n) => device.handle_bytes(&buf[..n], now()),
                Err(e) => device.handle_port_error(PortError::Read {
                    port: port_name.clone(),
                    reason: e.to_string(),
                }),
            },
            _ = timer => device.handle_tick(now()),
            request = requests.recv() => match request {
                Some(f) => f(&mut device, now()),
                // Every handle dropped; nobody can talk to the device anymore
                None => device.disconnect(),
            },
        }

        flush(&mut device, &mut port, &port_name, &events).await;
    }

    tracing::debug!(device = %device.name(), "driver stopped");
    device
}

async fn flush<D, S>(
    device: &mut D,
    port: &mut S,
    port_name: &str,
    events: &mpsc::UnboundedSender<DeviceEvent>,
) where
    D: SerialDevice,
    S: AsyncWrite + PurgeInput + Unpin,
{
    if device.take_purge_request() {
        if let Err(e) = port.purge_input() {
            tracing::warn!(device = %device.name(), "failed to purge receive buffer: {e}");
        }
    }

    while let Some(out) = device.take_outbound() {
        let written = match port.write_all(&out).await {
            Ok(()) => port.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            device.handle_port_error(PortError::Write {
                port: port_name.to_string(),
                reason: e.to_string(),
            });
            break;
        }
    }

    for event in device.drain_events() {
        // The receiver may be gone; the device keeps running regardless
        let _ = events.send(event);
    }
}
