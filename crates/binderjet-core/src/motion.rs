//! Motion controller print queue
//!
//! A print job is a batch of [`MotionCommand`]s executed strictly in order on
//! a worker thread. The motion controller itself sits behind the
//! [`MotionController`] trait; the queue only knows how to send it commands,
//! poll predicates and download line data.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;

/// Interval between predicate polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Longest wait for the controller to consume the previous print line
pub const PRINT_LINE_TIMEOUT: Duration = Duration::from_secs(500);

/// Array the controller reads print line data from
pub const PRINT_LINE_ARRAY: &str = "Data";

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Failures reported by a motion controller transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MotionError {
    #[error("Motion controller timed out")]
    Timeout,

    #[error("Motion controller rejected the command (?)")]
    BadResponseQuestionMark,

    #[error("Could not open motion controller: {0}")]
    Open(String),

    #[error("Motion controller read failed: {0}")]
    Read(String),

    #[error("Motion controller write failed: {0}")]
    Write(String),

    #[error("Polling the motion controller failed")]
    PollingFailed,

    #[error("Motion controller connection not established")]
    ConnectionNotEstablished,

    #[error("{0}")]
    Other(String),
}

/// Command transport to a motion controller
pub trait MotionController: Send {
    /// Address the controller is opened with
    fn address(&self) -> &str;

    fn open(&mut self) -> Result<(), MotionError>;

    fn is_open(&self) -> bool;

    /// Send one command and return its trimmed response
    fn command(&mut self, command: &str) -> Result<String, MotionError>;

    /// Send one command and read its response as an integer. Anything that
    /// does not start with a number reads as 0.
    fn command_int(&mut self, command: &str) -> Result<i32, MotionError> {
        Ok(leading_int(&self.command(command)?))
    }

    /// Download comma-separated `data` into the controller array `name`
    fn array_download(&mut self, name: &str, data: &str) -> Result<(), MotionError>;

    /// Extra detail about the last failure, if the controller has any
    fn error_context(&mut self) -> Option<String> {
        None
    }
}

/// One step of a print job
#[derive(Debug, Clone, PartialEq)]
pub enum MotionCommand {
    /// Connect to the controller
    Open,
    /// Raw controller command
    Command(String),
    Sleep(Duration),
    /// Wait until every listed axis has stopped moving
    MotionComplete(String),
    /// Wait until the controller program has finished
    ProgramComplete,
    /// Wait for the controller to consume the previous line, then download
    /// the next one
    PrintLineSet(String),
    /// Pass a message through to the listener
    Message(String),
}

/// Signals raised by the print queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotionEvent {
    Response(String),
    Error(String),
    /// The controller was opened by a [`MotionCommand::Open`] step
    Connected,
    /// The queue ran dry, either normally or after a stop
    Ended,
}

/// Integer prefix of `text` the way the controller's own tools read it:
/// leading whitespace skipped, optional sign, digits up to the first
/// non-digit. A fractional part is dropped.
pub fn leading_int(text: &str) -> i32 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| (acc * 10 + i64::from(d - b'0')).min(i64::from(i32::MAX)));
    let value = if negative { -value } else { value };
    value as i32
}

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<MotionCommand>,
    stop_pending: bool,
    quit: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking command cannot leave the queue half-updated
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Sequential executor for print jobs
pub struct PrintQueue {
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    echo_commands: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<MotionEvent>,
    worker: Option<thread::JoinHandle<()>>,
}

impl PrintQueue {
    /// Start the worker thread for `controller`
    pub fn start<C>(controller: C) -> (Self, mpsc::UnboundedReceiver<MotionEvent>)
    where
        C: MotionController + 'static,
    {
        Self::start_with_poll_interval(controller, DEFAULT_POLL_INTERVAL)
    }

    /// Like [`start`](Self::start), polling predicates every `poll_interval`
    pub fn start_with_poll_interval<C>(
        controller: C,
        poll_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<MotionEvent>)
    where
        C: MotionController + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        let running = Arc::new(AtomicBool::new(true));
        let echo_commands = Arc::new(AtomicBool::new(false));

        let mut worker = Worker {
            controller,
            shared: shared.clone(),
            running: running.clone(),
            echo_commands: echo_commands.clone(),
            poll_interval,
            events: tx.clone(),
        };
        let handle = thread::spawn(move || worker.run());

        let queue = Self {
            shared,
            running,
            echo_commands,
            events: tx,
            worker: Some(handle),
        };
        (queue, rx)
    }

    /// Queue a batch. Rejected with an error signal while the previous batch
    /// is still executing or being stopped.
    pub fn execute(&self, batch: impl IntoIterator<Item = MotionCommand>) -> bool {
        let mut state = self.shared.lock();
        if !state.queue.is_empty() || state.stop_pending {
            drop(state);
            let text = "command queue was not empty when new commands were attempted";
            tracing::warn!(device = "Motion Controller", "{text}");
            let _ = self.events.send(MotionEvent::Error(text.to_string()));
            return false;
        }
        state.queue.extend(batch);
        self.running.store(true, Ordering::SeqCst);
        self.shared.wake.notify_one();
        true
    }

    /// Abandon the current batch and stop the motors
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        self.running.store(false, Ordering::SeqCst);
        state.stop_pending = true;
        self.shared.wake.notify_one();
    }

    /// Echo each command as a response before executing it
    pub fn set_echo_commands(&self, echo: bool) {
        self.echo_commands.store(echo, Ordering::SeqCst);
    }

    /// Commands not yet finished, the executing one included
    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// True from an accepted batch until it ends or is stopped
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for PrintQueue {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.quit = true;
            self.running.store(false, Ordering::SeqCst);
            self.shared.wake.notify_one();
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

enum Step {
    Stop,
    Run(MotionCommand),
}

struct Worker<C> {
    controller: C,
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    echo_commands: Arc<AtomicBool>,
    poll_interval: Duration,
    events: mpsc::UnboundedSender<MotionEvent>,
}

impl<C: MotionController> Worker<C> {
    fn run(&mut self) {
        while let Some(step) = self.next_step() {
            match step {
                Step::Stop => self.handle_stop(),
                Step::Run(command) => {
                    self.execute(&command);
                    let drained = {
                        let mut state = self.shared.lock();
                        state.queue.pop_front();
                        state.queue.is_empty() && !state.stop_pending
                    };
                    if drained {
                        if self.echo_commands.load(Ordering::SeqCst) {
                            self.response("Finished Queue");
                        }
                        self.emit(MotionEvent::Ended);
                    }
                }
            }
        }
        tracing::debug!("print queue worker exiting");
    }

    fn next_step(&self) -> Option<Step> {
        let mut state = self.shared.lock();
        loop {
            if state.quit {
                return None;
            }
            if state.stop_pending {
                state.stop_pending = false;
                return Some(Step::Stop);
            }
            if let Some(command) = state.queue.front() {
                return Some(Step::Run(command.clone()));
            }
            state = self
                .shared
                .wake
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    fn handle_stop(&mut self) {
        self.shared.lock().queue.clear();
        self.response("Stream to Motion Controller Stopped");
        if self.controller.is_open() {
            match self.controller.command("ST") {
                Ok(_) => self.response("GCmd: ST"),
                Err(e) => self.report("ST", &e),
            }
        }
        self.emit(MotionEvent::Ended);
    }

    fn execute(&mut self, command: &MotionCommand) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        tracing::debug!(?command, "motion step");

        match command {
            MotionCommand::Open => self.open(),
            MotionCommand::Message(text) => self.response(text.clone()),
            MotionCommand::Sleep(duration) => self.pause(*duration),
            _ if !self.controller.is_open() => {
                tracing::warn!(?command, "motion controller not connected, step skipped");
            }
            MotionCommand::Command(text) => {
                self.echo(text);
                if let Err(e) = self.controller.command(text) {
                    self.report(text, &e);
                }
            }
            MotionCommand::MotionComplete(axes) => {
                for axis in axes.chars() {
                    let predicate = format!("_BG{axis}=0");
                    if let Err(e) = self.wait_for(&predicate) {
                        self.report(&predicate, &e);
                        break;
                    }
                }
            }
            MotionCommand::ProgramComplete => {
                if let Err(e) = self.wait_for("_XQ=-1") {
                    self.report("_XQ=-1", &e);
                }
            }
            MotionCommand::PrintLineSet(data) => {
                self.echo(data);
                if let Err(e) = self.print_line_set(data) {
                    self.report(PRINT_LINE_ARRAY, &e);
                }
            }
        }
    }

    fn open(&mut self) {
        let address = self.controller.address().to_string();
        self.response(format!("Attempting to connect to {address}"));
        match self.controller.open() {
            Ok(()) => {
                self.response("Connected to motion controller");
                self.emit(MotionEvent::Connected);
            }
            Err(e) => {
                self.report(&address, &e);
                self.response("Could not connect to motion controller!");
                self.request_stop();
            }
        }
    }

    fn request_stop(&self) {
        let mut state = self.shared.lock();
        self.running.store(false, Ordering::SeqCst);
        state.stop_pending = true;
    }

    /// Poll `predicate` until the controller reports it true. Returns early,
    /// without error, once the queue is stopped.
    fn wait_for(&mut self, predicate: &str) -> Result<(), MotionError> {
        let query = format!("MG ({predicate})");
        while self.running.load(Ordering::SeqCst) {
            if self.controller.command_int(&query)? != 0 {
                return Ok(());
            }
            thread::sleep(self.poll_interval);
        }
        Ok(())
    }

    fn print_line_set(&mut self, data: &str) -> Result<(), MotionError> {
        let start = Instant::now();
        loop {
            let value = self.controller.command_int("Data[0]=?")?;
            if value == 0
                || !self.running.load(Ordering::SeqCst)
                || start.elapsed() >= PRINT_LINE_TIMEOUT
            {
                break;
            }
            thread::sleep(self.poll_interval);
        }
        if self.running.load(Ordering::SeqCst) {
            self.controller.array_download(PRINT_LINE_ARRAY, data)?;
        }
        Ok(())
    }

    fn pause(&self, duration: Duration) {
        let end = Instant::now() + duration;
        while self.running.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= end {
                break;
            }
            thread::sleep((end - now).min(SLEEP_SLICE));
        }
    }

    fn report(&mut self, what: &str, error: &MotionError) {
        self.emit(MotionEvent::Error(format!("{what}: {error}")));
        if let Some(context) = self.controller.error_context() {
            self.response(context);
        }
        if *error == MotionError::BadResponseQuestionMark {
            if let Ok(code) = self.controller.command("TC1") {
                self.response(code);
            }
            self.response(format!("Above is the error for: {what}"));
        }
    }

    fn echo(&self, text: &str) {
        if self.echo_commands.load(Ordering::SeqCst) {
            self.response(text.to_string());
        }
    }

    fn response(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::info!(device = "Motion Controller", "{text}");
        self.emit(MotionEvent::Response(text));
    }

    fn emit(&self, event: MotionEvent) {
        if let MotionEvent::Error(text) = &event {
            tracing::warn!(device = "Motion Controller", "{text}");
        }
        // Nobody listening is not an error for the queue
        let _ = self.events.send(event);
    }
}
