//! Write queue with single-outstanding discipline
//!
//! At most one frame is in flight per connection. A frame leaves the queue
//! only through [`WriteQueue::write_next`], which arms the response timeout.
//! Once the reply to the in-flight frame has been consumed the queue either
//! becomes ready again or waits out the frame's settle delay first.

use bytes::Bytes;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A frame waiting for (or undergoing) transmission
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing<T> {
    /// Immutable wire bytes
    pub bytes: Bytes,
    /// Device-specific description of the reply this frame expects
    pub tag: T,
    /// Quiet time after the reply is consumed, before the next frame is written
    pub settle: Duration,
}

impl<T> Outgoing<T> {
    /// Frame with no settle delay
    pub fn new(bytes: impl Into<Bytes>, tag: T) -> Self {
        Self {
            bytes: bytes.into(),
            tag,
            settle: Duration::ZERO,
        }
    }

    /// Hold the queue for `settle` after this frame's reply
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Nothing on the wire, ready to write
    Idle,
    /// A frame was written and its reply is awaited until `deadline`
    InFlight { deadline: Instant },
    /// Waiting before the next frame may be written
    Settling { until: Instant },
}

/// Result of checking the queue's timers
#[derive(Debug, PartialEq)]
pub enum QueuePoll<T> {
    /// No timer expired
    Pending,
    /// The in-flight frame got no reply in time; the queue is now empty
    TimedOut(Outgoing<T>),
    /// A settle delay elapsed; the queue is ready to write again
    Settled,
}

/// FIFO of outbound frames for one connection
#[derive(Debug)]
pub struct WriteQueue<T> {
    pending: VecDeque<Outgoing<T>>,
    in_flight: Option<Outgoing<T>>,
    phase: Phase,
    timeout: Duration,
}

impl<T> WriteQueue<T> {
    /// Create an idle queue whose frames time out after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: VecDeque::new(),
            in_flight: None,
            phase: Phase::Idle,
            timeout,
        }
    }

    /// Response window armed on every write
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Append a frame to the tail.
    ///
    /// Returns true when the channel is idle, meaning the caller should
    /// follow up with [`write_next`](Self::write_next).
    pub fn enqueue(&mut self, frame: Outgoing<T>) -> bool {
        self.pending.push_back(frame);
        self.is_write_ready()
    }

    /// Place a batch ahead of everything already pending, keeping batch order.
    pub fn enqueue_front(&mut self, batch: impl IntoIterator<Item = Outgoing<T>>) -> bool {
        let batch: Vec<_> = batch.into_iter().collect();
        for frame in batch.into_iter().rev() {
            self.pending.push_front(frame);
        }
        self.is_write_ready()
    }

    /// True when no frame is in flight and no settle delay is running
    pub fn is_write_ready(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Pop the head of the queue and mark it in flight.
    ///
    /// Returns the frame the caller must now transmit. When the queue is
    /// empty the channel goes idle and the timer is disarmed. Must only be
    /// called once the previous in-flight frame has been completed or has
    /// timed out.
    pub fn write_next(&mut self, now: Instant) -> Option<&Outgoing<T>> {
        debug_assert!(self.in_flight.is_none(), "write_next with a frame in flight");
        match self.pending.pop_front() {
            Some(frame) => {
                self.phase = Phase::InFlight {
                    deadline: now + self.timeout,
                };
                self.in_flight = Some(frame);
                self.in_flight.as_ref()
            }
            None => {
                self.phase = Phase::Idle;
                None
            }
        }
    }

    /// The frame currently awaiting its reply
    pub fn in_flight(&self) -> Option<&Outgoing<T>> {
        self.in_flight.as_ref()
    }

    /// Mark the in-flight frame's reply as consumed.
    ///
    /// Starts the frame's settle delay if it has one; otherwise the queue is
    /// immediately ready for the next write.
    pub fn complete(&mut self, now: Instant) -> Option<Outgoing<T>> {
        let frame = self.in_flight.take()?;
        self.phase = if frame.settle.is_zero() {
            Phase::Idle
        } else {
            Phase::Settling {
                until: now + frame.settle,
            }
        };
        Some(frame)
    }

    /// Like [`complete`](Self::complete), but waits `settle` instead of the
    /// frame's own settle delay.
    pub fn complete_with_settle(&mut self, now: Instant, settle: Duration) -> Option<Outgoing<T>> {
        let mut frame = self.in_flight.take()?;
        frame.settle = settle;
        self.in_flight = Some(frame);
        self.complete(now)
    }

    /// Hold transmission until `until` (connection settle time).
    pub fn hold_until(&mut self, until: Instant) {
        if self.in_flight.is_none() {
            self.phase = Phase::Settling { until };
        }
    }

    /// Next instant at which [`poll`](Self::poll) has work to do
    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Idle => None,
            Phase::InFlight { deadline } => Some(deadline),
            Phase::Settling { until } => Some(until),
        }
    }

    /// Check the timeout and settle timers against `now`.
    pub fn poll(&mut self, now: Instant) -> QueuePoll<T> {
        match self.phase {
            Phase::InFlight { deadline } if now >= deadline => {
                self.phase = Phase::Idle;
                let frame = self.in_flight.take();
                self.pending.clear();
                match frame {
                    Some(frame) => QueuePoll::TimedOut(frame),
                    None => QueuePoll::Pending,
                }
            }
            Phase::Settling { until } if now >= until => {
                self.phase = Phase::Idle;
                QueuePoll::Settled
            }
            _ => QueuePoll::Pending,
        }
    }

    /// Drop every queued frame and go idle without transmitting
    pub fn clear(&mut self) {
        self.pending.clear();
        self.in_flight = None;
        self.phase = Phase::Idle;
    }

    /// Number of frames waiting behind the in-flight one
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Frames waiting behind the in-flight one, in write order
    pub fn pending(&self) -> impl Iterator<Item = &Outgoing<T>> {
        self.pending.iter()
    }
}
