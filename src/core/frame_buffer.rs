use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::decoder::Frame;
use crate::shared::constants::{BUFFER_SECONDS, MAX_CAPACITY, MIN_CAPACITY};

/// Queue depth for a stream: `frame_rate * buffer_seconds` frames, clamped.
/// A zero, negative or non-finite rate falls back to the minimum.
pub fn compute_capacity_with(frame_rate: f64, buffer_seconds: f64, min: usize, max: usize) -> usize {
    let scaled = frame_rate * buffer_seconds;
    if !scaled.is_finite() || scaled <= 0.0 {
        return min;
    }
    (scaled as usize).clamp(min, max)
}

/// [`compute_capacity_with`] using the stock two-second, 5..=60 frame window.
pub fn compute_capacity(frame_rate: f64) -> usize {
    compute_capacity_with(frame_rate, BUFFER_SECONDS, MIN_CAPACITY, MAX_CAPACITY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// Not queued; the frame has been released.
    Dropped,
}

/// Bounded FIFO of decoded frames shared by the decode and render loops.
///
/// One mutex guards the frames and one condvar carries every wake-up: frame
/// pushed, frame popped, and shutdown. The stop flag is flipped while holding
/// the lock so a waiter can never miss it between its check and its wait.
pub struct FrameQueue {
    frames: Mutex<VecDeque<Frame>>,
    changed: Condvar,
    capacity: usize,
    stopping: AtomicBool,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            changed: Condvar::new(),
            capacity,
            stopping: AtomicBool::new(false),
        }
    }

    /// Blocks until there is room or the queue is stopping. A stopping queue
    /// refuses the frame.
    pub fn push(&self, frame: Frame) -> PushOutcome {
        let mut frames = self.frames.lock();
        loop {
            if self.is_stopping() {
                return PushOutcome::Dropped;
            }
            if frames.len() < self.capacity {
                break;
            }
            self.changed.wait(&mut frames);
        }

        frames.push_back(frame);
        self.changed.notify_all();
        PushOutcome::Enqueued
    }

    /// Non-blocking push; a full or stopping queue drops the frame.
    pub fn try_push(&self, frame: Frame) -> PushOutcome {
        let mut frames = self.frames.lock();
        if self.is_stopping() || frames.len() >= self.capacity {
            return PushOutcome::Dropped;
        }
        frames.push_back(frame);
        self.changed.notify_all();
        PushOutcome::Enqueued
    }

    /// Takes the oldest frame, waiting up to `timeout` for one to arrive.
    /// Returns `None` on timeout, or early once the queue is stopping and empty.
    pub fn pop(&self, timeout: Duration) -> Option<Frame> {
        // A timeout past what `Instant` can represent waits without a deadline.
        let deadline = Instant::now().checked_add(timeout);
        let mut frames = self.frames.lock();
        loop {
            if let Some(frame) = frames.pop_front() {
                self.changed.notify_all();
                return Some(frame);
            }
            if self.is_stopping() {
                return None;
            }
            let Some(deadline) = deadline else {
                self.changed.wait(&mut frames);
                continue;
            };
            if self.changed.wait_until(&mut frames, deadline).timed_out() {
                // One last look: a push may have landed as the wait expired.
                let frame = frames.pop_front();
                if frame.is_some() {
                    self.changed.notify_all();
                }
                return frame;
            }
        }
    }

    /// Releases every queued frame. Returns how many were discarded.
    pub fn drain(&self) -> usize {
        let mut frames = self.frames.lock();
        let drained = frames.len();
        frames.clear();
        self.changed.notify_all();
        drained
    }

    /// Sets the stop flag and wakes every waiter.
    pub fn begin_shutdown(&self) {
        let _frames = self.frames.lock();
        self.stopping.store(true, Ordering::SeqCst);
        self.changed.notify_all();
    }

    /// Clears the stop flag so the queue accepts frames again.
    pub fn reopen(&self) {
        let _frames = self.frames.lock();
        self.stopping.store(false, Ordering::SeqCst);
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current fill level, 0.0 to 1.0.
    pub fn occupancy(&self) -> f64 {
        self.len() as f64 / self.capacity as f64
    }
}
