use std::time::Duration;

use super::clock::{sleep_sliced, Clock};
use crate::shared::constants::PACING_SLICE_MS;

/// Output cadence regulator for the render loop.
///
/// Keeps consecutive forwards at least one frame interval apart regardless of
/// how bursty the queue delivers. With no known interval it never sleeps. The
/// wait is sliced so a stop request ends it within one slice.
pub struct FramePacer {
    frame_interval: Option<Duration>,
    last_forward: Option<Duration>,
    frames_paced: u64,
    total_sleep: Duration,
}

impl FramePacer {
    pub fn new(frame_interval: Option<Duration>) -> Self {
        Self {
            frame_interval,
            last_forward: None,
            frames_paced: 0,
            total_sleep: Duration::ZERO,
        }
    }

    /// Sleeps out the rest of the current frame interval, or until `stopped`
    /// reports true, then marks the forward time. Returns how long it slept.
    pub fn wait_for_slot(&mut self, clock: &dyn Clock, stopped: impl Fn() -> bool) -> Duration {
        let mut slept = Duration::ZERO;
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_forward) {
            let elapsed = clock.now().saturating_sub(last);
            if elapsed < interval {
                let slice = Duration::from_millis(PACING_SLICE_MS);
                slept = sleep_sliced(clock, interval - elapsed, slice, stopped);
                self.total_sleep += slept;
            }
        }
        self.last_forward = Some(clock.now());
        self.frames_paced += 1;
        slept
    }

    pub fn frames_paced(&self) -> u64 {
        self.frames_paced
    }

    pub fn total_sleep(&self) -> Duration {
        self.total_sleep
    }
}
