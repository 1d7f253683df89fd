use std::sync::Arc;
use std::time::Duration;

use super::frame_buffer::{FrameQueue, PushOutcome};
use super::timing::StreamTiming;
use crate::config::PipelineConfig;
use crate::decoder::{Frame, FrameSource};
use crate::events::{EventBus, PlayerEvent};
use crate::shared::constants::PACING_SLICE_MS;
use crate::sync::{self, SharedClock};
use crate::utils::logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerExit {
    EndOfStream,
    DecodeError,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    pub decoded: u64,
    pub pushed: u64,
    pub dropped: u64,
}

/// Load-shedding knobs, resolved from [`PipelineConfig`].
#[derive(Debug, Clone, Copy)]
struct DropPolicy {
    threshold: f64,
    catch_up_intervals: u32,
    max_pacing_sleep: Duration,
}

/// Decode loop: pulls frames, paces them by PTS and feeds the queue.
pub struct DecodeProducer {
    queue: Arc<FrameQueue>,
    timing: StreamTiming,
    clock: SharedClock,
    policy: DropPolicy,
    /// Presentation time (µs) of the previous frame with a known PTS.
    last_presentation_us: Option<i64>,
    /// Clock time and presentation time of the first frame of the run.
    anchor: Option<(Duration, Option<i64>)>,
    frame_index: u64,
    stats: ProducerStats,
}

impl DecodeProducer {
    pub fn new(queue: Arc<FrameQueue>, timing: StreamTiming, clock: SharedClock, config: &PipelineConfig) -> Self {
        Self {
            queue,
            timing,
            clock,
            policy: DropPolicy {
                threshold: config.drop_threshold,
                catch_up_intervals: config.catch_up_intervals,
                max_pacing_sleep: config.max_pacing_sleep(),
            },
            last_presentation_us: None,
            anchor: None,
            frame_index: 0,
            stats: ProducerStats::default(),
        }
    }

    pub fn stats(&self) -> ProducerStats {
        self.stats
    }

    /// Runs until end of stream, a decode failure, or shutdown.
    pub fn run(&mut self, source: &mut dyn FrameSource, events: &EventBus) -> ProducerExit {
        logger::debug("Decode loop started");
        let exit = loop {
            if self.queue.is_stopping() {
                break ProducerExit::Stopped;
            }
            match source.next_frame() {
                Ok(Some(frame)) => {
                    self.stats.decoded += 1;
                    self.handle_frame(frame);
                }
                Ok(None) => {
                    logger::debug("Decoder reached end of stream");
                    break ProducerExit::EndOfStream;
                }
                Err(e) => {
                    logger::error(&format!("Decoding error, ending stream: {}", e));
                    break ProducerExit::DecodeError;
                }
            }
        };

        if exit != ProducerExit::Stopped {
            events.emit(PlayerEvent::EndOfStream);
        }
        logger::debug(&format!(
            "Decode loop exiting ({:?}). Decoded: {}, queued: {}, dropped: {}",
            exit, self.stats.decoded, self.stats.pushed, self.stats.dropped
        ));
        exit
    }

    /// Paces one decoded frame, then queues or sheds it.
    pub fn handle_frame(&mut self, frame: Frame) -> PushOutcome {
        let presentation_us = self.timing.presentation_micros(frame.pts);

        if let (Some(now_us), Some(prev_us)) = (presentation_us, self.last_presentation_us) {
            let gap = Duration::from_micros(now_us.saturating_sub(prev_us).max(0) as u64);
            self.pace(gap.min(self.policy.max_pacing_sleep));
        }
        if presentation_us.is_some() {
            self.last_presentation_us = presentation_us;
        }

        let outcome = if self.is_behind(presentation_us) {
            PushOutcome::Dropped
        } else {
            self.queue.push(frame)
        };

        match outcome {
            PushOutcome::Enqueued => self.stats.pushed += 1,
            PushOutcome::Dropped => {
                self.stats.dropped += 1;
                if !self.queue.is_stopping() {
                    logger::debug(&format!(
                        "Dropped late frame {} (queue {}/{})",
                        self.frame_index,
                        self.queue.len(),
                        self.queue.capacity()
                    ));
                }
            }
        }
        self.frame_index += 1;
        outcome
    }

    /// Sleeps `gap` in slices so a stop request cuts the wait short.
    fn pace(&self, gap: Duration) {
        let queue = &self.queue;
        sync::sleep_sliced(
            self.clock.as_ref(),
            gap,
            Duration::from_millis(PACING_SLICE_MS),
            || queue.is_stopping(),
        );
    }

    /// True when the queue is nearly full and this frame is already past its
    /// catch-up deadline.
    fn is_behind(&mut self, presentation_us: Option<i64>) -> bool {
        let now = self.clock.now();
        let (anchor_at, anchor_us) = *self.anchor.get_or_insert((now, presentation_us));

        let Some(interval) = self.timing.frame_interval else {
            return false;
        };

        let offset = match (presentation_us, anchor_us) {
            (Some(us), Some(first)) => Duration::from_micros(us.saturating_sub(first).max(0) as u64),
            _ => interval.saturating_mul(self.frame_index.min(u32::MAX as u64) as u32),
        };
        let deadline = anchor_at
            .saturating_add(offset)
            .saturating_add(interval.saturating_mul(self.policy.catch_up_intervals));

        let len = self.queue.len() as f64;
        let nearly_full = len >= self.policy.threshold * self.queue.capacity() as f64;
        nearly_full && now > deadline
    }
}
