use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use super::frame_buffer::FrameQueue;
use super::timing::StreamTiming;
use crate::config::PipelineConfig;
use crate::decoder::Frame;
use crate::error::SinkError;
use crate::events::{EventBus, PlayerEvent};
use crate::sink::SharedSink;
use crate::sync::{FramePacer, PlaybackClock, SharedClock};
use crate::utils::logger;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub rendered: u64,
    pub delivery_failures: u64,
}

/// What one [`RenderConsumer::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Delivered,
    DeliveryFailed,
    Idle,
    Stopped,
}

/// Render loop: takes frames off the queue at the stream's cadence and hands
/// them to the sink.
pub struct RenderConsumer {
    queue: Arc<FrameQueue>,
    timing: StreamTiming,
    clock: SharedClock,
    playback: Arc<Mutex<PlaybackClock>>,
    sink: SharedSink,
    events: EventBus,
    pacer: FramePacer,
    pop_timeout: Duration,
    progress_interval: Duration,
    stats: ConsumerStats,
}

impl RenderConsumer {
    pub fn new(
        queue: Arc<FrameQueue>,
        timing: StreamTiming,
        clock: SharedClock,
        playback: Arc<Mutex<PlaybackClock>>,
        sink: SharedSink,
        events: EventBus,
        config: &PipelineConfig,
    ) -> Self {
        let pop_timeout = timing
            .frame_interval
            .unwrap_or_else(|| config.fallback_frame_interval());
        Self {
            queue,
            timing,
            clock,
            playback,
            sink,
            events,
            pacer: FramePacer::new(timing.frame_interval),
            pop_timeout,
            progress_interval: config.progress_interval(),
            stats: ConsumerStats::default(),
        }
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }

    /// Runs until the queue is stopped, then releases the sink binding.
    /// Frames still queued at that point are left for the controller to drain.
    pub fn run(&mut self) -> ConsumerStats {
        logger::debug("Render loop started");
        while self.step() != StepResult::Stopped {}
        self.sink.lock().detach();
        logger::debug(&format!(
            "Render loop exiting. Rendered: {}, delivery failures: {}, paced: {} frames / {:?}",
            self.stats.rendered,
            self.stats.delivery_failures,
            self.pacer.frames_paced(),
            self.pacer.total_sleep()
        ));
        self.stats
    }

    /// One iteration: bounded wait for a frame, pace, forward.
    pub fn step(&mut self) -> StepResult {
        if self.queue.is_stopping() {
            return StepResult::Stopped;
        }
        let Some(frame) = self.queue.pop(self.pop_timeout) else {
            return StepResult::Idle;
        };
        if self.queue.is_stopping() {
            return StepResult::Stopped;
        }

        self.track_position(&frame);
        let queue = &self.queue;
        self.pacer.wait_for_slot(self.clock.as_ref(), || queue.is_stopping());
        if queue.is_stopping() {
            return StepResult::Stopped;
        }

        match self.forward(&frame) {
            Ok(()) => {
                self.stats.rendered += 1;
                StepResult::Delivered
            }
            Err(e) => {
                self.stats.delivery_failures += 1;
                logger::error(&format!("Frame delivery failed: {}", e));
                self.events.emit(PlayerEvent::SinkError(e.to_string()));
                StepResult::DeliveryFailed
            }
        }
        // `frame` is released here whatever the sink did.
    }

    fn track_position(&self, frame: &Frame) {
        let Some(us) = self.timing.presentation_micros(frame.pts) else {
            return;
        };
        let mut playback = self.playback.lock();
        playback.update(us);
        if playback.should_report(self.progress_interval) {
            if let Some(position) = playback.current_time {
                logger::info(&format!(
                    "Playback position {:.2}s (queue {}/{})",
                    position.as_secs_f64(),
                    self.queue.len(),
                    self.queue.capacity()
                ));
                self.events.emit(PlayerEvent::Progress {
                    position,
                    duration: self.timing.duration,
                });
            }
        }
    }

    /// Hands the frame to the sink. Sink panics are folded into errors.
    fn forward(&self, frame: &Frame) -> Result<(), SinkError> {
        let sink = &self.sink;
        match panic::catch_unwind(AssertUnwindSafe(|| sink.lock().deliver(frame))) {
            Ok(result) => result,
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(SinkError::Panicked(msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::timing::TimeBase;
    use crate::decoder::PixelFormat;
    use crate::sink::{self, FrameSink, StatsSink};
    use crate::sync::{Clock, ManualClock, SystemClock};
    use std::thread;

    struct RecordingSink {
        clock: Arc<ManualClock>,
        times: Arc<Mutex<Vec<Duration>>>,
    }

    impl FrameSink for RecordingSink {
        fn deliver(&mut self, _frame: &Frame) -> Result<(), SinkError> {
            self.times.lock().push(self.clock.now());
            Ok(())
        }
    }

    /// Fails on odd-numbered frames, panics on the fourth.
    struct FlakySink {
        calls: u32,
    }

    impl FrameSink for FlakySink {
        fn deliver(&mut self, _frame: &Frame) -> Result<(), SinkError> {
            self.calls += 1;
            match self.calls {
                4 => panic!("renderer lost its surface"),
                n if n % 2 == 1 => Err(SinkError::DeliveryFailed(format!("frame {}", n))),
                _ => Ok(()),
            }
        }
    }

    struct DetachFlag(Arc<Mutex<bool>>);

    impl FrameSink for DetachFlag {
        fn deliver(&mut self, _frame: &Frame) -> Result<(), SinkError> {
            Ok(())
        }

        fn detach(&mut self) {
            *self.0.lock() = true;
        }
    }

    /// Manual clock that stops the queue once it has slept past `limit`.
    struct StoppingClock {
        inner: ManualClock,
        queue: Arc<FrameQueue>,
        limit: Duration,
    }

    impl Clock for StoppingClock {
        fn now(&self) -> Duration {
            self.inner.now()
        }

        fn sleep(&self, duration: Duration) {
            self.inner.sleep(duration);
            if self.inner.total_slept() >= self.limit {
                self.queue.begin_shutdown();
            }
        }
    }

    fn frame_at(pts_us: i64) -> Frame {
        Frame::new(vec![0u8; 4], 2, 2, PixelFormat::Gray8, Some(pts_us))
    }

    fn consumer(queue: &Arc<FrameQueue>, clock: SharedClock, sink: SharedSink, events: EventBus) -> RenderConsumer {
        let timing = StreamTiming::new(30.0, TimeBase::MICROS, Some(Duration::from_secs(10)));
        RenderConsumer::new(
            Arc::clone(queue),
            timing,
            clock,
            Arc::new(Mutex::new(PlaybackClock::new())),
            sink,
            events,
            &PipelineConfig::default(),
        )
    }

    #[test]
    fn test_forwards_spaced_by_frame_interval() {
        let queue = Arc::new(FrameQueue::new(10));
        let clock = Arc::new(ManualClock::new());
        let times = Arc::new(Mutex::new(Vec::new()));
        let recording = RecordingSink { clock: clock.clone(), times: Arc::clone(&times) };
        let mut consumer = consumer(&queue, clock.clone(), sink::shared(recording), EventBus::new());

        for pts in [0, 33_000, 66_000] {
            queue.push(frame_at(pts));
        }
        for _ in 0..3 {
            assert_eq!(consumer.step(), StepResult::Delivered);
        }

        let interval = Duration::from_secs_f64(1.0 / 30.0);
        let tolerance = Duration::from_micros(100);
        let times = times.lock().clone();
        assert_eq!(times.len(), 3);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] + tolerance >= interval);
        }
    }

    #[test]
    fn test_sink_failures_do_not_stop_delivery() {
        let queue = Arc::new(FrameQueue::new(10));
        let events = EventBus::new();
        let rx = events.subscribe();
        let mut consumer = consumer(&queue, Arc::new(ManualClock::new()), sink::shared(FlakySink { calls: 0 }), events);

        for i in 0..6 {
            queue.push(frame_at(i * 33_333));
        }
        let results: Vec<StepResult> = (0..6).map(|_| consumer.step()).collect();
        assert_eq!(
            results,
            vec![
                StepResult::DeliveryFailed,
                StepResult::Delivered,
                StepResult::DeliveryFailed,
                StepResult::DeliveryFailed,
                StepResult::DeliveryFailed,
                StepResult::Delivered,
            ]
        );
        assert_eq!(consumer.stats(), ConsumerStats { rendered: 2, delivery_failures: 4 });
        assert!(queue.is_empty());

        let sink_errors: Vec<PlayerEvent> = rx
            .try_iter()
            .filter(|e| matches!(e, PlayerEvent::SinkError(_)))
            .collect();
        assert_eq!(sink_errors.len(), 4);
        assert!(sink_errors
            .iter()
            .any(|e| matches!(e, PlayerEvent::SinkError(msg) if msg.contains("lost its surface"))));
    }

    #[test]
    fn test_progress_reported_per_second_of_media() {
        let queue = Arc::new(FrameQueue::new(60));
        let events = EventBus::new();
        let rx = events.subscribe();
        let sink = sink::shared(StatsSink::new());
        let mut consumer = consumer(&queue, Arc::new(ManualClock::new()), sink, events);

        // 2.5 seconds of 30 fps media.
        for i in 0..60 {
            queue.push(frame_at(i * 1_000_000 / 30));
        }
        for _ in 0..60 {
            consumer.step();
        }
        for i in 60..75 {
            queue.push(frame_at(i * 1_000_000 / 30));
        }
        for _ in 60..75 {
            consumer.step();
        }

        let positions: Vec<Duration> = rx
            .try_iter()
            .filter_map(|e| match e {
                PlayerEvent::Progress { position, duration } => {
                    assert_eq!(duration, Some(Duration::from_secs(10)));
                    Some(position)
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            positions,
            vec![Duration::ZERO, Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn test_empty_queue_times_out_then_stops() {
        let queue = Arc::new(FrameQueue::new(5));
        let detached = Arc::new(Mutex::new(false));
        let mut consumer = consumer(
            &queue,
            SystemClock::shared(),
            sink::shared(DetachFlag(Arc::clone(&detached))),
            EventBus::new(),
        );

        assert_eq!(consumer.step(), StepResult::Idle);

        let stopper = Arc::clone(&queue);
        let handle = thread::spawn(move || consumer.run());
        thread::sleep(Duration::from_millis(50));
        stopper.begin_shutdown();

        let stats = handle.join().unwrap();
        assert_eq!(stats.rendered, 0);
        assert!(*detached.lock());
    }

    #[test]
    fn test_stop_interrupts_pacing_at_low_frame_rate() {
        let queue = Arc::new(FrameQueue::new(5));
        let clock = Arc::new(StoppingClock {
            inner: ManualClock::new(),
            queue: Arc::clone(&queue),
            limit: Duration::from_millis(100),
        });
        let timing = StreamTiming::new(0.1, TimeBase::MICROS, None);
        let sink = StatsSink::new();
        let counters = sink.counters();
        let mut consumer = RenderConsumer::new(
            Arc::clone(&queue),
            timing,
            clock.clone(),
            Arc::new(Mutex::new(PlaybackClock::new())),
            sink::shared(sink),
            EventBus::new(),
            &PipelineConfig::default(),
        );

        queue.push(frame_at(0));
        queue.push(frame_at(10_000_000));
        assert_eq!(consumer.step(), StepResult::Delivered);
        assert_eq!(consumer.step(), StepResult::Stopped);

        assert_eq!(clock.inner.total_slept(), Duration::from_millis(100));
        assert_eq!(counters.frames(), 1);
    }

    #[test]
    fn test_stop_leaves_queued_frames_for_drain() {
        let queue = Arc::new(FrameQueue::new(5));
        let mut consumer = consumer(&queue, Arc::new(ManualClock::new()), sink::shared(StatsSink::new()), EventBus::new());
        queue.push(frame_at(0));
        queue.push(frame_at(33_333));
        queue.begin_shutdown();

        assert_eq!(consumer.run(), ConsumerStats::default());
        assert_eq!(queue.len(), 2);
    }
}
