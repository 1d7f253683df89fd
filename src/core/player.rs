use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::consumer::{ConsumerStats, RenderConsumer};
use super::frame_buffer::{compute_capacity_with, FrameQueue};
use super::producer::{DecodeProducer, ProducerExit, ProducerStats};
use super::timing::StreamTiming;
use crate::config::PipelineConfig;
use crate::decoder::{FrameSource, StreamInfo, StreamOpener};
use crate::error::PlayerError;
use crate::events::{EventBus, EventReceiver, PlayerEvent};
use crate::sink::{self, FrameSink, SharedSink};
use crate::sync::{PlaybackClock, SharedClock, SystemClock};
use crate::utils::logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Running,
    Stopping,
    Released,
}

/// What `init` reports back to the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub width: u32,
    pub height: u32,
    pub frame_rate_rounded: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub producer: ProducerStats,
    pub consumer: ConsumerStats,
    pub producer_exit: Option<ProducerExit>,
}

/// Everything derived from one opened stream.
struct Session {
    info: StreamInfo,
    timing: StreamTiming,
    queue: Arc<FrameQueue>,
    source: Arc<Mutex<Box<dyn FrameSource>>>,
}

struct Tasks {
    producer: JoinHandle<(ProducerExit, ProducerStats)>,
    consumer: JoinHandle<ConsumerStats>,
}

struct Inner {
    state: PlayerState,
    opener: Box<dyn StreamOpener>,
    sink: Option<SharedSink>,
    session: Option<Session>,
    tasks: Option<Tasks>,
    stats: PipelineStats,
}

/// Owns the pipeline lifecycle: one stream, one queue, and at most one
/// decode/render thread pair at a time.
///
/// `stop()` does not wait for the threads; they notice the stop flag on their
/// own. `release()` and the next `start()` join them before touching the
/// decoder again.
pub struct VideoPlayer {
    config: PipelineConfig,
    clock: SharedClock,
    events: EventBus,
    playback: Arc<Mutex<PlaybackClock>>,
    inner: Mutex<Inner>,
}

impl VideoPlayer {
    pub fn new(
        opener: impl StreamOpener + 'static,
        sink: impl FrameSink + 'static,
        config: PipelineConfig,
    ) -> Result<Self, PlayerError> {
        Self::with_clock(opener, sink, config, SystemClock::shared())
    }

    pub fn with_clock(
        opener: impl StreamOpener + 'static,
        sink: impl FrameSink + 'static,
        config: PipelineConfig,
        clock: SharedClock,
    ) -> Result<Self, PlayerError> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            events: EventBus::new(),
            playback: Arc::new(Mutex::new(PlaybackClock::new())),
            inner: Mutex::new(Inner {
                state: PlayerState::Idle,
                opener: Box::new(opener),
                sink: Some(sink::shared(sink)),
                session: None,
                tasks: None,
                stats: PipelineStats::default(),
            }),
        })
    }

    /// Opens `path` and sizes the queue for its frame rate. Any current
    /// playback is stopped first.
    pub fn init(&self, path: &str) -> Result<StreamSummary, PlayerError> {
        self.stop();
        let mut inner = self.inner.lock();
        if inner.state == PlayerState::Released {
            return Err(PlayerError::Released);
        }
        Self::join_tasks(&mut inner);
        inner.session = None;

        logger::info(&format!("Initializing decoder with video path: {}", path));
        let (info, source) = inner.opener.open(path).map_err(|e| {
            logger::error(&format!("Failed to open {}: {}", path, e));
            e
        })?;
        if info.width == 0 || info.height == 0 {
            return Err(PlayerError::InvalidStream(format!(
                "{} reports {}x{} frames",
                path, info.width, info.height
            )));
        }

        let timing = StreamTiming::from_info(&info);
        let capacity = compute_capacity_with(
            timing.frame_rate,
            self.config.buffer_seconds,
            self.config.min_capacity,
            self.config.max_capacity,
        );
        logger::info(&format!(
            "Stream ready: {}x{} @ {:.3} fps, queue capacity {}",
            info.width, info.height, timing.frame_rate, capacity
        ));

        inner.session = Some(Session {
            info,
            timing,
            queue: Arc::new(FrameQueue::new(capacity)),
            source: Arc::new(Mutex::new(source)),
        });
        *self.playback.lock() = PlaybackClock::new();

        self.events.emit(PlayerEvent::MetadataReady {
            width: info.width,
            height: info.height,
            frame_rate: timing.frame_rate,
        });

        Ok(StreamSummary {
            width: info.width,
            height: info.height,
            frame_rate_rounded: timing.frame_rate_rounded(),
        })
    }

    /// Launches the decode and render threads. Returns `Ok(false)` when
    /// nothing was launched: already running, or the sink could not bind.
    pub fn start(&self) -> Result<bool, PlayerError> {
        let mut inner = self.inner.lock();
        match inner.state {
            PlayerState::Released => return Err(PlayerError::Released),
            PlayerState::Running | PlayerState::Stopping => {
                logger::debug("start(): playback already running");
                return Ok(false);
            }
            PlayerState::Idle => {}
        }
        if inner.session.is_none() {
            return Err(PlayerError::NotInitialized);
        }

        Self::join_tasks(&mut inner);

        let sink = inner.sink.clone().ok_or(PlayerError::Released)?;
        if let Err(e) = sink.lock().attach() {
            logger::error(&format!("start(): sink binding unavailable, not starting: {}", e));
            return Ok(false);
        }

        let (timing, queue, source) = match inner.session.as_ref() {
            Some(s) => (s.timing, Arc::clone(&s.queue), Arc::clone(&s.source)),
            None => return Err(PlayerError::NotInitialized),
        };

        queue.reopen();
        self.playback.lock().start(self.clock.now());

        let mut producer = DecodeProducer::new(Arc::clone(&queue), timing, Arc::clone(&self.clock), &self.config);
        let producer_events = self.events.clone();
        let producer_handle = thread::Builder::new()
            .name("framepipe-decode".to_string())
            .spawn(move || {
                let mut source = source.lock();
                let exit = producer.run(&mut **source, &producer_events);
                (exit, producer.stats())
            });
        let producer_handle = match producer_handle {
            Ok(h) => h,
            Err(e) => {
                queue.begin_shutdown();
                sink.lock().detach();
                logger::error(&format!("Failed to spawn decode thread: {}", e));
                return Err(PlayerError::Io(e));
            }
        };

        let mut consumer = RenderConsumer::new(
            Arc::clone(&queue),
            timing,
            Arc::clone(&self.clock),
            Arc::clone(&self.playback),
            sink.clone(),
            self.events.clone(),
            &self.config,
        );
        let consumer_handle = thread::Builder::new()
            .name("framepipe-render".to_string())
            .spawn(move || consumer.run());
        let consumer_handle = match consumer_handle {
            Ok(h) => h,
            Err(e) => {
                queue.begin_shutdown();
                let _ = producer_handle.join();
                queue.drain();
                sink.lock().detach();
                logger::error(&format!("Failed to spawn render thread: {}", e));
                return Err(PlayerError::Io(e));
            }
        };

        inner.tasks = Some(Tasks {
            producer: producer_handle,
            consumer: consumer_handle,
        });
        inner.state = PlayerState::Running;
        logger::info(&format!(
            "Playback started (queue capacity {}, {} event listeners)",
            queue.capacity(),
            self.events.subscriber_count()
        ));
        Ok(true)
    }

    /// Signals both threads to stop and drops every queued frame. Returns
    /// without waiting for the threads.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if inner.state != PlayerState::Running {
            return;
        }
        inner.state = PlayerState::Stopping;
        if let Some(session) = inner.session.as_ref() {
            session.queue.begin_shutdown();
            let drained = session.queue.drain();
            logger::info(&format!("Stopped decoding and rendering ({} queued frames released)", drained));
        }
        inner.state = PlayerState::Idle;
    }

    /// Stops, waits for both threads, then lets go of the decoder and the
    /// sink. Safe to call more than once.
    pub fn release(&self) {
        self.stop();
        let mut inner = self.inner.lock();
        if inner.state == PlayerState::Released {
            return;
        }
        Self::join_tasks(&mut inner);
        inner.session = None;
        inner.sink = None;
        inner.state = PlayerState::Released;
        logger::info("Decoder released");
    }

    pub fn query_dimensions(&self) -> Option<(u32, u32)> {
        self.inner
            .lock()
            .session
            .as_ref()
            .map(|s| (s.info.width, s.info.height))
    }

    pub fn state(&self) -> PlayerState {
        self.inner.lock().state
    }

    pub fn timing(&self) -> Option<StreamTiming> {
        self.inner.lock().session.as_ref().map(|s| s.timing)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.inner.lock().session.as_ref().map(|s| s.queue.capacity())
    }

    pub fn queue_len(&self) -> usize {
        self.inner
            .lock()
            .session
            .as_ref()
            .map_or(0, |s| s.queue.len())
    }

    /// Presentation time of the most recently rendered frame.
    pub fn position(&self) -> Option<Duration> {
        self.playback.lock().current_time
    }

    /// True once the decoder has run dry and the queue is empty.
    pub fn is_finished(&self) -> bool {
        let inner = self.inner.lock();
        let producer_done = inner
            .tasks
            .as_ref()
            .map_or(true, |t| t.producer.is_finished());
        let queue_empty = inner.session.as_ref().map_or(true, |s| s.queue.is_empty());
        producer_done && queue_empty
    }

    /// Counters from the most recently joined run.
    pub fn stats(&self) -> PipelineStats {
        self.inner.lock().stats
    }

    /// New subscription to player events. Each subscriber sees every event
    /// emitted after it subscribed.
    pub fn events(&self) -> EventReceiver {
        self.events.subscribe()
    }

    fn join_tasks(inner: &mut Inner) {
        let Some(tasks) = inner.tasks.take() else {
            return;
        };
        match tasks.producer.join() {
            Ok((exit, stats)) => {
                inner.stats.producer = stats;
                inner.stats.producer_exit = Some(exit);
            }
            Err(_) => logger::error("Decode thread panicked"),
        }
        match tasks.consumer.join() {
            Ok(stats) => inner.stats.consumer = stats,
            Err(_) => logger::error("Render thread panicked"),
        }
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        self.release();
    }
}
