use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source shared by the producer and consumer loops.
///
/// `now` is measured from an arbitrary epoch fixed when the clock was created.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

pub type SharedClock = Arc<dyn Clock>;

/// Wall clock backed by [`Instant`].
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        Instant::now().duration_since(self.start)
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Clock that only moves when told to. `sleep` advances it instantly and
/// records the request, which makes pacing decisions observable in tests.
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps.lock().iter().sum()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        self.advance(duration);
    }
}

/// Sleeps `total` in slices of at most `slice`, checking `stopped` before each
/// one. Returns how long it actually slept.
pub fn sleep_sliced(clock: &dyn Clock, total: Duration, slice: Duration, stopped: impl Fn() -> bool) -> Duration {
    let slice = slice.max(Duration::from_millis(1));
    let mut slept = Duration::ZERO;
    while slept < total && !stopped() {
        let step = (total - slept).min(slice);
        clock.sleep(step);
        slept += step;
    }
    slept
}

/// Playback position bookkeeping. Written by the render loop only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackClock {
    /// Clock time at which playback was started.
    pub start_time: Option<Duration>,
    /// Presentation time of the most recently rendered frame.
    pub current_time: Option<Duration>,
    /// Presentation time last reported as progress.
    pub last_logged: Option<Duration>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, at: Duration) {
        self.start_time = Some(at);
        self.current_time = None;
        self.last_logged = None;
    }

    /// Records a rendered frame's presentation time. Negative times clamp to zero.
    pub fn update(&mut self, presentation_micros: i64) {
        self.current_time = Some(Duration::from_micros(presentation_micros.max(0) as u64));
    }

    /// True at most once per `interval` of presentation time; marks the report as done.
    pub fn should_report(&mut self, interval: Duration) -> bool {
        let Some(current) = self.current_time else {
            return false;
        };
        let due = match self.last_logged {
            None => true,
            Some(last) => current < last || current - last >= interval,
        };
        if due {
            self.last_logged = Some(current);
        }
        due
    }
}
