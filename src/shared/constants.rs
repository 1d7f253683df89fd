pub const APP_NAME: &str = "framepipe";

pub const CONFIG_FILE: &str = "framepipe.json";
pub const ERROR_LOG_FILE: &str = "error.log";
pub const DEBUG_LOG_FILE: &str = "debug.log";

/// Seconds of video the queue should be able to hold.
pub const BUFFER_SECONDS: f64 = 2.0;
pub const MIN_CAPACITY: usize = 5;
pub const MAX_CAPACITY: usize = 60;

/// Occupancy ratio above which a late frame is shed instead of queued.
pub const DROP_THRESHOLD: f64 = 0.8;
/// Frame intervals a frame may run late before it becomes droppable.
pub const CATCH_UP_INTERVALS: u32 = 2;

pub const FALLBACK_FRAME_INTERVAL_MS: u64 = 40;
pub const MAX_PACING_SLEEP_MS: u64 = 2_000;
/// Longest single sleep in a pacing wait; stop requests are checked between slices.
pub const PACING_SLICE_MS: u64 = 50;
pub const PROGRESS_INTERVAL_MS: u64 = 1_000;

pub const MICROS_PER_SECOND: i64 = 1_000_000;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm"];
