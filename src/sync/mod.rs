pub mod clock;
pub mod pacer;

pub use clock::{sleep_sliced, Clock, ManualClock, PlaybackClock, SharedClock, SystemClock};
pub use pacer::FramePacer;
