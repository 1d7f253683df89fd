pub mod frame_data;
pub mod synthetic;
#[cfg(feature = "opencv")]
pub mod video;

use anyhow::Result;

pub use frame_data::{Frame, PixelFormat};
pub use synthetic::{SyntheticDecoder, SyntheticOpener};
#[cfg(feature = "opencv")]
pub use video::{OpenCvOpener, VideoDecoder};

use crate::core::timing::TimeBase;
use crate::error::PlayerError;

/// Stream metadata reported by the decoder when a stream is opened.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StreamInfo {
    /// Frames per second; zero when the container does not say.
    pub frame_rate: f64,
    pub time_base: TimeBase,
    pub duration_micros: Option<i64>,
    pub width: u32,
    pub height: u32,
}

/// Pull-style frame supplier. `Ok(None)` is end of stream.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Opens a media path and hands back its metadata plus a frame source.
pub trait StreamOpener: Send {
    fn open(&mut self, path: &str) -> Result<(StreamInfo, Box<dyn FrameSource>), PlayerError>;
}
