//! Bounded decode-to-render video frame pipeline.
//!
//! A decode thread pulls frames from a [`decoder::FrameSource`], paces them by
//! presentation timestamp and feeds a [`core::FrameQueue`] sized to about two
//! seconds of video. A render thread drains the queue at the stream's frame
//! interval and hands each frame to a [`sink::FrameSink`]. [`VideoPlayer`]
//! owns the lifecycle.

pub mod config;
pub mod core;
pub mod decoder;
pub mod error;
pub mod events;
pub mod shared;
pub mod sink;
pub mod sync;
pub mod utils;

pub use crate::config::PipelineConfig;
pub use crate::core::{PlayerState, StreamSummary, VideoPlayer};
pub use crate::error::{PlayerError, SinkError};
pub use crate::events::PlayerEvent;
