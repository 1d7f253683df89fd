pub mod consumer;
pub mod frame_buffer;
pub mod player;
pub mod producer;
pub mod timing;

pub use consumer::{ConsumerStats, RenderConsumer, StepResult};
pub use frame_buffer::{compute_capacity, compute_capacity_with, FrameQueue, PushOutcome};
pub use player::{PipelineStats, PlayerState, StreamSummary, VideoPlayer};
pub use producer::{DecodeProducer, ProducerExit, ProducerStats};
pub use timing::{StreamTiming, TimeBase};
