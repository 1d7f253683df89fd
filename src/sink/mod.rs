//! Frame sinks: where the render loop hands finished frames.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::decoder::Frame;
use crate::error::SinkError;

/// Receives frames from the render loop.
///
/// `attach` runs on the controller's thread before the render loop is
/// launched; a failure there aborts `start()`. `detach` runs on the render
/// thread as it exits.
pub trait FrameSink: Send {
    fn attach(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn deliver(&mut self, frame: &Frame) -> Result<(), SinkError>;

    fn detach(&mut self) {}
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn attach(&mut self) -> Result<(), SinkError> {
        (**self).attach()
    }

    fn deliver(&mut self, frame: &Frame) -> Result<(), SinkError> {
        (**self).deliver(frame)
    }

    fn detach(&mut self) {
        (**self).detach()
    }
}

pub type SharedSink = Arc<Mutex<Box<dyn FrameSink>>>;

pub fn shared(sink: impl FrameSink + 'static) -> SharedSink {
    Arc::new(Mutex::new(Box::new(sink)))
}

/// Discards every frame.
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn deliver(&mut self, _frame: &Frame) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Counters readable from outside the pipeline while it runs.
#[derive(Debug, Default)]
pub struct SinkCounters {
    pub frames: AtomicU64,
    pub bytes: AtomicU64,
    pub last_pts: AtomicU64,
}

impl SinkCounters {
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

/// Counts frames and bytes delivered.
#[derive(Debug, Default, Clone)]
pub struct StatsSink {
    counters: Arc<SinkCounters>,
}

impl StatsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> Arc<SinkCounters> {
        Arc::clone(&self.counters)
    }
}

impl FrameSink for StatsSink {
    fn deliver(&mut self, frame: &Frame) -> Result<(), SinkError> {
        self.counters.frames.fetch_add(1, Ordering::Relaxed);
        self.counters.bytes.fetch_add(frame.len() as u64, Ordering::Relaxed);
        if let Some(pts) = frame.pts {
            self.counters.last_pts.store(pts.max(0) as u64, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// Appends each frame's raw pixels to a file. The file is opened on attach.
pub struct RawFileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl RawFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
        }
    }
}

impl FrameSink for RawFileSink {
    fn attach(&mut self) -> Result<(), SinkError> {
        if self.writer.is_none() {
            let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            self.writer = Some(BufWriter::new(file));
        }
        Ok(())
    }

    fn deliver(&mut self, frame: &Frame) -> Result<(), SinkError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| SinkError::BindingUnavailable(format!("{} not open", self.path.display())))?;
        writer.write_all(&frame.buffer)?;
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}
