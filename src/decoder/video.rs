use anyhow::{anyhow, Result};
use opencv::{prelude::*, videoio};

use super::{Frame, FrameSource, PixelFormat, StreamInfo, StreamOpener};
use crate::core::timing::TimeBase;
use crate::error::PlayerError;
use crate::utils::logger;

/// OpenCV-backed decoder. Frames come out as packed BGR, PTS in milliseconds.
pub struct VideoDecoder {
    capture: videoio::VideoCapture,
    width: u32,
    height: u32,
    fps: f64,
    frames_read: u64,
}

impl VideoDecoder {
    pub fn new(path: &str) -> Result<Self, PlayerError> {
        let open_err = |e: opencv::Error| PlayerError::OpenFailed {
            path: path.to_string(),
            reason: e.to_string(),
        };

        logger::debug(&format!("Opening video with OpenCV: {}", path));

        // CAP_ANY: OpenCV picks the platform backend.
        let mut capture = videoio::VideoCapture::from_file(path, videoio::CAP_ANY).map_err(open_err)?;
        let _ = capture.set(videoio::CAP_PROP_HW_ACCELERATION, videoio::VIDEO_ACCELERATION_ANY as f64);

        if !capture.is_opened().map_err(open_err)? {
            return Err(PlayerError::CodecUnavailable(path.to_string()));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS).map_err(open_err)?;
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).map_err(open_err)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).map_err(open_err)? as u32;

        if width == 0 || height == 0 {
            return Err(PlayerError::NoVideoStream(path.to_string()));
        }

        logger::info(&format!("OpenCV VideoCapture opened: {}x{} @ {:.3} fps", width, height, fps));

        Ok(Self {
            capture,
            width,
            height,
            fps,
            frames_read: 0,
        })
    }

    pub fn info(&mut self) -> StreamInfo {
        let frame_count = self.capture.get(videoio::CAP_PROP_FRAME_COUNT).unwrap_or(0.0);
        let duration_micros = if frame_count > 0.0 && self.fps > 0.0 {
            Some((frame_count / self.fps * 1_000_000.0) as i64)
        } else {
            None
        };
        StreamInfo {
            frame_rate: self.fps,
            time_base: TimeBase::new(1, 1_000),
            duration_micros,
            width: self.width,
            height: self.height,
        }
    }
}

impl FrameSource for VideoDecoder {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut mat = Mat::default();
        if !self.capture.read(&mut mat)? || mat.empty() {
            return Ok(None);
        }

        // Position of the frame just decoded, in milliseconds.
        let pos_ms = self.capture.get(videoio::CAP_PROP_POS_MSEC)?;
        let pts = if pos_ms.is_finite() && (pos_ms > 0.0 || self.frames_read == 0) {
            Some(pos_ms.round() as i64)
        } else {
            None
        };

        if !mat.is_continuous() {
            return Err(anyhow!("Frame is not continuous"));
        }
        let buffer = mat.data_bytes()?.to_vec();
        self.frames_read += 1;

        Ok(Some(Frame::new(
            buffer,
            mat.cols() as u32,
            mat.rows() as u32,
            PixelFormat::Bgr24,
            pts,
        )))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenCvOpener;

impl StreamOpener for OpenCvOpener {
    fn open(&mut self, path: &str) -> Result<(StreamInfo, Box<dyn FrameSource>), PlayerError> {
        let mut decoder = VideoDecoder::new(path)?;
        let info = decoder.info();
        Ok((info, Box::new(decoder)))
    }
}
