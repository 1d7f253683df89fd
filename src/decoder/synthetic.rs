//! Generated test-pattern stream.
//!
//! Decodes "instantly", so it behaves like a decoder that is far faster than
//! playback and exercises the pipeline's pacing and backpressure.

use anyhow::{bail, Result};

use super::{Frame, FrameSource, PixelFormat, StreamInfo, StreamOpener};
use crate::core::timing::TimeBase;
use crate::error::PlayerError;
use crate::shared::constants::MICROS_PER_SECOND;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub time_base: TimeBase,
    /// `None` for an endless stream.
    pub frame_count: Option<u64>,
    /// When false every frame carries an unknown PTS.
    pub pts_known: bool,
    /// Report a decode error once this many frames have been produced.
    pub fail_after: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30.0,
            width: 64,
            height: 36,
            format: PixelFormat::Gray8,
            time_base: TimeBase::new(1, 90_000),
            frame_count: Some(90),
            pts_known: true,
            fail_after: None,
        }
    }
}

impl SyntheticConfig {
    fn pts_for(&self, index: u64) -> Option<i64> {
        if !self.pts_known || !(self.frame_rate > 0.0) || !self.time_base.is_valid() {
            return None;
        }
        let units_per_second = self.time_base.den as f64 / self.time_base.num as f64;
        Some((index as f64 * units_per_second / self.frame_rate).round() as i64)
    }

    fn duration_micros(&self) -> Option<i64> {
        let count = self.frame_count?;
        if self.frame_rate > 0.0 {
            Some((count as f64 * MICROS_PER_SECOND as f64 / self.frame_rate) as i64)
        } else {
            None
        }
    }
}

pub struct SyntheticDecoder {
    config: SyntheticConfig,
    produced: u64,
}

impl SyntheticDecoder {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config, produced: 0 }
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }
}

impl FrameSource for SyntheticDecoder {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(limit) = self.config.fail_after {
            if self.produced >= limit {
                bail!("synthetic decode failure after {} frames", limit);
            }
        }
        if let Some(count) = self.config.frame_count {
            if self.produced >= count {
                return Ok(None);
            }
        }

        let n = self.produced;
        let size = self.config.format.buffer_size(self.config.width, self.config.height);
        let buffer = (0..size).map(|i| (i as u64).wrapping_add(n) as u8).collect();
        let frame = Frame::new(
            buffer,
            self.config.width,
            self.config.height,
            self.config.format,
            self.config.pts_for(n),
        );
        self.produced += 1;
        Ok(Some(frame))
    }
}

/// Opener that ignores the path contents and serves a [`SyntheticDecoder`].
#[derive(Debug, Clone, Default)]
pub struct SyntheticOpener {
    pub config: SyntheticConfig,
}

impl SyntheticOpener {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }
}

impl StreamOpener for SyntheticOpener {
    fn open(&mut self, path: &str) -> Result<(StreamInfo, Box<dyn FrameSource>), PlayerError> {
        if path.is_empty() {
            return Err(PlayerError::OpenFailed {
                path: path.to_string(),
                reason: "empty path".to_string(),
            });
        }
        if self.config.width == 0 || self.config.height == 0 {
            return Err(PlayerError::InvalidStream(format!(
                "{}x{} frames",
                self.config.width, self.config.height
            )));
        }

        let info = StreamInfo {
            frame_rate: self.config.frame_rate,
            time_base: self.config.time_base,
            duration_micros: self.config.duration_micros(),
            width: self.config.width,
            height: self.config.height,
        };
        Ok((info, Box::new(SyntheticDecoder::new(self.config.clone()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pts_follow_frame_rate() {
        let mut decoder = SyntheticDecoder::new(SyntheticConfig::default());
        let pts: Vec<Option<i64>> = (0..3).map(|_| decoder.next_frame().unwrap().unwrap().pts).collect();
        assert_eq!(pts, vec![Some(0), Some(3_000), Some(6_000)]);
    }

    #[test]
    fn test_end_of_stream_after_frame_count() {
        let config = SyntheticConfig { frame_count: Some(2), ..Default::default() };
        let mut decoder = SyntheticDecoder::new(config);
        assert!(decoder.next_frame().unwrap().is_some());
        assert!(decoder.next_frame().unwrap().is_some());
        assert!(decoder.next_frame().unwrap().is_none());
        assert_eq!(decoder.produced(), 2);
    }

    #[test]
    fn test_injected_decode_failure() {
        let config = SyntheticConfig { fail_after: Some(1), ..Default::default() };
        let mut decoder = SyntheticDecoder::new(config);
        assert!(decoder.next_frame().is_ok());
        assert!(decoder.next_frame().is_err());
    }

    #[test]
    fn test_open_reports_metadata() {
        let mut opener = SyntheticOpener::default();
        let (info, _) = opener.open("pattern").unwrap();
        assert_eq!((info.width, info.height), (64, 36));
        assert_eq!(info.duration_micros, Some(3_000_000));

        assert!(matches!(opener.open(""), Err(PlayerError::OpenFailed { .. })));
    }
}
