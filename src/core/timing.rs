use std::time::Duration;

use crate::decoder::StreamInfo;
use crate::shared::constants::MICROS_PER_SECOND;

/// Seconds per PTS unit, as a rational `num / den`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeBase {
    pub num: i64,
    pub den: i64,
}

impl TimeBase {
    pub const MICROS: TimeBase = TimeBase { num: 1, den: MICROS_PER_SECOND };

    pub fn new(num: i64, den: i64) -> Self {
        Self { num, den }
    }

    pub fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// Converts a PTS to microseconds. Computed in 128 bits so large PTS values
    /// with fine time bases do not overflow.
    pub fn pts_to_micros(&self, pts: i64) -> i64 {
        if self.den == 0 {
            return 0;
        }
        let us = pts as i128 * self.num as i128 * MICROS_PER_SECOND as i128 / self.den as i128;
        us.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}

/// Timing derived once when the stream is opened; read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamTiming {
    pub frame_rate: f64,
    /// `None` when the frame rate is zero or unknown.
    pub frame_interval: Option<Duration>,
    pub time_base: TimeBase,
    pub duration: Option<Duration>,
}

impl StreamTiming {
    pub fn new(frame_rate: f64, time_base: TimeBase, duration: Option<Duration>) -> Self {
        // Rates too small for a representable interval count as unknown.
        let frame_interval = if frame_rate.is_finite() && frame_rate > 0.0 {
            Duration::try_from_secs_f64(1.0 / frame_rate).ok()
        } else {
            None
        };
        Self { frame_rate, frame_interval, time_base, duration }
    }

    pub fn from_info(info: &StreamInfo) -> Self {
        let duration = info
            .duration_micros
            .filter(|us| *us >= 0)
            .map(|us| Duration::from_micros(us as u64));
        Self::new(info.frame_rate, info.time_base, duration)
    }

    /// Presentation time of `pts` in microseconds, `None` for unknown PTS.
    pub fn presentation_micros(&self, pts: Option<i64>) -> Option<i64> {
        pts.map(|p| self.time_base.pts_to_micros(p))
    }

    pub fn frame_rate_rounded(&self) -> u32 {
        if self.frame_rate.is_finite() && self.frame_rate > 0.0 {
            self.frame_rate.round() as u32
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pts_conversion_with_mpeg_time_base() {
        let tb = TimeBase::new(1, 90_000);
        assert_eq!(tb.pts_to_micros(90_000), 1_000_000);
        assert_eq!(tb.pts_to_micros(3_000), 33_333);
        assert_eq!(tb.pts_to_micros(-9_000), -100_000);
    }

    #[test]
    fn test_pts_conversion_does_not_overflow() {
        let tb = TimeBase::new(1, 1);
        assert_eq!(tb.pts_to_micros(i64::MAX), i64::MAX);
    }

    #[test]
    fn test_interval_undefined_for_zero_rate() {
        let timing = StreamTiming::new(0.0, TimeBase::MICROS, None);
        assert!(timing.frame_interval.is_none());
        assert_eq!(timing.frame_rate_rounded(), 0);

        let timing = StreamTiming::new(f64::NAN, TimeBase::MICROS, None);
        assert!(timing.frame_interval.is_none());
    }

    #[test]
    fn test_interval_undefined_for_tiny_rate() {
        let timing = StreamTiming::new(1e-30, TimeBase::MICROS, None);
        assert!(timing.frame_interval.is_none());
        assert_eq!(timing.frame_rate_rounded(), 0);
    }

    #[test]
    fn test_interval_for_ntsc_rate() {
        let timing = StreamTiming::new(30_000.0 / 1_001.0, TimeBase::new(1_001, 30_000), None);
        let interval = timing.frame_interval.unwrap();
        assert_eq!(interval.as_micros(), 33_366);
        assert_eq!(timing.frame_rate_rounded(), 30);
        assert_eq!(timing.presentation_micros(Some(1)), Some(33_366));
        assert_eq!(timing.presentation_micros(None), None);
    }
}
