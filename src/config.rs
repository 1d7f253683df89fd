use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PlayerError;
use crate::shared::constants;

/// Tunables for the frame pipeline. Every field has a default, so a config
/// file only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub buffer_seconds: f64,
    pub min_capacity: usize,
    pub max_capacity: usize,
    pub drop_threshold: f64,
    pub catch_up_intervals: u32,
    pub fallback_frame_interval_ms: u64,
    pub max_pacing_sleep_ms: u64,
    pub progress_interval_ms: u64,
    pub log_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_seconds: constants::BUFFER_SECONDS,
            min_capacity: constants::MIN_CAPACITY,
            max_capacity: constants::MAX_CAPACITY,
            drop_threshold: constants::DROP_THRESHOLD,
            catch_up_intervals: constants::CATCH_UP_INTERVALS,
            fallback_frame_interval_ms: constants::FALLBACK_FRAME_INTERVAL_MS,
            max_pacing_sleep_ms: constants::MAX_PACING_SLEEP_MS,
            progress_interval_ms: constants::PROGRESS_INTERVAL_MS,
            log_dir: None,
        }
    }
}

impl PipelineConfig {
    /// `<config dir>/framepipe/framepipe.json`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(constants::APP_NAME).join(constants::CONFIG_FILE))
    }

    /// Reads `path`, or the default location when `path` is `None`. A missing
    /// default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, PlayerError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, PlayerError> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| PlayerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), PlayerError> {
        if !(self.buffer_seconds.is_finite() && self.buffer_seconds > 0.0) {
            return Err(PlayerError::Config(format!(
                "buffer_seconds must be positive, got {}",
                self.buffer_seconds
            )));
        }
        if self.min_capacity == 0 || self.min_capacity > self.max_capacity {
            return Err(PlayerError::Config(format!(
                "capacity bounds {}..={} are invalid",
                self.min_capacity, self.max_capacity
            )));
        }
        if !(self.drop_threshold > 0.0 && self.drop_threshold <= 1.0) {
            return Err(PlayerError::Config(format!(
                "drop_threshold must be in (0, 1], got {}",
                self.drop_threshold
            )));
        }
        Ok(())
    }

    pub fn fallback_frame_interval(&self) -> Duration {
        Duration::from_millis(self.fallback_frame_interval_ms.max(1))
    }

    pub fn max_pacing_sleep(&self) -> Duration {
        Duration::from_millis(self.max_pacing_sleep_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = PipelineConfig::from_json(r#"{ "max_capacity": 120 }"#).unwrap();
        assert_eq!(config.max_capacity, 120);
        assert_eq!(config.min_capacity, constants::MIN_CAPACITY);
        assert_eq!(config.buffer_seconds, constants::BUFFER_SECONDS);
    }

    #[test]
    fn test_inverted_capacity_bounds_rejected() {
        let err = PipelineConfig::from_json(r#"{ "min_capacity": 10, "max_capacity": 4 }"#).unwrap_err();
        assert!(matches!(err, PlayerError::Config(_)));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        assert!(PipelineConfig::from_json(r#"{ "drop_threshold": 1.5 }"#).is_err());
        assert!(PipelineConfig::from_json(r#"{ "drop_threshold": 0.0 }"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("framepipe_config_{}.json", std::process::id()));
        let mut config = PipelineConfig::default();
        config.progress_interval_ms = 250;
        std::fs::write(&path, config.to_json()).unwrap();

        let loaded = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.progress_interval(), Duration::from_millis(250));

        std::fs::remove_file(&path).unwrap();
        assert!(PipelineConfig::load(Some(&path)).is_err());
    }
}
