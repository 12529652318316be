//! Tuning parameters for the hybrid index.
//!
//! A [`HybridConfig`] can be built in code or loaded from a JSON file; every
//! field has a default, loading rejects unknown keys, and validation catches
//! values the coordinator cannot run with.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_FLUSH_THRESHOLD: usize = 100_000;
pub const DEFAULT_THRESHOLD_FLOOR: usize = 50_000;
pub const DEFAULT_THRESHOLD_CEILING: usize = 1_000_000;
pub const DEFAULT_THRESHOLD_STEP: usize = 50_000;
pub const DEFAULT_SLOW_DRAIN_MS: u64 = 200;
pub const DEFAULT_DRAIN_CHUNK: usize = 1_024;
pub const DEFAULT_EPSILON: usize = 64;
pub const DEFAULT_RETRAIN_AFTER: usize = 4_096;

/// Errors reported while loading or validating a configuration.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file is not valid JSON for [`HybridConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A field value the coordinator cannot run with.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Tuning knobs for the hybrid coordinator and its collaborators.
///
/// The threshold fields drive the AIMD flush controller; `epsilon` and
/// `retrain_after` are forwarded to the persistent learned index.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HybridConfig {
    /// Insert count that triggers a rotation.
    pub flush_threshold: usize,
    /// Lower bound the adaptive controller may shrink the threshold to.
    pub threshold_floor: usize,
    /// Upper bound the adaptive controller may raise the threshold to.
    pub threshold_ceiling: usize,
    /// Additive raise applied after a fast drain.
    pub threshold_step: usize,
    /// Drains slower than this many milliseconds halve the threshold.
    pub slow_drain_ms: u64,
    /// Whether the threshold adapts to drain duration at all.
    pub adaptive: bool,
    /// Records moved into the persistent index per write-lock hold, so
    /// lookups interleave with a long drain.
    pub drain_chunk: usize,
    /// Model error bound for the persistent learned index.
    pub epsilon: usize,
    /// Post-build inserts tolerated before the learned model retrains.
    pub retrain_after: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            threshold_floor: DEFAULT_THRESHOLD_FLOOR,
            threshold_ceiling: DEFAULT_THRESHOLD_CEILING,
            threshold_step: DEFAULT_THRESHOLD_STEP,
            slow_drain_ms: DEFAULT_SLOW_DRAIN_MS,
            adaptive: true,
            drain_chunk: DEFAULT_DRAIN_CHUNK,
            epsilon: DEFAULT_EPSILON,
            retrain_after: DEFAULT_RETRAIN_AFTER,
        }
    }
}

impl HybridConfig {
    /// Check every field the coordinator depends on.
    ///
    /// `flush_threshold` may start outside the floor/ceiling band; the
    /// controller only clamps when it adjusts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_threshold == 0 {
            return Err(ConfigError::Invalid("flush_threshold must be positive"));
        }
        if self.threshold_floor == 0 {
            return Err(ConfigError::Invalid("threshold_floor must be positive"));
        }
        if self.threshold_floor > self.threshold_ceiling {
            return Err(ConfigError::Invalid(
                "threshold_floor must not exceed threshold_ceiling",
            ));
        }
        if self.threshold_step == 0 {
            return Err(ConfigError::Invalid("threshold_step must be positive"));
        }
        if self.drain_chunk == 0 {
            return Err(ConfigError::Invalid("drain_chunk must be positive"));
        }
        if self.epsilon == 0 {
            return Err(ConfigError::Invalid("epsilon must be positive"));
        }
        if self.retrain_after == 0 {
            return Err(ConfigError::Invalid("retrain_after must be positive"));
        }
        Ok(())
    }

    /// Load and validate a configuration from a JSON file. Missing fields
    /// fall back to their defaults; unknown fields are rejected.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn slow_drain(&self) -> Duration {
        Duration::from_millis(self.slow_drain_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        assert!(HybridConfig::default().validate().is_ok());
    }

    #[rstest]
    #[case::zero_threshold(HybridConfig { flush_threshold: 0, ..Default::default() })]
    #[case::zero_floor(HybridConfig { threshold_floor: 0, ..Default::default() })]
    #[case::floor_above_ceiling(HybridConfig {
        threshold_floor: 10,
        threshold_ceiling: 5,
        ..Default::default()
    })]
    #[case::zero_step(HybridConfig { threshold_step: 0, ..Default::default() })]
    #[case::zero_chunk(HybridConfig { drain_chunk: 0, ..Default::default() })]
    #[case::zero_epsilon(HybridConfig { epsilon: 0, ..Default::default() })]
    #[case::zero_retrain(HybridConfig { retrain_after: 0, ..Default::default() })]
    fn invalid_fields_are_rejected(#[case] config: HybridConfig) {
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn threshold_may_start_below_the_floor() {
        let config = HybridConfig {
            flush_threshold: 4,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp config");
        file.write_all(json.as_bytes()).expect("write temp config");
        file
    }

    #[test]
    fn json_file_overrides_named_fields_only() {
        let file = write_config(r#"{"flush_threshold": 500, "adaptive": false}"#);
        let config = HybridConfig::from_json_file(file.path()).expect("load config");
        assert_eq!(config.flush_threshold, 500);
        assert!(!config.adaptive);
        assert_eq!(config.threshold_floor, DEFAULT_THRESHOLD_FLOOR);
        assert_eq!(config.epsilon, DEFAULT_EPSILON);
    }

    #[test]
    fn json_file_with_unknown_field_is_rejected() {
        let file = write_config(r#"{"flush_thresold": 500}"#);
        assert!(matches!(
            HybridConfig::from_json_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn json_file_with_invalid_value_is_rejected() {
        let file = write_config(r#"{"drain_chunk": 0}"#);
        assert!(matches!(
            HybridConfig::from_json_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = dir.path().join("missing.json");
        assert!(matches!(
            HybridConfig::from_json_file(path),
            Err(ConfigError::Io(_))
        ));
    }
}
