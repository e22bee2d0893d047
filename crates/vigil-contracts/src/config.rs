//! Engine configuration, loadable from TOML.
//!
//! All knobs a deployment can turn live here.  `EngineConfig::validate()`
//! enforces the compliance floor at configuration time — a retention period
//! below 90 days is rejected, never silently clamped.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{VigilError, VigilResult};
use crate::event::RiskLevel;

/// The minimum retention period (days) mandated by the target compliance
/// standards.
pub const RETENTION_FLOOR_DAYS: u32 = 90;

/// Configuration for one audit engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long sealed segments are kept before `purge_expired` deletes
    /// them.  Must be at least `RETENTION_FLOOR_DAYS`.
    pub retention_days: u32,

    /// Rotation threshold: a new segment is opened when the active segment
    /// would exceed this many bytes.
    pub max_segment_bytes: usize,

    /// Events at or above this risk level are dispatched to the alert
    /// notifier synchronously after commit.
    pub alert_threshold: RiskLevel,

    /// Context keys the recorder refuses outright — the engine cannot vet
    /// values for secrets, but it can reject keys that announce them.
    pub denied_context_keys: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_days: 365,
            max_segment_bytes: 1024 * 1024,
            alert_threshold: RiskLevel::High,
            denied_context_keys: vec![
                "password".to_string(),
                "secret".to_string(),
                "private_key".to_string(),
            ],
        }
    }
}

impl EngineConfig {
    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `VigilError::ConfigError` if the TOML is malformed, or
    /// `RetentionViolation` if the retention period is below the floor.
    pub fn from_toml_str(s: &str) -> VigilResult<Self> {
        let config: EngineConfig = toml::from_str(s).map_err(|e| VigilError::ConfigError {
            reason: format!("failed to parse engine config TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML configuration.
    pub fn from_file(path: &Path) -> VigilResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| VigilError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Check every invariant a configuration must satisfy.
    pub fn validate(&self) -> VigilResult<()> {
        if self.retention_days < RETENTION_FLOOR_DAYS {
            return Err(VigilError::RetentionViolation {
                requested_days: self.retention_days,
                floor_days: RETENTION_FLOOR_DAYS,
            });
        }
        if self.max_segment_bytes == 0 {
            return Err(VigilError::ConfigError {
                reason: "max_segment_bytes must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
