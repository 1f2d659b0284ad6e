//! Engine configuration.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults (canonical mJOA threshold 15.5, final distribution)
//! 2. A JSON file passed with `--config`
//! 3. Environment overrides:
//!    - MYELODECIDE_MILD_MJOA_THRESHOLD
//!    - MYELODECIDE_APPROACH_VARIANT=rule|scored|final

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{ApproachVariant, MILD_MJOA_THRESHOLD, SEVERE_MJOA_THRESHOLD};

const MILD_THRESHOLD_ENV: &str = "MYELODECIDE_MILD_MJOA_THRESHOLD";
const APPROACH_VARIANT_ENV: &str = "MYELODECIDE_APPROACH_VARIANT";

/// Highest attainable mJOA score.
const MJOA_MAX: f64 = 18.0;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("mild mJOA threshold {0} must lie in ({SEVERE_MJOA_THRESHOLD}, {MJOA_MAX}]")]
    MildThreshold(f64),

    #[error("unknown approach variant {0:?} (expected rule, scored or final)")]
    UnknownVariant(String),

    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl FromStr for ApproachVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rule" => Ok(Self::Rule),
            "scored" | "ml" => Ok(Self::Scored),
            "final" | "combined" => Ok(Self::Final),
            _ => Err(ConfigError::UnknownVariant(s.to_string())),
        }
    }
}

/// Tunables of the recommendation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Lowest mJOA score classified as mild myelopathy.
    pub mild_mjoa_threshold: f64,

    /// Distribution surfaced as the canonical `approachProbs`.
    pub approach_variant: ApproachVariant,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mild_mjoa_threshold: MILD_MJOA_THRESHOLD,
            approach_variant: ApproachVariant::Final,
        }
    }
}

impl EngineConfig {
    /// Defaults with environment overrides applied.
    #[must_use]
    pub fn from_env_or_default() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load a JSON config file. Missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed, or fails validation.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then the config file if given, then environment overrides.
    ///
    /// # Errors
    /// Returns error if the file cannot be loaded or the result fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_json_file(path)?.with_env_overrides(),
            None => Self::from_env_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment (best-effort).
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    ///
    /// Invalid values are logged and ignored; the current value is kept.
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(MILD_THRESHOLD_ENV) {
            match v.trim().parse::<f64>() {
                Ok(x) if valid_mild_threshold(x) => self.mild_mjoa_threshold = x,
                _ => tracing::warn!("Ignoring invalid {}={:?}", MILD_THRESHOLD_ENV, v),
            }
        }

        if let Some(v) = lookup(APPROACH_VARIANT_ENV) {
            match v.parse::<ApproachVariant>() {
                Ok(variant) => self.approach_variant = variant,
                Err(e) => tracing::warn!("Ignoring {}: {}", APPROACH_VARIANT_ENV, e),
            }
        }

        self
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    /// Returns `ConfigError::MildThreshold` if the mild threshold would swallow
    /// the moderate band or exceed the mJOA scale.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !valid_mild_threshold(self.mild_mjoa_threshold) {
            return Err(ConfigError::MildThreshold(self.mild_mjoa_threshold));
        }
        Ok(())
    }
}

fn valid_mild_threshold(x: f64) -> bool {
    x.is_finite() && x > SEVERE_MJOA_THRESHOLD && x <= MJOA_MAX
}
