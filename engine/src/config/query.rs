//! Query engine tuning knobs.
//!
//! Controls how many "did you mean" suggestions are produced, how far a
//! misspelling may be from a catalog entry, and the largest `limit` a
//! pipeline may request.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable for [`EngineConfig::max_suggestions`].
pub const MAX_SUGGESTIONS_VAR: &str = "LQT_MAX_SUGGESTIONS";
/// Environment variable for [`EngineConfig::max_suggestion_distance`].
pub const MAX_SUGGESTION_DISTANCE_VAR: &str = "LQT_MAX_SUGGESTION_DISTANCE";
/// Environment variable for [`EngineConfig::max_limit`].
pub const MAX_LIMIT_VAR: &str = "LQT_MAX_LIMIT";

/// Errors reported by [`EngineConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Suggestions were requested but the count is zero.
    #[error("max_suggestions must be between 1 and 10, got {0}")]
    InvalidSuggestionCount(usize),

    /// The edit distance cutoff is zero.
    #[error("max_suggestion_distance must be greater than zero")]
    ZeroDistance,

    /// The pipeline limit ceiling is zero.
    #[error("max_limit must be greater than zero")]
    ZeroLimit,
}

/// Engine configuration.
///
/// Configuration values can be set via environment variables:
/// - `LQT_MAX_SUGGESTIONS`: suggestions returned per error (default: 3)
/// - `LQT_MAX_SUGGESTION_DISTANCE`: Levenshtein cutoff (default: 3)
/// - `LQT_MAX_LIMIT`: largest accepted `| limit N` (default: 1000000)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of suggestions attached to an error.
    pub max_suggestions: usize,
    /// Maximum edit distance for a catalog entry to count as a near match.
    pub max_suggestion_distance: usize,
    /// Largest count a `limit` stage may carry.
    pub max_limit: u64,
}

impl EngineConfig {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or if the
    /// resulting configuration fails [`EngineConfig::validate`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`EngineConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_suggestions = lookup(MAX_SUGGESTIONS_VAR)
            .map(|v| v.parse::<usize>())
            .transpose()
            .with_context(|| format!("{MAX_SUGGESTIONS_VAR} must be an unsigned integer"))?
            .unwrap_or(defaults.max_suggestions);

        let max_suggestion_distance = lookup(MAX_SUGGESTION_DISTANCE_VAR)
            .map(|v| v.parse::<usize>())
            .transpose()
            .with_context(|| {
                format!("{MAX_SUGGESTION_DISTANCE_VAR} must be an unsigned integer")
            })?
            .unwrap_or(defaults.max_suggestion_distance);

        let max_limit = lookup(MAX_LIMIT_VAR)
            .map(|v| v.parse::<u64>())
            .transpose()
            .with_context(|| format!("{MAX_LIMIT_VAR} must be an unsigned integer"))?
            .unwrap_or(defaults.max_limit);

        let config = Self {
            max_suggestions,
            max_suggestion_distance,
            max_limit,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `max_suggestions` is zero or above 10
    /// - `max_suggestion_distance` is zero
    /// - `max_limit` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_suggestions == 0 || self.max_suggestions > 10 {
            return Err(ConfigError::InvalidSuggestionCount(self.max_suggestions));
        }
        if self.max_suggestion_distance == 0 {
            return Err(ConfigError::ZeroDistance);
        }
        if self.max_limit == 0 {
            return Err(ConfigError::ZeroLimit);
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_suggestions: 3,
            max_suggestion_distance: 3,
            max_limit: 1_000_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_suggestions, 3);
        assert_eq!(config.max_suggestion_distance, 3);
        assert_eq!(config.max_limit, 1_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_empty_lookup_uses_defaults() {
        let config = EngineConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_config_from_lookup_overrides() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (MAX_SUGGESTIONS_VAR, "5"),
            (MAX_SUGGESTION_DISTANCE_VAR, "2"),
            (MAX_LIMIT_VAR, "500"),
        ]))
        .unwrap();

        assert_eq!(config.max_suggestions, 5);
        assert_eq!(config.max_suggestion_distance, 2);
        assert_eq!(config.max_limit, 500);
    }

    #[test]
    fn test_config_rejects_garbage() {
        let result = EngineConfig::from_lookup(lookup_from(&[(MAX_LIMIT_VAR, "lots")]));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains(MAX_LIMIT_VAR));
    }

    #[test]
    fn test_config_validate_zero_suggestions() {
        let config = EngineConfig {
            max_suggestions: 0,
            ..EngineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidSuggestionCount(0))
        );
    }

    #[test]
    fn test_config_validate_zero_limit() {
        let config = EngineConfig {
            max_limit: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroLimit));
    }
}
