//! Planner configuration
//!
//! This module provides a structured configuration system with sensible defaults,
//! TOML file and environment variable support, and runtime validation.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ReplanError, ReplanResult};

pub mod defaults;
pub mod durations;
pub mod search;

pub use defaults::*;
pub use durations::DurationConfig;
pub use search::{HeuristicKind, SearchConfig, SearchMode};

/// Root configuration structure for the planner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Search budget and heuristics
    pub search: SearchConfig,

    /// Model construction
    pub model: ModelConfig,

    /// Action durations used by the default evaluator
    pub durations: DurationConfig,
}

/// Model construction configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Planning horizon; derived from the action durations when unset
    pub horizon: Option<u64>,
}

impl ModelConfig {
    pub fn from_env() -> ReplanResult<Self> {
        let horizon = match std::env::var("REPLAN_MODEL_HORIZON") {
            Ok(value) => Some(value.parse().map_err(|_| {
                ReplanError::config("model", "invalid REPLAN_MODEL_HORIZON")
            })?),
            Err(_) => None,
        };
        Ok(Self { horizon })
    }

    pub fn validate(&self) -> ReplanResult<()> {
        if let Some(horizon) = self.horizon {
            if horizon < MIN_HORIZON {
                return Err(ReplanError::config(
                    "model",
                    format!("horizon must be at least {}", MIN_HORIZON),
                ));
            }
        }
        Ok(())
    }
}

impl PlannerConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> ReplanResult<Self> {
        let config = Self {
            search: SearchConfig::from_env()?,
            model: ModelConfig::from_env()?,
            durations: DurationConfig::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> ReplanResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ReplanResult<()> {
        self.search.validate()?;
        self.model.validate()?;
        self.durations.validate()?;
        Ok(())
    }
}

/// Builder for PlannerConfig
pub struct PlannerConfigBuilder {
    config: PlannerConfig,
}

impl PlannerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PlannerConfig::default(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.search.timeout = timeout;
        self
    }

    pub fn max_nodes(mut self, max_nodes: u64) -> Self {
        self.config.search.max_nodes = max_nodes;
        self
    }

    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.config.search.mode = mode;
        self
    }

    pub fn heuristics(mut self, heuristics: Vec<HeuristicKind>) -> Self {
        self.config.search.heuristics = heuristics;
        self
    }

    pub fn horizon(mut self, horizon: u64) -> Self {
        self.config.model.horizon = Some(horizon);
        self
    }

    pub fn durations(mut self, durations: DurationConfig) -> Self {
        self.config.durations = durations;
        self
    }

    pub fn build(self) -> ReplanResult<PlannerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for PlannerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper functions for environment parsing
pub(crate) fn parse_duration_secs_from_env(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

pub(crate) fn parse_from_env<T: FromStr>(key: &str, default: T) -> ReplanResult<T> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| ReplanError::config("environment", format!("invalid {}", key))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_validation() {
        let config = PlannerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.heuristics.len(), 4);
        assert_eq!(config.model.horizon, None);
    }

    #[test]
    fn test_config_builder() {
        let config = PlannerConfigBuilder::new()
            .timeout(Duration::from_secs(2))
            .mode(SearchMode::Best)
            .horizon(120)
            .build()
            .unwrap();

        assert_eq!(config.search.timeout, Duration::from_secs(2));
        assert_eq!(config.search.mode, SearchMode::Best);
        assert_eq!(config.model.horizon, Some(120));
    }

    #[test]
    fn test_invalid_config() {
        assert!(PlannerConfigBuilder::new().max_nodes(0).build().is_err());
        assert!(PlannerConfigBuilder::new().horizon(0).build().is_err());
        assert!(PlannerConfigBuilder::new()
            .heuristics(vec![HeuristicKind::StayFirst, HeuristicKind::StayFirst])
            .build()
            .is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[search]
timeout = "500ms"
mode = "best"
heuristics = ["stay-first", "earliest-start"]

[model]
horizon = 300

[durations]
run = 3
"#
        )
        .unwrap();

        let config = PlannerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.search.timeout, Duration::from_millis(500));
        assert_eq!(config.search.mode, SearchMode::Best);
        assert_eq!(
            config.search.heuristics,
            vec![HeuristicKind::StayFirst, HeuristicKind::EarliestStart]
        );
        assert_eq!(config.model.horizon, Some(300));
        assert_eq!(config.durations.run, 3);
        assert_eq!(config.durations.stop, DEFAULT_STOP_DURATION);
    }

    #[test]
    fn test_heuristic_names_parse() {
        assert_eq!(
            "displaced-first".parse::<HeuristicKind>().unwrap(),
            HeuristicKind::DisplacedFirst
        );
        assert!("random".parse::<HeuristicKind>().is_err());
        assert!("fastest".parse::<SearchMode>().is_err());
    }
}
