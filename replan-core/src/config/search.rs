//! Search budget and heuristic pipeline configuration

use super::defaults::*;
use super::{parse_duration_secs_from_env, parse_from_env};
use crate::error::{ReplanError, ReplanResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Which solutions the search looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    /// Stop at the first feasible plan
    First,
    /// Keep improving the plan cost until the search space or the budget is exhausted
    Best,
}

impl FromStr for SearchMode {
    type Err = ReplanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(SearchMode::First),
            "best" => Ok(SearchMode::Best),
            other => Err(ReplanError::config(
                "search",
                format!("unknown search mode '{}'", other),
            )),
        }
    }
}

/// Variable selection phases, applied in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeuristicKind {
    /// Hosters of VMs that cannot stay where they are
    DisplacedFirst,
    /// Hosters of VMs that have to be placed (run, resume)
    AssignmentFirst,
    /// Remaining hosters, trying the current node first
    StayFirst,
    /// Action start times, earliest first
    EarliestStart,
}

impl FromStr for HeuristicKind {
    type Err = ReplanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "displaced-first" => Ok(HeuristicKind::DisplacedFirst),
            "assignment-first" => Ok(HeuristicKind::AssignmentFirst),
            "stay-first" => Ok(HeuristicKind::StayFirst),
            "earliest-start" => Ok(HeuristicKind::EarliestStart),
            other => Err(ReplanError::config(
                "search",
                format!("unknown heuristic '{}'", other),
            )),
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Wall-clock budget of one search
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Maximum number of explored search nodes
    pub max_nodes: u64,

    pub mode: SearchMode,

    /// Variable selection pipeline
    pub heuristics: Vec<HeuristicKind>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout: duration_secs(DEFAULT_SEARCH_TIMEOUT_SECS),
            max_nodes: DEFAULT_SEARCH_MAX_NODES,
            mode: SearchMode::First,
            heuristics: vec![
                HeuristicKind::DisplacedFirst,
                HeuristicKind::AssignmentFirst,
                HeuristicKind::StayFirst,
                HeuristicKind::EarliestStart,
            ],
        }
    }
}

impl SearchConfig {
    /// Load search configuration from environment variables
    pub fn from_env() -> ReplanResult<Self> {
        let mut config = Self::default();
        config.timeout = parse_duration_secs_from_env("REPLAN_SEARCH_TIMEOUT_SECS", config.timeout);
        config.max_nodes = parse_from_env("REPLAN_SEARCH_MAX_NODES", config.max_nodes)?;
        if let Ok(mode) = std::env::var("REPLAN_SEARCH_MODE") {
            config.mode = mode.parse()?;
        }
        if let Ok(pipeline) = std::env::var("REPLAN_SEARCH_HEURISTICS") {
            config.heuristics = pipeline
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .collect::<ReplanResult<Vec<_>>>()?;
        }
        Ok(config)
    }

    pub fn validate(&self) -> ReplanResult<()> {
        if self.timeout.is_zero() {
            return Err(ReplanError::config("search", "timeout must be positive"));
        }
        if self.max_nodes == 0 {
            return Err(ReplanError::config("search", "max_nodes must be positive"));
        }
        for (i, kind) in self.heuristics.iter().enumerate() {
            if self.heuristics[..i].contains(kind) {
                return Err(ReplanError::config(
                    "search",
                    format!("heuristic {:?} listed twice", kind),
                ));
            }
        }
        Ok(())
    }
}
