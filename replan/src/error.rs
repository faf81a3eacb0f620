use std::path::PathBuf;

use thiserror::Error;

use replan_core::{CapacityViolation, ReplanError};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Planning(#[from] ReplanError),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON scenario: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML scenario: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid scenario: {0}")]
    Scenario(String),

    #[error("Computed plan overloads a node: {0}")]
    Overload(#[from] CapacityViolation),

    #[error("Source configuration violates {0} placement rule(s)")]
    Violations(usize),

    #[error("Invalid log directive: {0}")]
    LogDirective(String),
}

pub type CliResult<T> = Result<T, CliError>;
