//! Error types for the planning engine
//!
//! Every failure of a planning attempt is reported through [`ReplanError`]. Solver
//! contradictions are not part of this taxonomy: they are recovered by backtracking
//! inside [`crate::solver`] and never cross the search boundary.

use std::time::Duration;

use thiserror::Error;

use crate::action::ActionType;
use crate::duration::DurationError;

/// Failure of a planning attempt
///
/// # Error Categories
///
/// - **Model errors**: the constraint model has no solution (`InfeasibleModel`) or a slice
///   bound overflows the planning horizon (`DomainExhausted`)
/// - **Search errors**: the budget expired before any plan was found (`NoPlanFound`)
/// - **Input errors**: unknown or duplicated elements, unsupported state transitions,
///   inconsistent configurations, duration evaluation failures
/// - **Plan errors**: merging plans that touch the same element (`PlanConflict`) or
///   applying an action whose precondition does not hold (`InvalidOperation`)
#[derive(Error, Debug)]
pub enum ReplanError {
    // Model errors
    #[error("Infeasible model: no plan can satisfy the constraints (offending elements: {})", format_elements(.elements))]
    InfeasibleModel { elements: Vec<String> },

    #[error("Domain exhausted: slice '{slice}' does not fit in the planning horizon {horizon}")]
    DomainExhausted { slice: String, horizon: u64 },

    // Search errors
    #[error("No plan found after exploring {explored} nodes in {elapsed:?}")]
    NoPlanFound { explored: u64, elapsed: Duration },

    // Input errors
    #[error("Unable to evaluate the duration of {action} on '{element}'")]
    DurationEvaluation {
        action: ActionType,
        element: String,
        #[source]
        source: DurationError,
    },

    #[error("Unsupported transition for VM '{vm}': {from} -> {to}")]
    UnsupportedTransition {
        vm: String,
        from: String,
        to: String,
    },

    #[error("Unknown element: {0}")]
    UnknownElement(String),

    #[error("Duplicate element: {0}")]
    DuplicateElement(String),

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    // Plan errors
    #[error("Plan conflict: both plans act on {}", format_elements(.elements))]
    PlanConflict { elements: Vec<String> },

    #[error("Invalid operation '{operation}': {reason}")]
    InvalidOperation { operation: String, reason: String },

    // Settings
    #[error("Configuration error in {component}: {message}")]
    ConfigurationError { component: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type ReplanResult<T> = std::result::Result<T, ReplanError>;

impl ReplanError {
    /// Create a settings error for the given component
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        ReplanError::ConfigurationError {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an invalid operation error
    pub fn invalid_operation(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        ReplanError::InvalidOperation {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Whether a caller may reasonably retry the same request with a larger budget
    pub fn is_budget_related(&self) -> bool {
        matches!(self, ReplanError::NoPlanFound { .. })
    }
}

fn format_elements(elements: &[String]) -> String {
    if elements.is_empty() {
        "unknown".to_string()
    } else {
        elements.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infeasible_model_lists_elements() {
        let err = ReplanError::InfeasibleModel {
            elements: vec!["vm1".to_string(), "n2".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Infeasible model: no plan can satisfy the constraints (offending elements: vm1, n2)"
        );

        let err = ReplanError::InfeasibleModel { elements: vec![] };
        assert!(err.to_string().ends_with("(offending elements: unknown)"));
    }

    #[test]
    fn test_only_no_plan_found_is_budget_related() {
        let err = ReplanError::NoPlanFound {
            explored: 10,
            elapsed: Duration::from_millis(5),
        };
        assert!(err.is_budget_related());
        assert!(!ReplanError::InfeasibleModel { elements: vec![] }.is_budget_related());
    }
}
