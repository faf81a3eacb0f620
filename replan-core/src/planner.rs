//! Planning facade
//!
//! [`Planner`] runs one planning attempt end to end: model construction, search within
//! the configured budget, and plan assembly.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::PlannerConfig;
use crate::duration::{ConfiguredDurations, DurationEvaluator};
use crate::error::{ReplanError, ReplanResult};
use crate::model::{Configuration, TargetStates};
use crate::placement::PlacementConstraint;
use crate::plan::{assemble, ReconfigurationPlan};
use crate::problem::ReconfigurationProblem;
use crate::solver::{SearchOutcome, SearchStatus};

/// What to plan for
#[derive(Debug, Clone, Default)]
pub struct PlanningRequest {
    pub source: Configuration,
    pub targets: TargetStates,
    pub constraints: Vec<PlacementConstraint>,
}

impl PlanningRequest {
    pub fn new(source: Configuration) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    pub fn with_targets(mut self, targets: TargetStates) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_constraint(mut self, constraint: PlacementConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Planner {
    config: PlannerConfig,
    evaluator: Arc<dyn DurationEvaluator>,
}

impl Planner {
    pub fn new(config: PlannerConfig, evaluator: Arc<dyn DurationEvaluator>) -> Self {
        Self { config, evaluator }
    }

    /// Planner pricing actions with the configured durations
    pub fn with_config(config: PlannerConfig) -> Self {
        let evaluator = Arc::new(ConfiguredDurations::new(config.durations.clone()));
        Self::new(config, evaluator)
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Compute a plan reaching the requested targets under the placement constraints
    #[instrument(skip_all, fields(
        nodes = request.source.node_count(),
        vms = request.source.vm_count(),
        constraints = request.constraints.len(),
    ))]
    pub fn plan(&self, request: &PlanningRequest) -> ReplanResult<ReconfigurationPlan> {
        let mut problem = ReconfigurationProblem::build(
            &request.source,
            &request.targets,
            &request.constraints,
            self.evaluator.as_ref(),
            &self.config.model,
        )?;

        let SearchOutcome {
            status,
            best,
            stats,
        } = problem.solve(&self.config.search);

        match (best, status) {
            (Some(solution), status) => {
                let plan = assemble(&problem, &solution)?;
                info!(
                    actions = plan.len(),
                    duration = plan.duration(),
                    cost = solution.value(problem.cost()),
                    explored = stats.nodes,
                    proven = status == SearchStatus::Complete,
                    "Plan computed"
                );
                Ok(plan)
            }
            (None, SearchStatus::RootFailure(contradiction)) => Err(problem.explain(contradiction)),
            (None, SearchStatus::LimitReached) => {
                warn!(
                    explored = stats.nodes,
                    elapsed = ?stats.elapsed,
                    "Search budget exhausted before any plan"
                );
                Err(ReplanError::NoPlanFound {
                    explored: stats.nodes,
                    elapsed: stats.elapsed,
                })
            }
            (None, SearchStatus::Complete) => {
                let source = problem.source();
                Err(ReplanError::InfeasibleModel {
                    elements: problem
                        .displaced()
                        .iter()
                        .map(|vm| source.vm(*vm).name.clone())
                        .collect(),
                })
            }
        }
    }
}
