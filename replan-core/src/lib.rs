//! Reconfiguration planning for virtual machine clusters
//!
//! A [`Planner`] takes a source [`Configuration`], the [`TargetStates`] requested for some
//! of its elements and a set of [`PlacementConstraint`]s, and computes a timed
//! [`ReconfigurationPlan`] reaching a viable configuration. Plans are turned into an
//! [`ExecutionGraph`] for execution.

pub mod action;
pub mod config;
pub mod duration;
pub mod error;
pub mod graph;
pub mod model;
pub mod placement;
pub mod plan;
pub mod planner;
pub mod problem;
pub mod solver;

pub use action::{Action, ActionKind, ActionType};
pub use config::{HeuristicKind, PlannerConfig, PlannerConfigBuilder, SearchConfig, SearchMode};
pub use duration::{ConfiguredDurations, DurationError, DurationEvaluator, DurationTable};
pub use error::{ReplanError, ReplanResult};
pub use graph::{Agenda, Event, ExecutionGraph};
pub use model::{
    Configuration, ElementRef, Node, NodeId, NodeState, ResourceDimension, TargetStates,
    VirtualMachine, VmId, VmState,
};
pub use placement::PlacementConstraint;
pub use plan::{CapacityViolation, ReconfigurationPlan};
pub use planner::{Planner, PlanningRequest};
