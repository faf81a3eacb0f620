//! Search heuristics for reconfiguration problems
//!
//! [`PlanBrancher`] chains the phases listed in the search configuration. Each phase
//! proposes a decision on its own variables and yields to the next one once they are all
//! fixed; the engine takes over when every phase is done.

use rustc_hash::FxHashSet;

use crate::config::HeuristicKind;
use crate::model::NodeId;
use crate::problem::{ActionModel, DemandingSlice, ReconfigurationProblem};
use crate::solver::{Brancher, Store, VarId};

/// Residual capacity view of one node, keyed by its hoster value
#[derive(Debug, Clone)]
struct NodeLoad {
    value: i64,
    loads: Vec<VarId>,
    capacities: Vec<i64>,
}

#[derive(Debug, Clone)]
struct HosterVar {
    hoster: VarId,
    /// Node tried before any other
    preferred: Option<i64>,
    slice: Option<DemandingSlice>,
}

impl HosterVar {
    fn of(model: &ActionModel, preferred: Option<NodeId>) -> Option<Self> {
        Some(Self {
            hoster: model.hoster()?,
            preferred: preferred.map(|n| n.0 as i64),
            slice: model.demanding().cloned(),
        })
    }
}

#[derive(Debug, Clone)]
enum Phase {
    Hosters(Vec<HosterVar>),
    EarliestStart(Vec<VarId>),
}

#[derive(Debug, Clone)]
pub struct PlanBrancher {
    phases: Vec<Phase>,
    nodes: Vec<NodeLoad>,
}

impl PlanBrancher {
    pub fn new(problem: &ReconfigurationProblem, pipeline: &[HeuristicKind]) -> Self {
        let nodes = problem
            .nodes()
            .iter()
            .map(|n| NodeLoad {
                value: n.node.0 as i64,
                loads: n.loads.to_vec(),
                capacities: n.capacities.to_vec(),
            })
            .collect();

        let displaced: FxHashSet<_> = problem.displaced().iter().copied().collect();
        let phases = pipeline
            .iter()
            .map(|kind| match kind {
                HeuristicKind::DisplacedFirst => Phase::Hosters(
                    problem
                        .displaced()
                        .iter()
                        .filter_map(|vm| HosterVar::of(problem.associated_action(*vm), None))
                        .collect(),
                ),
                HeuristicKind::AssignmentFirst => Phase::Hosters(
                    problem
                        .future_runnings()
                        .iter()
                        .filter(|vm| !displaced.contains(*vm))
                        .filter_map(|vm| {
                            let model = problem.associated_action(*vm);
                            match model {
                                ActionModel::Run { .. } => HosterVar::of(model, None),
                                ActionModel::Resume { source, .. } => {
                                    HosterVar::of(model, Some(*source))
                                }
                                _ => None,
                            }
                        })
                        .collect(),
                ),
                HeuristicKind::StayFirst => Phase::Hosters(
                    problem
                        .future_runnings()
                        .iter()
                        .filter_map(|vm| {
                            let model = problem.associated_action(*vm);
                            HosterVar::of(model, model.source())
                        })
                        .collect(),
                ),
                HeuristicKind::EarliestStart => Phase::EarliestStart(
                    problem
                        .action_models()
                        .filter_map(ActionModel::start)
                        .collect(),
                ),
            })
            .collect();

        Self { phases, nodes }
    }

    /// Node able to take the slice with the largest residual CPU, then memory; lowest
    /// index on ties
    fn worst_fit(&self, store: &Store, var: &HosterVar) -> Option<i64> {
        let mut best: Option<(i64, Vec<i64>)> = None;
        for node in &self.nodes {
            let fits = match &var.slice {
                Some(slice) => slice.can_host_at(store, NodeId(node.value as u32), &node.loads),
                None => store.contains(var.hoster, node.value),
            };
            if !fits {
                continue;
            }
            let residual: Vec<i64> = node
                .loads
                .iter()
                .zip(&node.capacities)
                .map(|(load, capacity)| capacity - store.lb(*load))
                .collect();
            if best.as_ref().map_or(true, |(_, r)| residual > *r) {
                best = Some((node.value, residual));
            }
        }
        best.map(|(value, _)| value)
    }

    fn hoster_decision(&self, store: &Store, vars: &[HosterVar]) -> Option<(VarId, i64)> {
        let var = vars.iter().find(|v| !store.is_fixed(v.hoster))?;
        let value = var
            .preferred
            .filter(|node| store.contains(var.hoster, *node))
            .or_else(|| self.worst_fit(store, var))
            .unwrap_or_else(|| store.lb(var.hoster));
        Some((var.hoster, value))
    }
}

impl Brancher for PlanBrancher {
    fn next_decision(&mut self, store: &Store) -> Option<(VarId, i64)> {
        self.phases.iter().find_map(|phase| match phase {
            Phase::Hosters(vars) => self.hoster_decision(store, vars),
            Phase::EarliestStart(starts) => starts
                .iter()
                .filter(|s| !store.is_fixed(**s))
                .min_by_key(|s| store.lb(**s))
                .map(|s| (*s, store.lb(*s))),
        })
    }
}
