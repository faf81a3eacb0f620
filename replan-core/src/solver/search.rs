//! Depth-first search
//!
//! Binary branching: a decision `x = v` is tried first, its refutation `x ≠ v` on
//! backtrack. Each decision opens a world on the trail; backtracking pops it. The loop is
//! iterative, with an explicit decision stack.

use std::time::{Duration, Instant};

use tracing::{debug, instrument};

use crate::solver::propagation::Solver;
use crate::solver::store::{Store, VarId};
use crate::solver::Contradiction;

/// Variable and value selection
pub trait Brancher {
    /// Next decision, or `None` to let the engine fall back on the first unfixed
    /// variable and its smallest value
    fn next_decision(&mut self, store: &Store) -> Option<(VarId, i64)>;
}

/// Variables in the given order, smallest value first
#[derive(Debug, Clone)]
pub struct InputOrder {
    vars: Vec<VarId>,
}

impl InputOrder {
    pub fn new(vars: Vec<VarId>) -> Self {
        Self { vars }
    }
}

impl Brancher for InputOrder {
    fn next_decision(&mut self, store: &Store) -> Option<(VarId, i64)> {
        self.vars
            .iter()
            .find(|v| !store.is_fixed(**v))
            .map(|v| (*v, store.lb(*v)))
    }
}

/// What the search looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Stop at the first solution
    Satisfy,
    /// Branch and bound, each solution strictly cheaper than the previous one
    Minimize(VarId),
    /// Enumerate and count every solution
    Enumerate,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchLimits {
    pub max_nodes: Option<u64>,
    pub timeout: Option<Duration>,
}

impl SearchLimits {
    pub fn new(max_nodes: u64, timeout: Duration) -> Self {
        Self {
            max_nodes: Some(max_nodes),
            timeout: Some(timeout),
        }
    }

    pub fn unlimited() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub backtracks: u64,
    pub failures: u64,
    pub solutions: u64,
    pub elapsed: Duration,
}

/// Value of every variable in a solution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    values: Vec<i64>,
}

impl Solution {
    fn capture(store: &Store) -> Self {
        Self {
            values: store.vars().map(|v| store.lb(v)).collect(),
        }
    }

    pub fn value(&self, var: VarId) -> i64 {
        self.values[var.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// The search space was explored as far as the objective requires
    Complete,
    /// The node or time budget ran out
    LimitReached,
    /// Propagation failed before any decision
    RootFailure(Contradiction),
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    /// Last solution found; the cheapest one when minimizing
    pub best: Option<Solution>,
    pub stats: SearchStats,
}

#[derive(Debug, Clone, Copy)]
struct Decision {
    var: VarId,
    value: i64,
    refuted: bool,
}

pub struct Search<'a, B> {
    solver: &'a mut Solver,
    brancher: B,
    objective: Objective,
    limits: SearchLimits,
}

impl<'a, B: Brancher> Search<'a, B> {
    pub fn new(solver: &'a mut Solver, brancher: B, objective: Objective) -> Self {
        Self {
            solver,
            brancher,
            objective,
            limits: SearchLimits::unlimited(),
        }
    }

    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Explore the search space; the store is left as it was on entry
    #[instrument(skip_all)]
    pub fn run(mut self) -> SearchOutcome {
        let started = Instant::now();
        let base_depth = self.solver.world_depth();
        let mut stats = SearchStats::default();
        let mut best = None;
        let mut bound = None;
        let mut stack: Vec<Decision> = Vec::new();

        self.solver.push_world();
        let status = match self.solver.propagate() {
            Err(contradiction) => SearchStatus::RootFailure(contradiction),
            Ok(()) => loop {
                if self.limit_reached(&stats, started) {
                    break SearchStatus::LimitReached;
                }
                let decision = self
                    .brancher
                    .next_decision(self.solver.store())
                    .filter(|(var, value)| {
                        !self.solver.store().is_fixed(*var)
                            && self.solver.store().contains(*var, *value)
                    })
                    .or_else(|| {
                        let store = self.solver.store();
                        store.first_unfixed().map(|var| (var, store.lb(var)))
                    });

                let consistent = match decision {
                    Some((var, value)) => {
                        stats.nodes += 1;
                        self.solver.push_world();
                        stack.push(Decision {
                            var,
                            value,
                            refuted: false,
                        });
                        self.apply(|store| store.instantiate(var, value).map(|_| ()), bound)
                    }
                    None => {
                        stats.solutions += 1;
                        let solution = Solution::capture(self.solver.store());
                        match self.objective {
                            Objective::Satisfy => {
                                best = Some(solution);
                                break SearchStatus::Complete;
                            }
                            Objective::Minimize(cost) => {
                                let value = solution.value(cost);
                                debug!(cost = value, nodes = stats.nodes, "Improving solution");
                                bound = Some(value - 1);
                                best = Some(solution);
                            }
                            Objective::Enumerate => {
                                best.get_or_insert(solution);
                            }
                        }
                        false
                    }
                };

                if !consistent && !self.backtrack(&mut stack, &mut stats, bound) {
                    break SearchStatus::Complete;
                }
            },
        };

        while self.solver.world_depth() > base_depth {
            self.solver.pop_world();
        }
        stats.elapsed = started.elapsed();
        debug!(
            nodes = stats.nodes,
            backtracks = stats.backtracks,
            failures = stats.failures,
            solutions = stats.solutions,
            elapsed = ?stats.elapsed,
            status = ?status,
            "Search finished"
        );
        SearchOutcome {
            status,
            best,
            stats,
        }
    }

    fn limit_reached(&self, stats: &SearchStats, started: Instant) -> bool {
        self.limits.max_nodes.map_or(false, |max| stats.nodes >= max)
            || self
                .limits
                .timeout
                .map_or(false, |timeout| started.elapsed() >= timeout)
    }

    /// Apply a domain operation, the objective bound, then propagate
    fn apply(
        &mut self,
        op: impl FnOnce(&mut Store) -> Result<(), Contradiction>,
        bound: Option<i64>,
    ) -> bool {
        let result = op(self.solver.store_mut()).and_then(|()| {
            if let (Objective::Minimize(cost), Some(bound)) = (self.objective, bound) {
                self.solver.store_mut().set_ub(cost, bound)?;
            }
            self.solver.propagate()
        });
        result.is_ok()
    }

    /// Undo decisions until a refutation is consistent; false once the tree is exhausted
    fn backtrack(
        &mut self,
        stack: &mut Vec<Decision>,
        stats: &mut SearchStats,
        bound: Option<i64>,
    ) -> bool {
        stats.failures += 1;
        while let Some(decision) = stack.pop() {
            self.solver.pop_world();
            if decision.refuted {
                continue;
            }
            stats.backtracks += 1;
            self.solver.push_world();
            stack.push(Decision {
                refuted: true,
                ..decision
            });
            let (var, value) = (decision.var, decision.value);
            if self.apply(|store| store.remove_value(var, value).map(|_| ()), bound) {
                return true;
            }
        }
        false
    }
}
