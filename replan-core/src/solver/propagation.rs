//! Propagation engine
//!
//! Constraints are woken through per-variable watcher lists and run from a FIFO queue
//! until nothing changes. A constraint reporting [`Propagation::Entailed`] is skipped
//! until the world that entailed it is popped.

use std::collections::VecDeque;

use smallvec::SmallVec;
use tracing::trace;

use crate::solver::constraints::{Constraint, ConstraintId, Propagation};
use crate::solver::store::{StoredId, Store, VarId};
use crate::solver::Contradiction;

#[derive(Debug, Default)]
pub struct Solver {
    store: Store,
    constraints: Vec<Constraint>,
    entailed: Vec<StoredId>,
    watchers: Vec<SmallVec<[ConstraintId; 4]>>,
    queue: VecDeque<ConstraintId>,
    queued: Vec<bool>,
    propagations: u64,
}

impl Solver {
    pub fn new() -> Self {
        Self {
            store: Store::new(),
            ..Self::default()
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Direct access for model construction and branching decisions
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn constraint(&self, id: ConstraintId) -> &Constraint {
        &self.constraints[id.index()]
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Number of constraint executions so far
    pub fn propagations(&self) -> u64 {
        self.propagations
    }

    /// Register a constraint; it runs at the next call to [`Solver::propagate`]
    pub fn post(&mut self, constraint: impl Into<Constraint>) -> ConstraintId {
        let constraint = constraint.into();
        let id = ConstraintId(self.constraints.len() as u32);
        for var in constraint.vars() {
            let idx = var.index();
            if self.watchers.len() <= idx {
                self.watchers.resize_with(idx + 1, SmallVec::new);
            }
            if !self.watchers[idx].contains(&id) {
                self.watchers[idx].push(id);
            }
        }
        self.constraints.push(constraint);
        self.entailed.push(self.store.new_stored(0));
        self.queued.push(false);
        self.enqueue(id);
        id
    }

    pub fn is_entailed(&self, id: ConstraintId) -> bool {
        self.store.stored(self.entailed[id.index()]) != 0
    }

    fn enqueue(&mut self, id: ConstraintId) {
        if !self.queued[id.index()] {
            self.queued[id.index()] = true;
            self.queue.push_back(id);
        }
    }

    fn schedule_touched(&mut self) {
        let touched = self.store.take_touched();
        for var in &touched {
            if let Some(watchers) = self.watchers.get(var.index()) {
                for id in watchers.clone() {
                    self.enqueue(id);
                }
            }
        }
        self.store.recycle_touched(touched);
    }

    fn clear_queue(&mut self) {
        for id in self.queue.drain(..) {
            self.queued[id.index()] = false;
        }
        self.store.clear_touched();
    }

    /// Run the woken constraints to a fix-point
    pub fn propagate(&mut self) -> Result<(), Contradiction> {
        self.schedule_touched();
        while let Some(id) = self.queue.pop_front() {
            self.queued[id.index()] = false;
            if self.is_entailed(id) {
                continue;
            }
            self.propagations += 1;
            match self.constraints[id.index()].propagate(&mut self.store) {
                Ok(Propagation::Entailed) => {
                    let flag = self.entailed[id.index()];
                    self.store.set_stored(flag, 1);
                }
                Ok(Propagation::Active) => {}
                Err(contradiction) => {
                    trace!(
                        constraint = self.constraints[id.index()].name(),
                        cause = ?contradiction.cause,
                        "Propagation failed"
                    );
                    self.clear_queue();
                    return Err(contradiction.in_constraint(id));
                }
            }
            self.schedule_touched();
        }
        Ok(())
    }

    pub fn push_world(&mut self) {
        self.store.push_world();
    }

    pub fn pop_world(&mut self) {
        self.clear_queue();
        self.store.pop_world();
    }

    pub fn world_depth(&self) -> usize {
        self.store.world_depth()
    }

    /// Constraints watching a variable
    pub fn watchers(&self, var: VarId) -> &[ConstraintId] {
        self.watchers
            .get(var.index())
            .map(|w| w.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::constraints::{Offset, Precedence, ReifiedEq};
    use crate::solver::store::VarKind;
    use crate::solver::Cause;

    #[test]
    fn test_propagation_reaches_fix_point() {
        let mut solver = Solver::new();
        let s = solver.store_mut();
        let a = s.new_interval("a", VarKind::Time, 0, 20);
        let b = s.new_interval("b", VarKind::Time, 0, 20);
        let c = s.new_interval("c", VarKind::Time, 0, 20);
        let d = s.new_constant("d", VarKind::Duration, 4);
        solver.post(Offset::new(a, d, b));
        solver.post(Precedence::new(b, 3, c));
        solver.propagate().unwrap();
        assert_eq!(solver.store().lb(c), 7);
        assert_eq!(solver.store().ub(a), 13);

        solver.push_world();
        solver.store_mut().set_lb(a, 10).unwrap();
        solver.propagate().unwrap();
        assert_eq!(solver.store().lb(c), 17);
        solver.pop_world();
        assert_eq!(solver.store().lb(c), 7);
    }

    #[test]
    fn test_entailment_is_undone_on_backtrack() {
        let mut solver = Solver::new();
        let s = solver.store_mut();
        let b = s.new_bool("b");
        let x = s.new_interval("x", VarKind::Hoster, 0, 3);
        let id = solver.post(ReifiedEq::new(b, x, 2));
        solver.propagate().unwrap();
        assert!(!solver.is_entailed(id));

        solver.push_world();
        solver.store_mut().instantiate(b, 1).unwrap();
        solver.propagate().unwrap();
        assert_eq!(solver.store().value(x), Some(2));
        assert!(solver.is_entailed(id));
        solver.pop_world();
        assert!(!solver.is_entailed(id));

        solver.push_world();
        solver.store_mut().remove_value(x, 2).unwrap();
        solver.propagate().unwrap();
        assert_eq!(solver.store().value(b), Some(0));
        solver.pop_world();
    }

    #[test]
    fn test_failure_names_the_constraint() {
        let mut solver = Solver::new();
        let s = solver.store_mut();
        let x = s.new_interval("x", VarKind::Time, 5, 10);
        let y = s.new_interval("y", VarKind::Time, 0, 10);
        let id = solver.post(Precedence::new(x, 6, y));
        let err = solver.propagate().unwrap_err();
        assert_eq!(err.constraint, Some(id));
        assert_eq!(err.cause, Cause::HorizonExceeded);
    }
}
