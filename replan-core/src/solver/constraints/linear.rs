//! Bound-consistent arithmetic over time and cost variables

use crate::solver::constraints::{entailed_when_fixed, Propagation};
use crate::solver::store::{Store, VarId};
use crate::solver::PropagationResult;

/// `y = x + d`
#[derive(Debug, Clone)]
pub struct Offset {
    x: VarId,
    d: VarId,
    y: VarId,
}

impl Offset {
    pub fn new(x: VarId, d: VarId, y: VarId) -> Self {
        Self { x, d, y }
    }

    pub(crate) fn vars(&self) -> Vec<VarId> {
        vec![self.x, self.d, self.y]
    }

    pub(crate) fn propagate(&self, store: &mut Store) -> PropagationResult {
        let (x, d, y) = (self.x, self.d, self.y);
        store.set_lb(y, store.lb(x) + store.lb(d))?;
        store.set_ub(y, store.ub(x) + store.ub(d))?;
        store.set_lb(x, store.lb(y) - store.ub(d))?;
        store.set_ub(x, store.ub(y) - store.lb(d))?;
        store.set_lb(d, store.lb(y) - store.ub(x))?;
        store.set_ub(d, store.ub(y) - store.lb(x))?;
        Ok(entailed_when_fixed(store, &[x, d, y]))
    }
}

/// `x + c ≤ y`
#[derive(Debug, Clone)]
pub struct Precedence {
    x: VarId,
    c: i64,
    y: VarId,
}

impl Precedence {
    pub fn new(x: VarId, c: i64, y: VarId) -> Self {
        Self { x, c, y }
    }

    pub(crate) fn vars(&self) -> Vec<VarId> {
        vec![self.x, self.y]
    }

    pub(crate) fn propagate(&self, store: &mut Store) -> PropagationResult {
        store.set_lb(self.y, store.lb(self.x) + self.c)?;
        store.set_ub(self.x, store.ub(self.y) - self.c)?;
        if store.ub(self.x) + self.c <= store.lb(self.y) {
            Ok(Propagation::Entailed)
        } else {
            Ok(Propagation::Active)
        }
    }
}

/// `guard = value ⇒ before ≤ after`
#[derive(Debug, Clone)]
pub struct GuardedPrecedence {
    guard: VarId,
    value: i64,
    before: VarId,
    after: VarId,
}

impl GuardedPrecedence {
    pub fn new(guard: VarId, value: i64, before: VarId, after: VarId) -> Self {
        Self {
            guard,
            value,
            before,
            after,
        }
    }

    pub(crate) fn vars(&self) -> Vec<VarId> {
        vec![self.guard, self.before, self.after]
    }

    pub(crate) fn propagate(&self, store: &mut Store) -> PropagationResult {
        if !store.contains(self.guard, self.value) {
            return Ok(Propagation::Entailed);
        }
        if store.lb(self.before) > store.ub(self.after) {
            store.remove_value(self.guard, self.value)?;
            return Ok(Propagation::Entailed);
        }
        if store.value(self.guard) == Some(self.value) {
            return Precedence::new(self.before, 0, self.after).propagate(store);
        }
        Ok(Propagation::Active)
    }
}

/// `total = Σ xs`
#[derive(Debug, Clone)]
pub struct Sum {
    xs: Vec<VarId>,
    total: VarId,
}

impl Sum {
    pub fn new(xs: Vec<VarId>, total: VarId) -> Self {
        Self { xs, total }
    }

    pub(crate) fn vars(&self) -> Vec<VarId> {
        let mut vars = self.xs.clone();
        vars.push(self.total);
        vars
    }

    pub(crate) fn propagate(&self, store: &mut Store) -> PropagationResult {
        let sum_lb: i64 = self.xs.iter().map(|x| store.lb(*x)).sum();
        let sum_ub: i64 = self.xs.iter().map(|x| store.ub(*x)).sum();
        store.set_lb(self.total, sum_lb)?;
        store.set_ub(self.total, sum_ub)?;

        let (total_lb, total_ub) = (store.lb(self.total), store.ub(self.total));
        for x in &self.xs {
            let (lb, ub) = (store.lb(*x), store.ub(*x));
            store.set_ub(*x, total_ub - (sum_lb - lb))?;
            store.set_lb(*x, total_lb - (sum_ub - ub))?;
        }

        if store.is_fixed(self.total) && self.xs.iter().all(|x| store.is_fixed(*x)) {
            Ok(Propagation::Entailed)
        } else {
            Ok(Propagation::Active)
        }
    }
}
