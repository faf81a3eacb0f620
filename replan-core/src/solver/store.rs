//! Variable store with a backtrackable trail
//!
//! Every modification records the previous domain the first time a variable changes in
//! a world, so popping a world restores exactly the state it was pushed on.

use crate::solver::domain::IntDomain;
use crate::solver::{Cause, Contradiction};

/// Handle of a solver variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub(crate) u32);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle of a trailed integer that is not a variable (e.g. an entailment flag)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoredId(u32);

/// Role of a variable, used to qualify failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// Node index a VM is assigned to
    Hoster,
    /// Instant bounded by the planning horizon
    Time,
    Duration,
    Load,
    Bool,
    Cost,
    Other,
}

#[derive(Debug, Clone)]
enum TrailEntry {
    Domain {
        var: VarId,
        previous: IntDomain,
        saved_at: u32,
    },
    Stored {
        id: StoredId,
        previous: i64,
        saved_at: u32,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Store {
    domains: Vec<IntDomain>,
    kinds: Vec<VarKind>,
    labels: Vec<String>,
    initial_ub: Vec<i64>,
    saved_at: Vec<u32>,
    stored: Vec<i64>,
    stored_saved_at: Vec<u32>,
    trail: Vec<TrailEntry>,
    /// Trail length and stamp of every open world
    worlds: Vec<(usize, u32)>,
    last_stamp: u32,
    touched: Vec<VarId>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a variable over the given domain
    pub fn new_var(&mut self, label: impl Into<String>, kind: VarKind, domain: IntDomain) -> VarId {
        let id = VarId(self.domains.len() as u32);
        self.initial_ub.push(domain.ub());
        self.domains.push(domain);
        self.kinds.push(kind);
        self.labels.push(label.into());
        self.saved_at.push(0);
        id
    }

    pub fn new_interval(
        &mut self,
        label: impl Into<String>,
        kind: VarKind,
        lb: i64,
        ub: i64,
    ) -> VarId {
        self.new_var(label, kind, IntDomain::interval(lb, ub))
    }

    pub fn new_bool(&mut self, label: impl Into<String>) -> VarId {
        self.new_var(label, VarKind::Bool, IntDomain::interval(0, 1))
    }

    pub fn new_constant(&mut self, label: impl Into<String>, kind: VarKind, value: i64) -> VarId {
        self.new_var(label, kind, IntDomain::singleton(value))
    }

    pub fn new_stored(&mut self, value: i64) -> StoredId {
        let id = StoredId(self.stored.len() as u32);
        self.stored.push(value);
        self.stored_saved_at.push(0);
        id
    }

    pub fn var_count(&self) -> usize {
        self.domains.len()
    }

    pub fn vars(&self) -> impl Iterator<Item = VarId> {
        (0..self.domains.len() as u32).map(VarId)
    }

    pub fn domain(&self, var: VarId) -> &IntDomain {
        &self.domains[var.index()]
    }

    pub fn lb(&self, var: VarId) -> i64 {
        self.domains[var.index()].lb()
    }

    pub fn ub(&self, var: VarId) -> i64 {
        self.domains[var.index()].ub()
    }

    pub fn size(&self, var: VarId) -> u64 {
        self.domains[var.index()].size()
    }

    pub fn is_fixed(&self, var: VarId) -> bool {
        self.domains[var.index()].is_fixed()
    }

    pub fn value(&self, var: VarId) -> Option<i64> {
        self.domains[var.index()].value()
    }

    pub fn contains(&self, var: VarId, value: i64) -> bool {
        self.domains[var.index()].contains(value)
    }

    pub fn values(&self, var: VarId) -> impl Iterator<Item = i64> + '_ {
        self.domains[var.index()].iter()
    }

    pub fn label(&self, var: VarId) -> &str {
        &self.labels[var.index()]
    }

    pub fn kind(&self, var: VarId) -> VarKind {
        self.kinds[var.index()]
    }

    /// Upper bound the variable was created with
    pub fn initial_ub(&self, var: VarId) -> i64 {
        self.initial_ub[var.index()]
    }

    pub fn first_unfixed(&self) -> Option<VarId> {
        self.vars().find(|var| !self.is_fixed(*var))
    }

    pub fn all_fixed(&self) -> bool {
        self.first_unfixed().is_none()
    }

    pub fn stored(&self, id: StoredId) -> i64 {
        self.stored[id.0 as usize]
    }

    pub fn set_stored(&mut self, id: StoredId, value: i64) {
        let idx = id.0 as usize;
        if self.stored[idx] == value {
            return;
        }
        if let Some(stamp) = self.current_stamp() {
            if self.stored_saved_at[idx] != stamp {
                self.trail.push(TrailEntry::Stored {
                    id,
                    previous: self.stored[idx],
                    saved_at: self.stored_saved_at[idx],
                });
                self.stored_saved_at[idx] = stamp;
            }
        }
        self.stored[idx] = value;
    }

    pub fn set_lb(&mut self, var: VarId, value: i64) -> Result<bool, Contradiction> {
        if value <= self.lb(var) {
            return Ok(false);
        }
        self.update(var, value, |domain| domain.set_lb(value))
    }

    pub fn set_ub(&mut self, var: VarId, value: i64) -> Result<bool, Contradiction> {
        if value >= self.ub(var) {
            return Ok(false);
        }
        self.update(var, value, |domain| domain.set_ub(value))
    }

    pub fn remove_value(&mut self, var: VarId, value: i64) -> Result<bool, Contradiction> {
        if !self.contains(var, value) {
            return Ok(false);
        }
        self.update(var, value, |domain| domain.remove(value))
    }

    pub fn instantiate(&mut self, var: VarId, value: i64) -> Result<bool, Contradiction> {
        if self.value(var) == Some(value) {
            return Ok(false);
        }
        self.update(var, value, |domain| domain.instantiate(value))
    }

    /// Keep only the values accepted by `keep`
    pub fn restrict(
        &mut self,
        var: VarId,
        mut keep: impl FnMut(i64) -> bool,
    ) -> Result<bool, Contradiction> {
        let rejected: Vec<i64> = self.values(var).filter(|v| !keep(*v)).collect();
        let mut changed = false;
        for value in rejected {
            changed |= self.remove_value(var, value)?;
        }
        Ok(changed)
    }

    fn update(
        &mut self,
        var: VarId,
        value: i64,
        op: impl FnOnce(&mut IntDomain) -> Result<bool, crate::solver::domain::EmptyDomain>,
    ) -> Result<bool, Contradiction> {
        self.save(var);
        match op(&mut self.domains[var.index()]) {
            Ok(true) => {
                self.touched.push(var);
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(_) => Err(self.failure(var, value)),
        }
    }

    fn failure(&self, var: VarId, value: i64) -> Contradiction {
        let cause = if self.kind(var) == VarKind::Time && value > self.initial_ub(var) {
            Cause::HorizonExceeded
        } else {
            Cause::EmptyDomain
        };
        Contradiction::on_var(var, cause)
    }

    fn save(&mut self, var: VarId) {
        let Some(stamp) = self.current_stamp() else {
            return;
        };
        let idx = var.index();
        if self.saved_at[idx] != stamp {
            self.trail.push(TrailEntry::Domain {
                var,
                previous: self.domains[idx].clone(),
                saved_at: self.saved_at[idx],
            });
            self.saved_at[idx] = stamp;
        }
    }

    fn current_stamp(&self) -> Option<u32> {
        self.worlds.last().map(|(_, stamp)| *stamp)
    }

    /// Open a checkpoint
    pub fn push_world(&mut self) {
        self.last_stamp += 1;
        self.worlds.push((self.trail.len(), self.last_stamp));
    }

    /// Undo every modification since the matching `push_world`
    pub fn pop_world(&mut self) {
        let Some((mark, _)) = self.worlds.pop() else {
            return;
        };
        while self.trail.len() > mark {
            match self.trail.pop() {
                Some(TrailEntry::Domain {
                    var,
                    previous,
                    saved_at,
                }) => {
                    self.domains[var.index()] = previous;
                    self.saved_at[var.index()] = saved_at;
                }
                Some(TrailEntry::Stored {
                    id,
                    previous,
                    saved_at,
                }) => {
                    self.stored[id.0 as usize] = previous;
                    self.stored_saved_at[id.0 as usize] = saved_at;
                }
                None => break,
            }
        }
        self.touched.clear();
    }

    pub fn world_depth(&self) -> usize {
        self.worlds.len()
    }

    pub(crate) fn take_touched(&mut self) -> Vec<VarId> {
        std::mem::take(&mut self.touched)
    }

    pub(crate) fn recycle_touched(&mut self, mut buffer: Vec<VarId>) {
        buffer.clear();
        if self.touched.is_empty() {
            self.touched = buffer;
        }
    }

    pub(crate) fn clear_touched(&mut self) {
        self.touched.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_world_restores_domains() {
        let mut store = Store::new();
        let x = store.new_interval("x", VarKind::Other, 0, 10);
        let flag = store.new_stored(0);

        store.push_world();
        store.set_lb(x, 3).unwrap();
        store.remove_value(x, 5).unwrap();
        store.set_stored(flag, 1);

        store.push_world();
        store.instantiate(x, 7).unwrap();
        assert_eq!(store.value(x), Some(7));
        store.pop_world();

        assert_eq!(store.lb(x), 3);
        assert!(!store.contains(x, 5));
        assert_eq!(store.stored(flag), 1);

        store.pop_world();
        assert_eq!(store.lb(x), 0);
        assert!(store.contains(x, 5));
        assert_eq!(store.stored(flag), 0);
    }

    #[test]
    fn test_sibling_worlds_are_saved_independently() {
        let mut store = Store::new();
        let x = store.new_interval("x", VarKind::Other, 0, 10);
        store.push_world();
        store.set_ub(x, 8).unwrap();
        store.pop_world();
        store.push_world();
        store.set_ub(x, 6).unwrap();
        store.set_ub(x, 4).unwrap();
        store.pop_world();
        assert_eq!(store.ub(x), 10);
    }

    #[test]
    fn test_time_variable_beyond_horizon() {
        let mut store = Store::new();
        let t = store.new_interval("t", VarKind::Time, 0, 5);
        let c = store.set_lb(t, 6).unwrap_err();
        assert_eq!(c.cause, Cause::HorizonExceeded);
        assert_eq!(c.var, Some(t));

        let d = store.new_interval("d", VarKind::Duration, 0, 5);
        assert_eq!(store.set_lb(d, 6).unwrap_err().cause, Cause::EmptyDomain);
    }
}
