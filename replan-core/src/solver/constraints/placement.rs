//! Constraints over hoster variables used by placement rules

use std::collections::BTreeSet;

use smallvec::SmallVec;

use crate::solver::constraints::{entailed_when_fixed, Propagation};
use crate::solver::store::{Store, VarId};
use crate::solver::{Cause, Contradiction, PropagationResult};

/// Pairwise distinct values, by forward checking
#[derive(Debug, Clone)]
pub struct AllDifferent {
    vars: Vec<VarId>,
}

impl AllDifferent {
    pub fn new(vars: Vec<VarId>) -> Self {
        Self { vars }
    }

    pub(crate) fn vars(&self) -> Vec<VarId> {
        self.vars.clone()
    }

    pub(crate) fn propagate(&self, store: &mut Store) -> PropagationResult {
        let mut seen = BTreeSet::new();
        loop {
            // A removal can fix a variable already visited in this pass
            let mut again = false;
            for (i, var) in self.vars.iter().enumerate() {
                let Some(value) = store.value(*var) else {
                    continue;
                };
                if !seen.insert((i, value)) {
                    continue;
                }
                for (j, other) in self.vars.iter().enumerate() {
                    if i != j && store.remove_value(*other, value)? && store.is_fixed(*other) {
                        again |= j < i;
                    }
                }
            }
            if !again {
                break;
            }
        }
        Ok(entailed_when_fixed(store, &self.vars))
    }
}

/// Every variable takes the same value
#[derive(Debug, Clone)]
pub struct AllEqual {
    vars: Vec<VarId>,
}

impl AllEqual {
    pub fn new(vars: Vec<VarId>) -> Self {
        Self { vars }
    }

    pub(crate) fn vars(&self) -> Vec<VarId> {
        self.vars.clone()
    }

    pub(crate) fn propagate(&self, store: &mut Store) -> PropagationResult {
        let Some(smallest) = self.vars.iter().min_by_key(|v| store.size(**v)) else {
            return Ok(Propagation::Entailed);
        };
        let common: BTreeSet<i64> = store
            .values(*smallest)
            .filter(|value| self.vars.iter().all(|v| store.contains(*v, *value)))
            .collect();
        if common.is_empty() {
            return Err(Contradiction::on_var(*smallest, Cause::Inconsistent));
        }
        for var in &self.vars {
            store.restrict(*var, |value| common.contains(&value))?;
        }
        Ok(entailed_when_fixed(store, &self.vars))
    }
}

/// All variables take their values in one of the groups; `selector` is the group index
#[derive(Debug, Clone)]
pub struct Among {
    vars: Vec<VarId>,
    groups: Vec<BTreeSet<i64>>,
    selector: VarId,
}

impl Among {
    pub fn new(vars: Vec<VarId>, groups: Vec<BTreeSet<i64>>, selector: VarId) -> Self {
        Self {
            vars,
            groups,
            selector,
        }
    }

    pub(crate) fn vars(&self) -> Vec<VarId> {
        let mut vars = self.vars.clone();
        vars.push(self.selector);
        vars
    }

    pub(crate) fn propagate(&self, store: &mut Store) -> PropagationResult {
        let candidates: SmallVec<[i64; 8]> = store.values(self.selector).collect();
        for g in candidates {
            let Some(group) = usize::try_from(g).ok().and_then(|g| self.groups.get(g)) else {
                store.remove_value(self.selector, g)?;
                continue;
            };
            let reachable = self.vars.iter().all(|var| {
                store.values(*var).any(|value| group.contains(&value))
            });
            if !reachable {
                store.remove_value(self.selector, g)?;
            }
        }

        if let Some(g) = store.value(self.selector) {
            let group = &self.groups[g as usize];
            for var in &self.vars {
                store.restrict(*var, |value| group.contains(&value))?;
            }
            return Ok(entailed_when_fixed(store, &self.vars));
        }
        Ok(Propagation::Active)
    }
}

/// At most `max` variables take a value of the set
#[derive(Debug, Clone)]
pub struct AtMost {
    vars: Vec<VarId>,
    values: BTreeSet<i64>,
    max: usize,
}

impl AtMost {
    pub fn new(vars: Vec<VarId>, values: BTreeSet<i64>, max: usize) -> Self {
        Self { vars, values, max }
    }

    pub(crate) fn vars(&self) -> Vec<VarId> {
        self.vars.clone()
    }

    pub(crate) fn propagate(&self, store: &mut Store) -> PropagationResult {
        let certain = self
            .vars
            .iter()
            .filter(|var| store.values(**var).all(|v| self.values.contains(&v)))
            .count();
        if certain > self.max {
            return Err(Contradiction::new(Cause::Overload));
        }
        if certain == self.max {
            for var in &self.vars {
                let inside = store.values(*var).all(|v| self.values.contains(&v));
                if !inside {
                    store.restrict(*var, |v| !self.values.contains(&v))?;
                }
            }
            return Ok(Propagation::Entailed);
        }
        let possible = self
            .vars
            .iter()
            .filter(|var| store.values(**var).any(|v| self.values.contains(&v)))
            .count();
        if possible <= self.max {
            Ok(Propagation::Entailed)
        } else {
            Ok(Propagation::Active)
        }
    }
}

/// No value is shared between the two groups of variables
#[derive(Debug, Clone)]
pub struct Disjoint {
    left: Vec<VarId>,
    right: Vec<VarId>,
}

impl Disjoint {
    pub fn new(left: Vec<VarId>, right: Vec<VarId>) -> Self {
        Self { left, right }
    }

    pub(crate) fn vars(&self) -> Vec<VarId> {
        self.left.iter().chain(&self.right).copied().collect()
    }

    fn exclude(store: &mut Store, from: &[VarId], to: &[VarId]) -> Result<bool, Contradiction> {
        let taken: BTreeSet<i64> = from.iter().filter_map(|v| store.value(*v)).collect();
        let mut changed = false;
        for var in to {
            changed |= store.restrict(*var, |value| !taken.contains(&value))?;
        }
        Ok(changed)
    }

    pub(crate) fn propagate(&self, store: &mut Store) -> PropagationResult {
        loop {
            let right_changed = Self::exclude(store, &self.left, &self.right)?;
            let left_changed = Self::exclude(store, &self.right, &self.left)?;
            if !right_changed && !left_changed {
                break;
            }
        }
        let left: BTreeSet<i64> = self
            .left
            .iter()
            .flat_map(|v| store.values(*v).collect::<Vec<_>>())
            .collect();
        let overlap = self
            .right
            .iter()
            .any(|v| store.values(*v).any(|value| left.contains(&value)));
        Ok(if overlap {
            Propagation::Active
        } else {
            Propagation::Entailed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::store::VarKind;

    fn hosters(store: &mut Store, n: usize, nodes: i64) -> Vec<VarId> {
        (0..n)
            .map(|i| store.new_interval(format!("h{}", i), VarKind::Hoster, 0, nodes - 1))
            .collect()
    }

    #[test]
    fn test_all_different_chains_removals() {
        let mut store = Store::new();
        let vars = hosters(&mut store, 3, 3);
        store.set_ub(vars[1], 1).unwrap();
        store.instantiate(vars[0], 0).unwrap();
        AllDifferent::new(vars.clone()).propagate(&mut store).unwrap();
        assert_eq!(store.value(vars[1]), Some(1));
        assert_eq!(store.value(vars[2]), Some(2));
    }

    #[test]
    fn test_all_equal_intersects_domains() {
        let mut store = Store::new();
        let vars = hosters(&mut store, 2, 4);
        store.set_lb(vars[0], 2).unwrap();
        store.set_ub(vars[1], 2).unwrap();
        AllEqual::new(vars.clone()).propagate(&mut store).unwrap();
        assert_eq!(store.value(vars[0]), Some(2));
        assert_eq!(store.value(vars[1]), Some(2));

        let other = store.new_interval("other", VarKind::Hoster, 3, 3);
        assert!(AllEqual::new(vec![vars[0], other])
            .propagate(&mut store)
            .is_err());
    }

    #[test]
    fn test_among_selects_group() {
        let mut store = Store::new();
        let vars = hosters(&mut store, 2, 4);
        let selector = store.new_interval("group", VarKind::Other, 0, 1);
        let groups = vec![BTreeSet::from([0, 1]), BTreeSet::from([2, 3])];
        let c = Among::new(vars.clone(), groups, selector);
        store.instantiate(vars[0], 3).unwrap();
        c.propagate(&mut store).unwrap();
        assert_eq!(store.value(selector), Some(1));
        assert_eq!(store.lb(vars[1]), 2);
    }

    #[test]
    fn test_at_most_closes_the_set() {
        let mut store = Store::new();
        let vars = hosters(&mut store, 3, 3);
        store.instantiate(vars[0], 0).unwrap();
        let c = AtMost::new(vars.clone(), BTreeSet::from([0, 1]), 1);
        assert_eq!(c.propagate(&mut store), Ok(Propagation::Entailed));
        assert_eq!(store.value(vars[1]), Some(2));
        assert_eq!(store.value(vars[2]), Some(2));
    }

    #[test]
    fn test_disjoint_groups() {
        let mut store = Store::new();
        let left = hosters(&mut store, 1, 3);
        let right = hosters(&mut store, 2, 3);
        store.instantiate(left[0], 1).unwrap();
        store.instantiate(right[0], 0).unwrap();
        let c = Disjoint::new(left, right.clone());
        c.propagate(&mut store).unwrap();
        assert!(!store.contains(right[1], 1));
        assert!(store.contains(right[1], 0));
    }
}
