//! Per-node resource timetable
//!
//! # Theoretical
//!
//! A node sees two kinds of tasks:
//! - a *consuming* task holds `h` units from time 0 until its end variable `e`
//! - a *demanding* task holds `h` units from its start variable `s` onwards, once its
//!   hoster variable selects the node
//!
//! The *compulsory part* of a consuming task is `[0, lb(e))`, the one of a demanding task
//! is `[ub(s), ∞)`. Summing compulsory parts gives a profile that only grows as the
//! bounds tighten. Every change point of the profile is a bound of some task, so checking
//! the profile at those instants is enough.
//!
//! # Filtering
//!
//! 1. The profile never exceeds the capacity.
//! 2. A demanding task cannot start while the profile, without the task owner's own
//!    contribution, leaves no room for it: its start moves past the last instant where it
//!    would not fit.
//! 3. A consuming task cannot still run at an instant where the profile plus its height
//!    exceeds the capacity: its end moves before the first such instant.
//!
//! Tasks carry an owner tag so the two slices of a VM staying on the node are never
//! counted against each other.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::solver::constraints::Propagation;
use crate::solver::store::{Store, VarId};
use crate::solver::{Cause, Contradiction, PropagationResult};

/// Resources held on the node until `end`
#[derive(Debug, Clone)]
pub struct ConsumingTask {
    pub owner: u32,
    pub end: VarId,
    pub heights: SmallVec<[i64; 2]>,
}

/// Resources held on the node from `start`, if `hoster` selects the node
///
/// A task without hoster variable is always on the node.
#[derive(Debug, Clone)]
pub struct DemandingTask {
    pub owner: u32,
    pub start: VarId,
    pub hoster: Option<VarId>,
    pub heights: SmallVec<[i64; 2]>,
}

#[derive(Debug, Clone, Default)]
struct OwnedTasks {
    consuming: SmallVec<[usize; 1]>,
    demanding: SmallVec<[usize; 1]>,
}

#[derive(Debug, Clone)]
pub struct Timetable {
    node: i64,
    capacities: SmallVec<[i64; 2]>,
    consuming: Vec<ConsumingTask>,
    demanding: Vec<DemandingTask>,
    owners: FxHashMap<u32, OwnedTasks>,
}

impl Timetable {
    /// Timetable of the node whose index in hoster domains is `node`
    pub fn new(node: i64, capacities: impl IntoIterator<Item = i64>) -> Self {
        Self {
            node,
            capacities: capacities.into_iter().collect(),
            consuming: Vec::new(),
            demanding: Vec::new(),
            owners: FxHashMap::default(),
        }
    }

    pub fn add_consuming(&mut self, task: ConsumingTask) {
        debug_assert_eq!(task.heights.len(), self.capacities.len());
        self.owners
            .entry(task.owner)
            .or_default()
            .consuming
            .push(self.consuming.len());
        self.consuming.push(task);
    }

    pub fn add_demanding(&mut self, task: DemandingTask) {
        debug_assert_eq!(task.heights.len(), self.capacities.len());
        self.owners
            .entry(task.owner)
            .or_default()
            .demanding
            .push(self.demanding.len());
        self.demanding.push(task);
    }

    pub fn node(&self) -> i64 {
        self.node
    }

    pub fn is_empty(&self) -> bool {
        self.consuming.is_empty() && self.demanding.is_empty()
    }

    pub(crate) fn vars(&self) -> Vec<VarId> {
        let mut vars: Vec<VarId> = self.consuming.iter().map(|c| c.end).collect();
        for d in &self.demanding {
            vars.push(d.start);
            vars.extend(d.hoster);
        }
        vars
    }

    fn is_on_node(&self, store: &Store, task: &DemandingTask) -> bool {
        task.hoster
            .map_or(true, |hoster| store.value(hoster) == Some(self.node))
    }

    /// Compulsory contribution of one owner at instant `t`
    fn own_level(&self, store: &Store, owner: u32, dim: usize, t: i64) -> i64 {
        let Some(tasks) = self.owners.get(&owner) else {
            return 0;
        };
        let consuming: i64 = tasks
            .consuming
            .iter()
            .map(|i| &self.consuming[*i])
            .filter(|c| store.lb(c.end) > t)
            .map(|c| c.heights[dim])
            .sum();
        let demanding: i64 = tasks
            .demanding
            .iter()
            .map(|i| &self.demanding[*i])
            .filter(|d| self.is_on_node(store, d) && store.ub(d.start) <= t)
            .map(|d| d.heights[dim])
            .sum();
        consuming + demanding
    }

    pub(crate) fn propagate(&self, store: &mut Store) -> PropagationResult {
        let on_node: Vec<usize> = (0..self.demanding.len())
            .filter(|i| self.is_on_node(store, &self.demanding[*i]))
            .collect();

        let mut times = vec![0];
        times.extend(self.consuming.iter().map(|c| store.lb(c.end)));
        for i in &on_node {
            let start = self.demanding[*i].start;
            times.push(store.lb(start));
            times.push(store.ub(start));
        }
        times.sort_unstable();
        times.dedup();
        let index = |t: i64| times.binary_search(&t).unwrap_or_else(|i| i);

        for (dim, capacity) in self.capacities.iter().copied().enumerate() {
            let mut levels = vec![0i64; times.len() + 1];
            for c in &self.consuming {
                let end = store.lb(c.end);
                if end > 0 {
                    levels[0] += c.heights[dim];
                    levels[index(end)] -= c.heights[dim];
                }
            }
            for i in &on_node {
                let d = &self.demanding[*i];
                levels[index(store.ub(d.start))] += d.heights[dim];
            }
            for i in 1..levels.len() {
                levels[i] += levels[i - 1];
            }
            levels.truncate(times.len());

            if levels.iter().any(|level| *level > capacity) {
                return Err(Contradiction::new(Cause::Overload));
            }

            for i in &on_node {
                let d = &self.demanding[*i];
                let height = d.heights[dim];
                if height <= 0 {
                    continue;
                }
                let last_conflict = (index(store.lb(d.start))..times.len())
                    .filter(|k| {
                        levels[*k] - self.own_level(store, d.owner, dim, times[*k]) + height
                            > capacity
                    })
                    .last();
                if let Some(k) = last_conflict {
                    if k + 1 == times.len() {
                        return Err(Contradiction::on_var(d.start, Cause::Overload));
                    }
                    store.set_lb(d.start, times[k + 1])?;
                }
            }

            for c in &self.consuming {
                let height = c.heights[dim];
                if height <= 0 {
                    continue;
                }
                let first_conflict = (index(store.lb(c.end))..times.len()).find(|k| {
                    levels[*k] - self.own_level(store, c.owner, dim, times[*k]) + height
                        > capacity
                });
                if let Some(k) = first_conflict {
                    store.set_ub(c.end, times[k])?;
                }
            }
        }

        let settled = self.consuming.iter().all(|c| store.is_fixed(c.end))
            && self.demanding.iter().all(|d| {
                store.is_fixed(d.start) && d.hoster.map_or(true, |h| store.is_fixed(h))
            });
        Ok(if settled {
            Propagation::Entailed
        } else {
            Propagation::Active
        })
    }
}
