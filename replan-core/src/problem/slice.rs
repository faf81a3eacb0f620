//! Resource slices
//!
//! A slice is the interval during which an action holds resources on one node:
//! - a [`ConsumingSlice`] on the node the element leaves, from 0 until the action ends
//! - a [`DemandingSlice`] on the node selected by the hoster variable, from the action
//!   start onwards
//!
//! Every bound lives in `[0, H]`, `H` being the planning horizon.

use smallvec::SmallVec;

use crate::error::{ReplanError, ReplanResult};
use crate::model::{NodeId, ResourceDimension};
use crate::solver::constraints::{ConsumingTask, DemandingTask, Offset};
use crate::solver::{IntDomain, Solver, Store, VarId, VarKind};

/// Resource heights of a slice, one per [`ResourceDimension`]
pub type Heights = SmallVec<[i64; 2]>;

/// Start, end and duration variables of an action, linked by `end = start + duration`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionWindow {
    pub start: VarId,
    pub end: VarId,
    pub duration: VarId,
}

/// Resources held on `node` until `end`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumingSlice {
    pub node: NodeId,
    pub end: VarId,
    pub heights: Heights,
}

impl ConsumingSlice {
    pub(crate) fn task(&self, owner: u32) -> ConsumingTask {
        ConsumingTask {
            owner,
            end: self.end,
            heights: self.heights.clone(),
        }
    }
}

/// Resources held on the node selected by `hoster`, from `start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemandingSlice {
    pub hoster: VarId,
    pub start: VarId,
    pub heights: Heights,
}

impl DemandingSlice {
    pub(crate) fn task(&self, owner: u32, on_any_node: bool) -> DemandingTask {
        DemandingTask {
            owner,
            start: self.start,
            hoster: on_any_node.then_some(self.hoster),
            heights: self.heights.clone(),
        }
    }

    /// Whether `node` may still receive this slice: it is in the hoster domain, and each
    /// of its load variables can still grow by the slice height
    pub fn can_host_at(&self, store: &Store, node: NodeId, loads: &[VarId]) -> bool {
        let value = node.0 as i64;
        if !store.contains(self.hoster, value) {
            return false;
        }
        if store.value(self.hoster) == Some(value) {
            return true;
        }
        loads
            .iter()
            .zip(&self.heights)
            .all(|(load, height)| store.lb(*load) + height <= store.ub(*load))
    }
}

/// Creates slice variables bounded by the planning horizon
#[derive(Debug, Clone, Copy)]
pub struct SliceBuilder {
    horizon: i64,
}

impl SliceBuilder {
    pub fn new(horizon: u64) -> Self {
        Self {
            horizon: horizon as i64,
        }
    }

    pub fn horizon(&self) -> u64 {
        self.horizon as u64
    }

    pub fn heights(demand: impl Fn(ResourceDimension) -> u64) -> Heights {
        ResourceDimension::ALL
            .iter()
            .map(|dim| demand(*dim) as i64)
            .collect()
    }

    fn time(&self, solver: &mut Solver, label: String) -> VarId {
        solver
            .store_mut()
            .new_interval(label, VarKind::Time, 0, self.horizon)
    }

    /// Window of an action lasting one of `durations`
    ///
    /// Fails with `DomainExhausted` when even the shortest duration does not fit the
    /// horizon.
    pub fn window(
        &self,
        solver: &mut Solver,
        label: &str,
        durations: &[u64],
    ) -> ReplanResult<ActionWindow> {
        let values: Vec<i64> = durations.iter().map(|d| *d as i64).collect();
        let shortest = values.iter().min().copied().unwrap_or(0);
        if shortest > self.horizon {
            return Err(ReplanError::DomainExhausted {
                slice: label.to_string(),
                horizon: self.horizon(),
            });
        }
        let domain = IntDomain::from_values(&values).unwrap_or_else(|| IntDomain::singleton(0));
        let start = self.time(solver, format!("{}.start", label));
        let end = self.time(solver, format!("{}.end", label));
        let duration = solver.store_mut().new_var(
            format!("{}.duration", label),
            VarKind::Duration,
            domain,
        );
        solver.post(Offset::new(start, duration, end));
        Ok(ActionWindow {
            start,
            end,
            duration,
        })
    }

    pub fn consuming(&self, node: NodeId, window: &ActionWindow, heights: Heights) -> ConsumingSlice {
        ConsumingSlice {
            node,
            end: window.end,
            heights,
        }
    }

    pub fn demanding(&self, hoster: VarId, window: &ActionWindow, heights: Heights) -> DemandingSlice {
        DemandingSlice {
            hoster,
            start: window.start,
            heights,
        }
    }
}
