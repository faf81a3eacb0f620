//! Finite-domain constraint solver
//!
//! A small propagation engine tailored to reconfiguration problems:
//!
//! - [`store`]: integer variables on a trail, with nested worlds for backtracking
//! - [`constraints`]: the closed set of constraint kinds and their filtering rules
//! - [`propagation`]: the scheduling loop running constraints to a fix-point
//! - [`search`]: depth-first binary branching with budgets and branch and bound
//!
//! A [`Contradiction`] only ever travels between these modules and the search loop,
//! which recovers from it by backtracking.

pub mod constraints;
pub mod domain;
pub mod propagation;
pub mod search;
pub mod store;

pub use constraints::{Constraint, ConstraintId, Propagation};
pub use domain::IntDomain;
pub use propagation::Solver;
pub use search::{
    Brancher, InputOrder, Objective, Search, SearchLimits, SearchOutcome, SearchStats,
    SearchStatus, Solution,
};
pub use store::{StoredId, Store, VarId, VarKind};

/// Why propagation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    /// A domain became empty
    EmptyDomain,
    /// A time variable was pushed past its initial upper bound
    HorizonExceeded,
    /// A resource is over capacity whatever the remaining choices
    Overload,
    /// Fixed variables disagree with a constraint
    Inconsistent,
}

/// Propagation failure, recovered by backtracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contradiction {
    pub var: Option<VarId>,
    pub constraint: Option<ConstraintId>,
    pub cause: Cause,
}

impl Contradiction {
    pub fn on_var(var: VarId, cause: Cause) -> Self {
        Self {
            var: Some(var),
            constraint: None,
            cause,
        }
    }

    pub fn new(cause: Cause) -> Self {
        Self {
            var: None,
            constraint: None,
            cause,
        }
    }

    pub(crate) fn in_constraint(mut self, id: ConstraintId) -> Self {
        self.constraint.get_or_insert(id);
        self
    }
}

pub type PropagationResult = Result<Propagation, Contradiction>;
