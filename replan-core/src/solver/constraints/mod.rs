//! Constraint kinds understood by the propagation engine
//!
//! The set is closed: every kind is a variant of [`Constraint`] and propagation is a
//! single `match`. Each filtering rule reads and narrows domains through the [`Store`],
//! which records the changes on the trail.

mod linear;
mod packing;
mod placement;
mod reified;
mod timetable;

pub use linear::{GuardedPrecedence, Offset, Precedence, Sum};
pub use packing::BinPacking;
pub use placement::{AllDifferent, AllEqual, Among, AtMost, Disjoint};
pub use reified::ReifiedEq;
pub use timetable::{ConsumingTask, DemandingTask, Timetable};

use crate::solver::store::{Store, VarId};
use crate::solver::PropagationResult;

/// Handle of a posted constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintId(pub(crate) u32);

impl ConstraintId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Outcome of one propagation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// The constraint may still prune
    Active,
    /// The constraint holds whatever the remaining choices
    Entailed,
}

#[derive(Debug, Clone)]
pub enum Constraint {
    BinPacking(BinPacking),
    ReifiedEq(ReifiedEq),
    Offset(Offset),
    Precedence(Precedence),
    GuardedPrecedence(GuardedPrecedence),
    Sum(Sum),
    Timetable(Timetable),
    AllDifferent(AllDifferent),
    AllEqual(AllEqual),
    Among(Among),
    AtMost(AtMost),
    Disjoint(Disjoint),
}

impl Constraint {
    pub fn name(&self) -> &'static str {
        match self {
            Constraint::BinPacking(_) => "bin-packing",
            Constraint::ReifiedEq(_) => "reified-eq",
            Constraint::Offset(_) => "offset",
            Constraint::Precedence(_) => "precedence",
            Constraint::GuardedPrecedence(_) => "guarded-precedence",
            Constraint::Sum(_) => "sum",
            Constraint::Timetable(_) => "timetable",
            Constraint::AllDifferent(_) => "all-different",
            Constraint::AllEqual(_) => "all-equal",
            Constraint::Among(_) => "among",
            Constraint::AtMost(_) => "at-most",
            Constraint::Disjoint(_) => "disjoint",
        }
    }

    /// Variables whose changes wake the constraint up
    pub fn vars(&self) -> Vec<VarId> {
        match self {
            Constraint::BinPacking(c) => c.vars(),
            Constraint::ReifiedEq(c) => c.vars(),
            Constraint::Offset(c) => c.vars(),
            Constraint::Precedence(c) => c.vars(),
            Constraint::GuardedPrecedence(c) => c.vars(),
            Constraint::Sum(c) => c.vars(),
            Constraint::Timetable(c) => c.vars(),
            Constraint::AllDifferent(c) => c.vars(),
            Constraint::AllEqual(c) => c.vars(),
            Constraint::Among(c) => c.vars(),
            Constraint::AtMost(c) => c.vars(),
            Constraint::Disjoint(c) => c.vars(),
        }
    }

    pub fn propagate(&self, store: &mut Store) -> PropagationResult {
        match self {
            Constraint::BinPacking(c) => c.propagate(store),
            Constraint::ReifiedEq(c) => c.propagate(store),
            Constraint::Offset(c) => c.propagate(store),
            Constraint::Precedence(c) => c.propagate(store),
            Constraint::GuardedPrecedence(c) => c.propagate(store),
            Constraint::Sum(c) => c.propagate(store),
            Constraint::Timetable(c) => c.propagate(store),
            Constraint::AllDifferent(c) => c.propagate(store),
            Constraint::AllEqual(c) => c.propagate(store),
            Constraint::Among(c) => c.propagate(store),
            Constraint::AtMost(c) => c.propagate(store),
            Constraint::Disjoint(c) => c.propagate(store),
        }
    }
}

macro_rules! impl_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Constraint {
                fn from(c: $variant) -> Self {
                    Constraint::$variant(c)
                }
            }
        )*
    };
}

impl_from!(
    BinPacking,
    ReifiedEq,
    Offset,
    Precedence,
    GuardedPrecedence,
    Sum,
    Timetable,
    AllDifferent,
    AllEqual,
    Among,
    AtMost,
    Disjoint,
);

/// Entailed once every variable is fixed
pub(crate) fn entailed_when_fixed(store: &Store, vars: &[VarId]) -> crate::solver::Propagation {
    if vars.iter().all(|v| store.is_fixed(*v)) {
        Propagation::Entailed
    } else {
        Propagation::Active
    }
}
