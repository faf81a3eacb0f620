//! Execution graph of a plan
//!
//! For each node, actions are sorted into *incoming* (they acquire resources on the node
//! when they start) and *outgoing* (they release resources on the node when they end).
//! An action `A` depends on an action `B` when `B` is outgoing on a node `A` is incoming
//! on and `B` ends no later than `A` starts. An executor may start an action once all
//! its dependencies completed.
//!
//! Actions are kept in a stable order, by element name, action type, start and end, so
//! the graph and its [`Agenda`] only depend on the set of actions.

pub mod agenda;

use std::collections::BTreeSet;

use crate::action::Action;
use crate::error::{ReplanError, ReplanResult};
use crate::model::Configuration;
use crate::plan::ReconfigurationPlan;

pub use agenda::{Agenda, Event};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionGraph {
    actions: Vec<Action>,
    labels: Vec<String>,
    /// Dependencies found when the graph was built
    dependencies: Vec<BTreeSet<usize>>,
    /// Dependencies not completed yet
    pending: Vec<BTreeSet<usize>>,
    completed: Vec<bool>,
}

impl ExecutionGraph {
    pub fn from_plan(plan: &ReconfigurationPlan) -> Self {
        Self::from_actions(plan.source(), plan.actions().iter().copied())
    }

    /// Graph of actions operating on elements of `source`
    pub fn from_actions(source: &Configuration, actions: impl IntoIterator<Item = Action>) -> Self {
        let mut actions: Vec<Action> = actions.into_iter().collect();
        actions.sort_by(|a, b| {
            let key = |x: &Action| {
                (
                    source.name_of(x.element()).to_string(),
                    x.action_type(),
                    x.start,
                    x.end,
                )
            };
            key(a).cmp(&key(b)).then_with(|| a.cmp(b))
        });
        actions.dedup();

        let dependencies: Vec<BTreeSet<usize>> = actions
            .iter()
            .enumerate()
            .map(|(i, action)| {
                let Some(node) = action.incoming_node() else {
                    return BTreeSet::new();
                };
                actions
                    .iter()
                    .enumerate()
                    .filter(|(j, other)| {
                        *j != i && other.outgoing_node() == Some(node) && other.end <= action.start
                    })
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect();

        Self {
            labels: actions.iter().map(|a| a.describe(source)).collect(),
            pending: dependencies.clone(),
            completed: vec![false; actions.len()],
            dependencies,
            actions,
        }
    }

    fn position(&self, action: &Action) -> Option<usize> {
        self.actions.iter().position(|a| a == action)
    }

    /// Actions in the stable order
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Actions that must complete before `action` starts
    pub fn dependencies(&self, action: &Action) -> Option<Vec<Action>> {
        self.position(action)
            .map(|i| self.dependencies[i].iter().map(|j| self.actions[*j]).collect())
    }

    /// Dependencies of `action` that did not complete yet
    pub fn pending(&self, action: &Action) -> Option<Vec<Action>> {
        self.position(action)
            .map(|i| self.pending[i].iter().map(|j| self.actions[*j]).collect())
    }

    /// Actions not completed whose dependencies all completed
    pub fn ready(&self) -> Vec<Action> {
        (0..self.actions.len())
            .filter(|i| !self.completed[*i] && self.pending[*i].is_empty())
            .map(|i| self.actions[i])
            .collect()
    }

    /// Record the completion of `action` and return the actions it unblocks
    pub fn complete(&mut self, action: &Action) -> ReplanResult<Vec<Action>> {
        let Some(done) = self.position(action) else {
            return Err(ReplanError::invalid_operation(
                "complete",
                format!("{:?} is not part of the graph", action.kind),
            ));
        };
        if self.completed[done] {
            return Err(ReplanError::invalid_operation(
                "complete",
                format!("{} already completed", self.labels[done]),
            ));
        }
        self.completed[done] = true;
        let mut unblocked = Vec::new();
        for (i, pending) in self.pending.iter_mut().enumerate() {
            if pending.remove(&done) && pending.is_empty() && !self.completed[i] {
                unblocked.push(self.actions[i]);
            }
        }
        Ok(unblocked)
    }

    pub fn is_completed(&self, action: &Action) -> bool {
        self.position(action).map_or(false, |i| self.completed[i])
    }

    /// Actions grouped by identical dependency sets
    pub fn agenda(&self) -> Agenda {
        Agenda::new(&self.labels, &self.dependencies)
    }
}
