//! Reconfiguration plans
//!
//! A plan is the set of scheduled actions leading from a source configuration to its
//! destination. At most one action acts on each element.

pub mod assembly;
pub mod timeline;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::action::{Action, ActionKind};
use crate::error::{ReplanError, ReplanResult};
use crate::graph::ExecutionGraph;
use crate::model::{Configuration, ElementRef};

pub use assembly::assemble;
pub use timeline::CapacityViolation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconfigurationPlan {
    source: Configuration,
    /// Sorted by start, end, then element name
    actions: Vec<Action>,
}

impl ReconfigurationPlan {
    pub fn new(source: Configuration) -> Self {
        Self {
            source,
            actions: Vec::new(),
        }
    }

    fn compare(&self, a: &Action, b: &Action) -> Ordering {
        (a.start, a.end)
            .cmp(&(b.start, b.end))
            .then_with(|| {
                self.source
                    .name_of(a.element())
                    .cmp(self.source.name_of(b.element()))
            })
            .then_with(|| a.cmp(b))
    }

    fn check_known(&self, action: &Action) -> ReplanResult<()> {
        let known = match action.element() {
            ElementRef::Vm(vm) => vm.index() < self.source.vm_count(),
            ElementRef::Node(node) => node.index() < self.source.node_count(),
        };
        let nodes_known = [action.incoming_node(), action.outgoing_node()]
            .into_iter()
            .flatten()
            .all(|node| node.index() < self.source.node_count());
        if known && nodes_known {
            Ok(())
        } else {
            Err(ReplanError::UnknownElement(format!("{:?}", action.kind)))
        }
    }

    /// Add an action; an element acts at most once in a plan
    pub fn add(&mut self, action: Action) -> ReplanResult<()> {
        self.check_known(&action)?;
        if self.action_for(action.element()).is_some() {
            return Err(ReplanError::PlanConflict {
                elements: vec![self.source.name_of(action.element()).to_string()],
            });
        }
        let position = self
            .actions
            .partition_point(|a| self.compare(a, &action) == Ordering::Less);
        self.actions.insert(position, action);
        Ok(())
    }

    pub fn source(&self) -> &Configuration {
        &self.source
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Instant the last action ends
    pub fn duration(&self) -> u64 {
        self.actions.iter().map(|a| a.end).max().unwrap_or(0)
    }

    pub fn action_for(&self, element: ElementRef) -> Option<&Action> {
        self.actions.iter().find(|a| a.element() == element)
    }

    /// Configuration reached once every action is applied
    ///
    /// Node startups apply first and shutdowns last, so the result does not depend on how
    /// simultaneous actions are ordered.
    pub fn destination(&self) -> ReplanResult<Configuration> {
        let mut cfg = self.source.clone();
        let mut ordered: Vec<&Action> = self.actions.iter().collect();
        ordered.sort_by_key(|action| match action.kind {
            ActionKind::Startup { .. } => 0,
            ActionKind::Shutdown { .. } => 2,
            _ => 1,
        });
        for action in ordered {
            action.apply_in_place(&mut cfg)?;
        }
        Ok(cfg)
    }

    /// Union of two plans acting on disjoint elements of the same source
    pub fn merge(&self, other: &ReconfigurationPlan) -> ReplanResult<ReconfigurationPlan> {
        if self.source != other.source {
            return Err(ReplanError::invalid_operation(
                "merge",
                "plans start from different configurations",
            ));
        }
        let mine: BTreeSet<ElementRef> = self.actions.iter().map(Action::element).collect();
        let shared: Vec<String> = other
            .actions
            .iter()
            .map(Action::element)
            .filter(|e| mine.contains(e))
            .map(|e| self.source.name_of(e).to_string())
            .collect();
        if !shared.is_empty() {
            return Err(ReplanError::PlanConflict { elements: shared });
        }
        let mut merged = self.clone();
        for action in &other.actions {
            merged.add(*action)?;
        }
        Ok(merged)
    }

    pub fn execution_graph(&self) -> ExecutionGraph {
        ExecutionGraph::from_plan(self)
    }
}

impl fmt::Display for ReconfigurationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for action in &self.actions {
            writeln!(f, "{}", action.describe(&self.source))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, NodeId, NodeState, VirtualMachine, VmId};
    use pretty_assertions::assert_eq;

    fn cluster() -> Configuration {
        let mut cfg = Configuration::new();
        for name in ["n1", "n2"] {
            cfg.add_node(Node::new(name, 4, 4096), NodeState::Online).unwrap();
        }
        for name in ["vm1", "vm2", "vm3"] {
            cfg.add_vm(VirtualMachine::new(name, 1, 512)).unwrap();
        }
        cfg.set_running(VmId(0), NodeId(0)).unwrap();
        cfg.set_running(VmId(1), NodeId(0)).unwrap();
        cfg
    }

    fn migrate(vm: u32, start: u64, end: u64) -> Action {
        Action::new(
            ActionKind::Migration {
                vm: VmId(vm),
                from: NodeId(0),
                to: NodeId(1),
            },
            start,
            end,
        )
    }

    #[test]
    fn test_actions_are_ordered_by_time_then_name() {
        let mut plan = ReconfigurationPlan::new(cluster());
        plan.add(migrate(1, 0, 4)).unwrap();
        plan.add(Action::new(
            ActionKind::Run {
                vm: VmId(2),
                node: NodeId(1),
            },
            0,
            2,
        ))
        .unwrap();
        plan.add(migrate(0, 0, 4)).unwrap();
        let order: Vec<String> = plan
            .actions()
            .iter()
            .map(|a| a.label(plan.source()))
            .collect();
        assert_eq!(
            order,
            vec!["run(vm3,n2)", "migrate(vm1,n1,n2)", "migrate(vm2,n1,n2)"]
        );
        assert_eq!(plan.duration(), 4);
        assert_eq!(
            plan.to_string(),
            "run(vm3,n2)[0,2]\nmigrate(vm1,n1,n2)[0,4]\nmigrate(vm2,n1,n2)[0,4]\n"
        );
    }

    #[test]
    fn test_second_action_on_element_conflicts() {
        let mut plan = ReconfigurationPlan::new(cluster());
        plan.add(migrate(0, 0, 4)).unwrap();
        let err = plan.add(migrate(0, 5, 9)).unwrap_err();
        assert!(matches!(err, ReplanError::PlanConflict { ref elements } if elements == &["vm1"]));
    }

    #[test]
    fn test_destination_applies_every_action() {
        let mut plan = ReconfigurationPlan::new(cluster());
        plan.add(migrate(0, 0, 4)).unwrap();
        plan.add(Action::new(ActionKind::Suspend { vm: VmId(1), node: NodeId(0) }, 1, 3))
            .unwrap();
        let destination = plan.destination().unwrap();
        assert_eq!(destination.running_host(VmId(0)), Some(NodeId(1)));
        assert_eq!(destination.placement(VmId(1)).host(), Some(NodeId(0)));
        assert_eq!(plan.source(), &cluster());
    }

    #[test]
    fn test_destination_ignores_the_order_of_simultaneous_actions() {
        let mut cfg = Configuration::new();
        cfg.add_node(Node::new("n1", 4, 4096), NodeState::Online).unwrap();
        let n2 = cfg.add_node(Node::new("n2", 4, 4096), NodeState::Offline).unwrap();
        let vm = cfg.add_vm(VirtualMachine::new("a", 1, 512)).unwrap();

        let mut plan = ReconfigurationPlan::new(cfg);
        plan.add(Action::new(ActionKind::Startup { node: n2 }, 0, 0)).unwrap();
        plan.add(Action::new(ActionKind::Run { vm, node: n2 }, 0, 0)).unwrap();
        assert_eq!(plan.to_string(), "run(a,n2)[0,0]\nstartup(n2)[0,0]\n");

        let destination = plan.destination().unwrap();
        assert!(destination.is_online(n2));
        assert_eq!(destination.running_host(vm), Some(n2));
    }

    #[test]
    fn test_merge() {
        let mut left = ReconfigurationPlan::new(cluster());
        left.add(migrate(0, 0, 4)).unwrap();
        let mut right = ReconfigurationPlan::new(cluster());
        right.add(migrate(1, 2, 6)).unwrap();

        let merged = left.merge(&right).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged, right.merge(&left).unwrap());
        assert!(matches!(
            left.merge(&left),
            Err(ReplanError::PlanConflict { .. })
        ));

        let mut other_source = cluster();
        other_source.set_waiting(VmId(1)).unwrap();
        let foreign = ReconfigurationPlan::new(other_source);
        assert!(matches!(
            left.merge(&foreign),
            Err(ReplanError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_unknown_elements_are_rejected() {
        let mut plan = ReconfigurationPlan::new(cluster());
        assert!(matches!(
            plan.add(migrate(7, 0, 1)),
            Err(ReplanError::UnknownElement(_))
        ));
    }
}
