//! Capacity replay of a plan
//!
//! Walks the plan instant by instant: an action acquires resources on its incoming node
//! when it starts and releases them on its outgoing node when it ends. Releases at an
//! instant happen before acquisitions at the same instant. An offline node counts as
//! fully used until its startup ends.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::action::Action;
use crate::model::{Configuration, ElementRef, NodeId, ResourceDimension};
use crate::plan::ReconfigurationPlan;

/// First overload met while replaying a plan
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("node '{node}' exceeds its {dimension} capacity at instant {instant}: {load} > {capacity}")]
pub struct CapacityViolation {
    pub node: String,
    pub instant: u64,
    pub dimension: ResourceDimension,
    pub load: u64,
    pub capacity: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Step {
    Release,
    Acquire,
}

/// Resources an action holds on a node, per dimension
fn footprint(cfg: &Configuration, action: &Action) -> [u64; 2] {
    let amounts = |dim: ResourceDimension| match action.element() {
        ElementRef::Vm(vm) => cfg.vm(vm).demand(dim),
        ElementRef::Node(node) => cfg.node(node).capacity(dim),
    };
    [
        amounts(ResourceDimension::Cpu),
        amounts(ResourceDimension::Memory),
    ]
}

impl ReconfigurationPlan {
    /// Replay the plan and report the first node, instant and dimension over capacity
    pub fn check_capacity(&self) -> Result<(), CapacityViolation> {
        let cfg = self.source();
        let mut loads: Vec<[u64; 2]> = cfg
            .node_ids()
            .map(|node| {
                if cfg.is_online(node) {
                    ResourceDimension::ALL.map(|dim| cfg.load(node, dim))
                } else {
                    ResourceDimension::ALL.map(|dim| cfg.node(node).capacity(dim))
                }
            })
            .collect();

        let mut timeline: BTreeMap<(u64, Step), Vec<(NodeId, [u64; 2])>> = BTreeMap::new();
        timeline.entry((0, Step::Release)).or_default();
        for action in self.actions() {
            let amounts = footprint(cfg, action);
            if let Some(node) = action.outgoing_node() {
                timeline
                    .entry((action.end, Step::Release))
                    .or_default()
                    .push((node, amounts));
            }
            if let Some(node) = action.incoming_node() {
                timeline
                    .entry((action.start, Step::Acquire))
                    .or_default()
                    .push((node, amounts));
            }
        }

        for ((instant, step), changes) in timeline {
            for (node, amounts) in &changes {
                for (load, amount) in loads[node.index()].iter_mut().zip(amounts) {
                    *load = match step {
                        Step::Release => load.saturating_sub(*amount),
                        Step::Acquire => *load + amount,
                    };
                }
            }
            if step == Step::Acquire || changes.is_empty() {
                self.check_loads(cfg, &loads, instant)?;
            }
        }
        Ok(())
    }

    fn check_loads(
        &self,
        cfg: &Configuration,
        loads: &[[u64; 2]],
        instant: u64,
    ) -> Result<(), CapacityViolation> {
        for node in cfg.node_ids() {
            for (d, dimension) in ResourceDimension::ALL.into_iter().enumerate() {
                let load = loads[node.index()][d];
                let capacity = cfg.node(node).capacity(dimension);
                if load > capacity {
                    return Err(CapacityViolation {
                        node: cfg.node(node).name.clone(),
                        instant,
                        dimension,
                        load,
                        capacity,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::model::{Node, NodeState, VirtualMachine, VmId};
    use pretty_assertions::assert_eq;

    fn cluster() -> Configuration {
        let mut cfg = Configuration::new();
        cfg.add_node(Node::new("n1", 4, 4096), NodeState::Online).unwrap();
        cfg.add_node(Node::new("n2", 4, 4096), NodeState::Online).unwrap();
        cfg.add_node(Node::new("n3", 4, 4096), NodeState::Offline).unwrap();
        let vm1 = cfg.add_vm(VirtualMachine::new("vm1", 3, 1024)).unwrap();
        let vm2 = cfg.add_vm(VirtualMachine::new("vm2", 3, 1024)).unwrap();
        cfg.set_running(vm1, NodeId(0)).unwrap();
        cfg.set_running(vm2, NodeId(1)).unwrap();
        cfg
    }

    fn migrate(vm: u32, from: u32, to: u32, start: u64, end: u64) -> Action {
        Action::new(
            ActionKind::Migration {
                vm: VmId(vm),
                from: NodeId(from),
                to: NodeId(to),
            },
            start,
            end,
        )
    }

    #[test]
    fn test_swap_needs_a_release_first() {
        let mut plan = ReconfigurationPlan::new(cluster());
        plan.add(migrate(0, 0, 1, 0, 4)).unwrap();
        plan.add(migrate(1, 1, 0, 0, 4)).unwrap();
        assert_eq!(
            plan.check_capacity(),
            Err(CapacityViolation {
                node: "n1".to_string(),
                instant: 0,
                dimension: ResourceDimension::Cpu,
                load: 6,
                capacity: 4,
            })
        );
    }

    #[test]
    fn test_release_before_acquire_at_same_instant() {
        let mut plan = ReconfigurationPlan::new(cluster());
        plan.add(migrate(0, 0, 1, 0, 4)).unwrap();
        plan.add(Action::new(
            ActionKind::Stop {
                vm: VmId(1),
                node: NodeId(1),
            },
            0,
            0,
        ))
        .unwrap();
        assert_eq!(plan.check_capacity(), Ok(()));
    }

    #[test]
    fn test_offline_node_is_full_until_started() {
        let mut early = ReconfigurationPlan::new(cluster());
        early
            .add(Action::new(ActionKind::Startup { node: NodeId(2) }, 0, 5))
            .unwrap();
        early.add(migrate(0, 0, 2, 3, 6)).unwrap();
        let violation = early.check_capacity().unwrap_err();
        assert_eq!((violation.node.as_str(), violation.instant), ("n3", 3));

        let mut late = ReconfigurationPlan::new(cluster());
        late.add(Action::new(ActionKind::Startup { node: NodeId(2) }, 0, 5))
            .unwrap();
        late.add(migrate(0, 0, 2, 5, 8)).unwrap();
        assert!(late.check_capacity().is_ok());
    }
}
