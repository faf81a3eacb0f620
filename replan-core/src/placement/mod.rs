//! Placement constraints
//!
//! Rules restricting where virtual machines may run once the plan is applied. Every rule
//! can be checked against a configuration ([`PlacementConstraint::is_satisfied`],
//! [`PlacementConstraint::misplaced`]) and attached to a reconfiguration problem
//! ([`PlacementConstraint::add`]).
//!
//! Rules only ever concern VMs running in the destination: waiting, sleeping or stopped
//! VMs have no hoster and are ignored.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ReplanError, ReplanResult};
use crate::model::{Configuration, ElementRef, NodeId, VmId};
use crate::problem::ReconfigurationProblem;
use crate::solver::constraints::{AllDifferent, AllEqual, Among, AtMost, Disjoint, GuardedPrecedence};
use crate::solver::{IntDomain, VarId};

/// Placement rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PlacementConstraint {
    /// The VMs run on the given nodes only
    Fence {
        vms: BTreeSet<VmId>,
        nodes: BTreeSet<NodeId>,
    },
    /// The VMs never run on the given nodes
    Ban {
        vms: BTreeSet<VmId>,
        nodes: BTreeSet<NodeId>,
    },
    /// The VMs run on pairwise distinct nodes, at every instant of the plan
    Spread { vms: BTreeSet<VmId> },
    /// The VMs run on a single node
    Gather { vms: BTreeSet<VmId> },
    /// Running VMs are never moved
    Root { vms: BTreeSet<VmId> },
    /// The VMs run inside one of the node groups
    Among {
        vms: BTreeSet<VmId>,
        groups: Vec<BTreeSet<NodeId>>,
    },
    /// At most `max` VMs run on the given nodes
    Capacity {
        nodes: BTreeSet<NodeId>,
        max: usize,
    },
    /// The VMs never share a node with VMs outside the set
    Lonely { vms: BTreeSet<VmId> },
    /// VMs on the nodes stay there and no other VM arrives
    Quarantine { nodes: BTreeSet<NodeId> },
}

impl PlacementConstraint {
    pub fn fence(
        vms: impl IntoIterator<Item = VmId>,
        nodes: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        PlacementConstraint::Fence {
            vms: vms.into_iter().collect(),
            nodes: nodes.into_iter().collect(),
        }
    }

    pub fn ban(
        vms: impl IntoIterator<Item = VmId>,
        nodes: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        PlacementConstraint::Ban {
            vms: vms.into_iter().collect(),
            nodes: nodes.into_iter().collect(),
        }
    }

    pub fn spread(vms: impl IntoIterator<Item = VmId>) -> Self {
        PlacementConstraint::Spread {
            vms: vms.into_iter().collect(),
        }
    }

    pub fn gather(vms: impl IntoIterator<Item = VmId>) -> Self {
        PlacementConstraint::Gather {
            vms: vms.into_iter().collect(),
        }
    }

    pub fn root(vms: impl IntoIterator<Item = VmId>) -> Self {
        PlacementConstraint::Root {
            vms: vms.into_iter().collect(),
        }
    }

    pub fn among(
        vms: impl IntoIterator<Item = VmId>,
        groups: impl IntoIterator<Item = BTreeSet<NodeId>>,
    ) -> Self {
        PlacementConstraint::Among {
            vms: vms.into_iter().collect(),
            groups: groups.into_iter().collect(),
        }
    }

    pub fn capacity(nodes: impl IntoIterator<Item = NodeId>, max: usize) -> Self {
        PlacementConstraint::Capacity {
            nodes: nodes.into_iter().collect(),
            max,
        }
    }

    pub fn lonely(vms: impl IntoIterator<Item = VmId>) -> Self {
        PlacementConstraint::Lonely {
            vms: vms.into_iter().collect(),
        }
    }

    pub fn quarantine(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        PlacementConstraint::Quarantine {
            nodes: nodes.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlacementConstraint::Fence { .. } => "fence",
            PlacementConstraint::Ban { .. } => "ban",
            PlacementConstraint::Spread { .. } => "spread",
            PlacementConstraint::Gather { .. } => "gather",
            PlacementConstraint::Root { .. } => "root",
            PlacementConstraint::Among { .. } => "among",
            PlacementConstraint::Capacity { .. } => "capacity",
            PlacementConstraint::Lonely { .. } => "lonely",
            PlacementConstraint::Quarantine { .. } => "quarantine",
        }
    }

    /// Elements named by the rule, VMs first
    pub fn elements(&self) -> Vec<ElementRef> {
        let (vms, nodes): (Vec<VmId>, Vec<NodeId>) = match self {
            PlacementConstraint::Fence { vms, nodes } | PlacementConstraint::Ban { vms, nodes } => {
                (vms.iter().copied().collect(), nodes.iter().copied().collect())
            }
            PlacementConstraint::Spread { vms }
            | PlacementConstraint::Gather { vms }
            | PlacementConstraint::Root { vms }
            | PlacementConstraint::Lonely { vms } => (vms.iter().copied().collect(), Vec::new()),
            PlacementConstraint::Among { vms, groups } => {
                let nodes: BTreeSet<NodeId> = groups.iter().flatten().copied().collect();
                (vms.iter().copied().collect(), nodes.into_iter().collect())
            }
            PlacementConstraint::Capacity { nodes, .. }
            | PlacementConstraint::Quarantine { nodes } => {
                (Vec::new(), nodes.iter().copied().collect())
            }
        };
        vms.into_iter()
            .map(ElementRef::Vm)
            .chain(nodes.into_iter().map(ElementRef::Node))
            .collect()
    }

    /// Whether a configuration honors the rule
    pub fn is_satisfied(&self, cfg: &Configuration) -> bool {
        self.misplaced(cfg).is_empty()
    }

    /// Running VMs that have to move for the configuration to honor the rule
    pub fn misplaced(&self, cfg: &Configuration) -> BTreeSet<VmId> {
        let running = |vms: &BTreeSet<VmId>| -> Vec<(VmId, NodeId)> {
            vms.iter()
                .filter(|vm| vm.index() < cfg.vm_count())
                .filter_map(|vm| cfg.running_host(*vm).map(|node| (*vm, node)))
                .collect()
        };
        match self {
            PlacementConstraint::Fence { vms, nodes } => running(vms)
                .into_iter()
                .filter(|(_, node)| !nodes.contains(node))
                .map(|(vm, _)| vm)
                .collect(),
            PlacementConstraint::Ban { vms, nodes } => running(vms)
                .into_iter()
                .filter(|(_, node)| nodes.contains(node))
                .map(|(vm, _)| vm)
                .collect(),
            PlacementConstraint::Spread { vms } => {
                let mut per_node: BTreeMap<NodeId, Vec<VmId>> = BTreeMap::new();
                for (vm, node) in running(vms) {
                    per_node.entry(node).or_default().push(vm);
                }
                per_node
                    .into_values()
                    .filter(|group| group.len() > 1)
                    .flatten()
                    .collect()
            }
            PlacementConstraint::Gather { vms } => {
                let hosted = running(vms);
                let nodes: BTreeSet<NodeId> = hosted.iter().map(|(_, node)| *node).collect();
                if nodes.len() > 1 {
                    hosted.into_iter().map(|(vm, _)| vm).collect()
                } else {
                    BTreeSet::new()
                }
            }
            PlacementConstraint::Among { vms, groups } => {
                let hosted = running(vms);
                let nodes: BTreeSet<NodeId> = hosted.iter().map(|(_, node)| *node).collect();
                if groups.iter().any(|group| nodes.is_subset(group)) {
                    BTreeSet::new()
                } else {
                    hosted.into_iter().map(|(vm, _)| vm).collect()
                }
            }
            PlacementConstraint::Capacity { nodes, max } => {
                let hosted: BTreeSet<VmId> = nodes
                    .iter()
                    .filter(|node| node.index() < cfg.node_count())
                    .flat_map(|node| cfg.running_on(*node))
                    .collect();
                if hosted.len() > *max {
                    hosted
                } else {
                    BTreeSet::new()
                }
            }
            PlacementConstraint::Lonely { vms } => {
                let shared: BTreeSet<NodeId> = cfg
                    .vm_ids()
                    .filter(|vm| !vms.contains(vm))
                    .filter_map(|vm| cfg.running_host(vm))
                    .collect();
                running(vms)
                    .into_iter()
                    .filter(|(_, node)| shared.contains(node))
                    .map(|(vm, _)| vm)
                    .collect()
            }
            PlacementConstraint::Root { .. } | PlacementConstraint::Quarantine { .. } => {
                BTreeSet::new()
            }
        }
    }

    fn check_elements(&self, cfg: &Configuration) -> ReplanResult<()> {
        for element in self.elements() {
            let known = match element {
                ElementRef::Vm(vm) => vm.index() < cfg.vm_count(),
                ElementRef::Node(node) => node.index() < cfg.node_count(),
            };
            if !known {
                return Err(ReplanError::UnknownElement(format!(
                    "{:?} in {} constraint",
                    element,
                    self.name()
                )));
            }
        }
        Ok(())
    }

    /// Translate the rule into solver constraints
    pub fn add(&self, problem: &mut ReconfigurationProblem) -> ReplanResult<()> {
        self.check_elements(problem.source())?;
        let owners = self.elements();

        match self {
            PlacementConstraint::Fence { vms, nodes } => {
                for vm in vms {
                    problem.restrict_hoster(*vm, |node| nodes.contains(&node), &owners)?;
                }
            }
            PlacementConstraint::Ban { vms, nodes } => {
                for vm in vms {
                    problem.restrict_hoster(*vm, |node| !nodes.contains(&node), &owners)?;
                }
            }
            PlacementConstraint::Spread { vms } => {
                let placed = hosters(problem, vms);
                if placed.len() > 1 {
                    let vars = placed.iter().map(|(_, h)| *h).collect();
                    problem.post(AllDifferent::new(vars), owners.clone());
                }
                // A member arriving on a node another member leaves waits for the departure
                for (vm, hoster) in &placed {
                    let Some(start) = problem.associated_action(*vm).start() else {
                        continue;
                    };
                    for other in vms.iter().filter(|other| *other != vm) {
                        let leaving = problem
                            .source()
                            .running_host(*other)
                            .zip(problem.departure_end(*other));
                        if let Some((node, end)) = leaving {
                            problem.post(
                                GuardedPrecedence::new(*hoster, node.0 as i64, end, start),
                                owners.clone(),
                            );
                        }
                    }
                }
            }
            PlacementConstraint::Gather { vms } => {
                let placed = hosters(problem, vms);
                if placed.len() > 1 {
                    let vars = placed.into_iter().map(|(_, h)| h).collect();
                    problem.post(AllEqual::new(vars), owners);
                }
            }
            PlacementConstraint::Root { vms } => {
                for vm in vms {
                    if let Some(host) = problem.source().running_host(*vm) {
                        problem.restrict_hoster(*vm, |node| node == host, &owners)?;
                    }
                }
            }
            PlacementConstraint::Among { vms, groups } => {
                let placed = hosters(problem, vms);
                if placed.is_empty() {
                    return Ok(());
                }
                if groups.is_empty() {
                    return Err(ReplanError::InfeasibleModel {
                        elements: placed
                            .iter()
                            .map(|(vm, _)| problem.source().vm(*vm).name.clone())
                            .collect(),
                    });
                }
                let selector = problem.new_var(
                    "among.group",
                    IntDomain::interval(0, groups.len() as i64 - 1),
                );
                let groups = groups
                    .iter()
                    .map(|group| group.iter().map(|node| node.0 as i64).collect())
                    .collect();
                let vars = placed.into_iter().map(|(_, h)| h).collect();
                problem.post(Among::new(vars, groups, selector), owners);
            }
            PlacementConstraint::Capacity { nodes, max } => {
                let vars: Vec<VarId> = problem
                    .future_runnings()
                    .iter()
                    .filter_map(|vm| problem.hoster(*vm))
                    .collect();
                let values = nodes.iter().map(|node| node.0 as i64).collect();
                problem.post(AtMost::new(vars, values, *max), owners);
            }
            PlacementConstraint::Lonely { vms } => {
                let (inside, outside): (Vec<VmId>, Vec<VmId>) = problem
                    .future_runnings()
                    .iter()
                    .copied()
                    .partition(|vm| vms.contains(vm));
                let left: Vec<VarId> = inside.iter().filter_map(|vm| problem.hoster(*vm)).collect();
                let right: Vec<VarId> =
                    outside.iter().filter_map(|vm| problem.hoster(*vm)).collect();
                if !left.is_empty() && !right.is_empty() {
                    problem.post(Disjoint::new(left, right), owners);
                }
            }
            PlacementConstraint::Quarantine { nodes } => {
                let runnings = problem.future_runnings().to_vec();
                for vm in runnings {
                    match problem.source().running_host(vm) {
                        Some(host) if nodes.contains(&host) => {
                            problem.restrict_hoster(vm, |node| node == host, &owners)?
                        }
                        _ => problem.restrict_hoster(vm, |node| !nodes.contains(&node), &owners)?,
                    }
                }
            }
        }
        Ok(())
    }
}

fn hosters(problem: &ReconfigurationProblem, vms: &BTreeSet<VmId>) -> Vec<(VmId, VarId)> {
    vms.iter()
        .filter_map(|vm| problem.hoster(*vm).map(|h| (*vm, h)))
        .collect()
}
