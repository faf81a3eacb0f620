//! Eventual states requested for the managed elements

use std::collections::BTreeSet;

use crate::model::configuration::Configuration;
use crate::model::element::{NodeId, NodeState, VmId, VmState};

/// States the cluster has to reach
///
/// Elements that are not mentioned keep the state they have in the source configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetStates {
    run: BTreeSet<VmId>,
    sleep: BTreeSet<VmId>,
    stop: BTreeSet<VmId>,
    online: BTreeSet<NodeId>,
    offline: BTreeSet<NodeId>,
}

impl TargetStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(mut self, vms: impl IntoIterator<Item = VmId>) -> Self {
        for vm in vms {
            self.forget_vm(vm);
            self.run.insert(vm);
        }
        self
    }

    pub fn sleep(mut self, vms: impl IntoIterator<Item = VmId>) -> Self {
        for vm in vms {
            self.forget_vm(vm);
            self.sleep.insert(vm);
        }
        self
    }

    pub fn stop(mut self, vms: impl IntoIterator<Item = VmId>) -> Self {
        for vm in vms {
            self.forget_vm(vm);
            self.stop.insert(vm);
        }
        self
    }

    pub fn online(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        for node in nodes {
            self.offline.remove(&node);
            self.online.insert(node);
        }
        self
    }

    pub fn offline(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        for node in nodes {
            self.online.remove(&node);
            self.offline.insert(node);
        }
        self
    }

    fn forget_vm(&mut self, vm: VmId) {
        self.run.remove(&vm);
        self.sleep.remove(&vm);
        self.stop.remove(&vm);
    }

    /// State the VM must be in once the plan is applied
    pub fn vm_target(&self, source: &Configuration, vm: VmId) -> VmState {
        if self.run.contains(&vm) {
            VmState::Running
        } else if self.sleep.contains(&vm) {
            VmState::Sleeping
        } else if self.stop.contains(&vm) {
            VmState::Terminated
        } else {
            source.vm_state(vm)
        }
    }

    /// Power state the node must be in once the plan is applied
    pub fn node_target(&self, source: &Configuration, node: NodeId) -> NodeState {
        if self.online.contains(&node) {
            NodeState::Online
        } else if self.offline.contains(&node) {
            NodeState::Offline
        } else {
            source.node_state(node)
        }
    }

    /// Every element mentioned by the targets
    pub fn mentioned_vms(&self) -> impl Iterator<Item = VmId> + '_ {
        self.run.iter().chain(&self.sleep).chain(&self.stop).copied()
    }

    pub fn mentioned_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.online.iter().chain(&self.offline).copied()
    }
}
