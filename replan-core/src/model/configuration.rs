//! Cluster configuration: nodes, virtual machines and the hosting relation at one instant

use std::collections::BTreeMap;

use crate::error::{ReplanError, ReplanResult};
use crate::model::element::{
    ElementRef, Node, NodeId, NodeState, ResourceDimension, VirtualMachine, VmId, VmState,
};

/// Where a virtual machine is and in which state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VmPlacement {
    Running(NodeId),
    Sleeping(NodeId),
    Waiting,
    Terminated,
}

impl VmPlacement {
    pub fn state(self) -> VmState {
        match self {
            VmPlacement::Running(_) => VmState::Running,
            VmPlacement::Sleeping(_) => VmState::Sleeping,
            VmPlacement::Waiting => VmState::Waiting,
            VmPlacement::Terminated => VmState::Terminated,
        }
    }

    /// Node holding the VM, for running and sleeping VMs
    pub fn host(self) -> Option<NodeId> {
        match self {
            VmPlacement::Running(node) | VmPlacement::Sleeping(node) => Some(node),
            VmPlacement::Waiting | VmPlacement::Terminated => None,
        }
    }
}

/// Snapshot of the cluster
///
/// Nodes and VMs are stored in arenas: [`NodeId`] and [`VmId`] are indices valid for this
/// configuration and for every configuration derived from it by applying actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    nodes: Vec<Node>,
    node_states: Vec<NodeState>,
    vms: Vec<VirtualMachine>,
    placements: Vec<VmPlacement>,
    node_names: BTreeMap<String, NodeId>,
    vm_names: BTreeMap<String, VmId>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node with the given power state
    pub fn add_node(&mut self, node: Node, state: NodeState) -> ReplanResult<NodeId> {
        if self.node_names.contains_key(&node.name) || self.vm_names.contains_key(&node.name) {
            return Err(ReplanError::DuplicateElement(node.name));
        }
        let id = NodeId(self.nodes.len() as u32);
        self.node_names.insert(node.name.clone(), id);
        self.nodes.push(node);
        self.node_states.push(state);
        Ok(id)
    }

    /// Register a virtual machine, initially waiting
    pub fn add_vm(&mut self, vm: VirtualMachine) -> ReplanResult<VmId> {
        if self.vm_names.contains_key(&vm.name) || self.node_names.contains_key(&vm.name) {
            return Err(ReplanError::DuplicateElement(vm.name));
        }
        let id = VmId(self.vms.len() as u32);
        self.vm_names.insert(vm.name.clone(), id);
        self.vms.push(vm);
        self.placements.push(VmPlacement::Waiting);
        Ok(id)
    }

    pub fn set_running(&mut self, vm: VmId, node: NodeId) -> ReplanResult<()> {
        self.place(vm, VmPlacement::Running(node))
    }

    pub fn set_sleeping(&mut self, vm: VmId, node: NodeId) -> ReplanResult<()> {
        self.place(vm, VmPlacement::Sleeping(node))
    }

    pub fn set_waiting(&mut self, vm: VmId) -> ReplanResult<()> {
        self.place(vm, VmPlacement::Waiting)
    }

    pub fn set_terminated(&mut self, vm: VmId) -> ReplanResult<()> {
        self.place(vm, VmPlacement::Terminated)
    }

    fn place(&mut self, vm: VmId, placement: VmPlacement) -> ReplanResult<()> {
        self.check_vm(vm)?;
        if let Some(node) = placement.host() {
            self.check_node(node)?;
        }
        self.placements[vm.index()] = placement;
        Ok(())
    }

    pub fn set_node_state(&mut self, node: NodeId, state: NodeState) -> ReplanResult<()> {
        self.check_node(node)?;
        self.node_states[node.index()] = state;
        Ok(())
    }

    fn check_vm(&self, vm: VmId) -> ReplanResult<()> {
        if vm.index() < self.vms.len() {
            Ok(())
        } else {
            Err(ReplanError::UnknownElement(format!("vm #{}", vm.0)))
        }
    }

    fn check_node(&self, node: NodeId) -> ReplanResult<()> {
        if node.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(ReplanError::UnknownElement(format!("node #{}", node.0)))
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn vm(&self, id: VmId) -> &VirtualMachine {
        &self.vms[id.index()]
    }

    pub fn node_id(&self, name: &str) -> ReplanResult<NodeId> {
        self.node_names
            .get(name)
            .copied()
            .ok_or_else(|| ReplanError::UnknownElement(name.to_string()))
    }

    pub fn vm_id(&self, name: &str) -> ReplanResult<VmId> {
        self.vm_names
            .get(name)
            .copied()
            .ok_or_else(|| ReplanError::UnknownElement(name.to_string()))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn vm_count(&self) -> usize {
        self.vms.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn vm_ids(&self) -> impl Iterator<Item = VmId> + '_ {
        (0..self.vms.len() as u32).map(VmId)
    }

    pub fn node_state(&self, node: NodeId) -> NodeState {
        self.node_states[node.index()]
    }

    pub fn is_online(&self, node: NodeId) -> bool {
        self.node_state(node) == NodeState::Online
    }

    pub fn placement(&self, vm: VmId) -> VmPlacement {
        self.placements[vm.index()]
    }

    pub fn vm_state(&self, vm: VmId) -> VmState {
        self.placement(vm).state()
    }

    /// Node running the VM, if it is running
    pub fn running_host(&self, vm: VmId) -> Option<NodeId> {
        match self.placement(vm) {
            VmPlacement::Running(node) => Some(node),
            _ => None,
        }
    }

    /// VMs in the given state, in arena order
    pub fn vms_in(&self, state: VmState) -> impl Iterator<Item = VmId> + '_ {
        self.vm_ids().filter(move |vm| self.vm_state(*vm) == state)
    }

    pub fn running_on(&self, node: NodeId) -> impl Iterator<Item = VmId> + '_ {
        self.vm_ids()
            .filter(move |vm| self.placement(*vm) == VmPlacement::Running(node))
    }

    pub fn sleeping_on(&self, node: NodeId) -> impl Iterator<Item = VmId> + '_ {
        self.vm_ids()
            .filter(move |vm| self.placement(*vm) == VmPlacement::Sleeping(node))
    }

    /// Aggregated demand of the VMs running on a node
    pub fn load(&self, node: NodeId, dimension: ResourceDimension) -> u64 {
        self.running_on(node)
            .map(|vm| self.vm(vm).demand(dimension))
            .sum()
    }

    /// Human readable name of an element
    pub fn name_of(&self, element: ElementRef) -> &str {
        match element {
            ElementRef::Node(node) => &self.node(node).name,
            ElementRef::Vm(vm) => &self.vm(vm).name,
        }
    }

    /// Check structural invariants: hosted VMs sit on known, online nodes
    pub fn validate(&self) -> ReplanResult<()> {
        for vm in self.vm_ids() {
            if let Some(node) = self.placement(vm).host() {
                self.check_node(node)?;
                if !self.is_online(node) {
                    return Err(ReplanError::InvalidConfiguration {
                        message: format!(
                            "VM '{}' is {} on offline node '{}'",
                            self.vm(vm).name,
                            self.vm_state(vm),
                            self.node(node).name
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Nodes whose running VMs exceed their capacity on some dimension
    pub fn overloaded_nodes(&self) -> Vec<NodeId> {
        self.node_ids()
            .filter(|node| {
                ResourceDimension::ALL
                    .iter()
                    .any(|dim| self.load(*node, *dim) > self.node(*node).capacity(*dim))
            })
            .collect()
    }

    /// Whether every node can run its VMs
    pub fn is_viable(&self) -> bool {
        self.overloaded_nodes().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Configuration, NodeId, NodeId, VmId, VmId) {
        let mut cfg = Configuration::new();
        let n1 = cfg.add_node(Node::new("n1", 4, 4096), NodeState::Online).unwrap();
        let n2 = cfg.add_node(Node::new("n2", 2, 2048), NodeState::Online).unwrap();
        let vm1 = cfg.add_vm(VirtualMachine::new("vm1", 2, 1024)).unwrap();
        let vm2 = cfg.add_vm(VirtualMachine::new("vm2", 1, 512)).unwrap();
        cfg.set_running(vm1, n1).unwrap();
        cfg.set_sleeping(vm2, n2).unwrap();
        (cfg, n1, n2, vm1, vm2)
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let (mut cfg, ..) = sample();
        assert!(matches!(
            cfg.add_node(Node::new("n1", 1, 1), NodeState::Online),
            Err(ReplanError::DuplicateElement(_))
        ));
        assert!(matches!(
            cfg.add_vm(VirtualMachine::new("n2", 1, 1)),
            Err(ReplanError::DuplicateElement(_))
        ));
    }

    #[test]
    fn test_loads_only_count_running_vms() {
        let (cfg, n1, n2, vm1, vm2) = sample();
        assert_eq!(cfg.load(n1, ResourceDimension::Cpu), 2);
        assert_eq!(cfg.load(n1, ResourceDimension::Memory), 1024);
        assert_eq!(cfg.load(n2, ResourceDimension::Cpu), 0);
        assert_eq!(cfg.running_host(vm1), Some(n1));
        assert_eq!(cfg.running_host(vm2), None);
        assert_eq!(cfg.placement(vm2).host(), Some(n2));
        assert!(cfg.is_viable());
    }

    #[test]
    fn test_overload_and_offline_hosting_are_detected() {
        let (mut cfg, n1, n2, _, vm2) = sample();
        cfg.set_running(vm2, n1).unwrap();
        let big = cfg.add_vm(VirtualMachine::new("big", 3, 100)).unwrap();
        cfg.set_running(big, n1).unwrap();
        assert_eq!(cfg.overloaded_nodes(), vec![n1]);

        cfg.set_node_state(n2, NodeState::Offline).unwrap();
        cfg.set_sleeping(vm2, n2).unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ReplanError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_lookup_by_name() {
        let (cfg, n1, _, vm1, _) = sample();
        assert_eq!(cfg.node_id("n1").unwrap(), n1);
        assert_eq!(cfg.vm_id("vm1").unwrap(), vm1);
        assert!(cfg.vm_id("nope").is_err());
        assert_eq!(cfg.name_of(ElementRef::Vm(vm1)), "vm1");
    }
}
