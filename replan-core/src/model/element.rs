//! Managed elements: physical nodes and virtual machines

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a node inside its configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Index of a virtual machine inside its configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VmId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl VmId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Either kind of managed element
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ElementRef {
    Node(NodeId),
    Vm(VmId),
}

/// Resource dimension tracked by the capacity constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceDimension {
    Cpu,
    Memory,
}

impl ResourceDimension {
    pub const ALL: [ResourceDimension; 2] = [ResourceDimension::Cpu, ResourceDimension::Memory];
}

impl fmt::Display for ResourceDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceDimension::Cpu => write!(f, "cpu"),
            ResourceDimension::Memory => write!(f, "memory"),
        }
    }
}

/// Power state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Online,
    Offline,
}

/// Lifecycle state of a virtual machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmState {
    /// Running on a node and consuming its resources
    Running,
    /// Suspended to the disk of a node, consuming no CPU or memory
    Sleeping,
    /// Not started yet
    Waiting,
    /// Stopped for good
    Terminated,
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VmState::Running => "running",
            VmState::Sleeping => "sleeping",
            VmState::Waiting => "waiting",
            VmState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// A physical node able to host virtual machines
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    /// CPU capacity, in the same unit as VM CPU demands
    pub cpu_capacity: u64,
    /// Memory capacity in MB
    pub memory_capacity: u64,
}

impl Node {
    pub fn new(name: impl Into<String>, cpu_capacity: u64, memory_capacity: u64) -> Self {
        Self {
            name: name.into(),
            cpu_capacity,
            memory_capacity,
        }
    }

    pub fn capacity(&self, dimension: ResourceDimension) -> u64 {
        match dimension {
            ResourceDimension::Cpu => self.cpu_capacity,
            ResourceDimension::Memory => self.memory_capacity,
        }
    }
}

/// A virtual machine and its resource demand
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub name: String,
    pub cpu_demand: u64,
    /// Memory demand in MB
    pub memory_demand: u64,
}

impl VirtualMachine {
    pub fn new(name: impl Into<String>, cpu_demand: u64, memory_demand: u64) -> Self {
        Self {
            name: name.into(),
            cpu_demand,
            memory_demand,
        }
    }

    pub fn demand(&self, dimension: ResourceDimension) -> u64 {
        match dimension {
            ResourceDimension::Cpu => self.cpu_demand,
            ResourceDimension::Memory => self.memory_demand,
        }
    }
}
