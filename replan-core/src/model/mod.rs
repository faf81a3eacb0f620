//! Cluster model: managed elements, configurations and requested target states

pub mod configuration;
pub mod element;
pub mod targets;

pub use configuration::{Configuration, VmPlacement};
pub use element::{
    ElementRef, Node, NodeId, NodeState, ResourceDimension, VirtualMachine, VmId, VmState,
};
pub use targets::TargetStates;
