// Shared helpers for the integration tests
#![allow(dead_code)]

use std::time::Duration;

use replan_core::{
    Configuration, Node, NodeState, Planner, PlannerConfig, PlannerConfigBuilder, SearchMode,
    VirtualMachine,
};

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Online node with `cpu` cores and `memory` MB
pub fn node(name: &str, cpu: u64, memory: u64) -> (Node, NodeState) {
    (Node::new(name, cpu, memory), NodeState::Online)
}

pub fn offline_node(name: &str, cpu: u64, memory: u64) -> (Node, NodeState) {
    (Node::new(name, cpu, memory), NodeState::Offline)
}

/// Build a configuration; each VM runs on the named node, or waits when `host` is `None`
pub fn cluster(
    nodes: &[(Node, NodeState)],
    vms: &[(&str, u64, u64, Option<&str>)],
) -> Configuration {
    let mut cfg = Configuration::new();
    for (node, state) in nodes {
        cfg.add_node(node.clone(), *state).unwrap();
    }
    for (name, cpu, memory, host) in vms {
        let vm = cfg.add_vm(VirtualMachine::new(*name, *cpu, *memory)).unwrap();
        if let Some(host) = host {
            let node = cfg.node_id(host).unwrap();
            cfg.set_running(vm, node).unwrap();
        }
    }
    cfg
}

pub fn test_config(mode: SearchMode) -> PlannerConfig {
    PlannerConfigBuilder::new()
        .timeout(TEST_TIMEOUT)
        .mode(mode)
        .build()
        .unwrap()
}

pub fn planner() -> Planner {
    Planner::with_config(test_config(SearchMode::First))
}
