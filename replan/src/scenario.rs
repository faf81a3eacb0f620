//! Scenario files
//!
//! A scenario names its elements instead of indexing them:
//!
//! ```yaml
//! nodes:
//!   - { name: n1, cpu: 4, memory: 4096 }
//!   - { name: n2, cpu: 4, memory: 4096, state: offline }
//! vms:
//!   - { name: vm1, cpu: 2, memory: 1024, state: running, host: n1 }
//!   - { name: vm2, cpu: 2, memory: 1024 }
//! targets:
//!   run: [vm2]
//!   online: [n2]
//! constraints:
//!   - { type: spread, vms: [vm1, vm2] }
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

use replan_core::{
    Configuration, Node, NodeId, NodeState, PlacementConstraint, PlanningRequest, TargetStates,
    VirtualMachine, VmId, VmState,
};

use crate::error::{CliError, CliResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub vms: Vec<VmSpec>,
    #[serde(default)]
    pub targets: TargetSpec,
    #[serde(default)]
    pub constraints: Vec<ConstraintSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub name: String,
    pub cpu: u64,
    /// MB
    pub memory: u64,
    #[serde(default = "online")]
    pub state: NodeState,
}

fn online() -> NodeState {
    NodeState::Online
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VmSpec {
    pub name: String,
    pub cpu: u64,
    /// MB
    pub memory: u64,
    #[serde(default = "waiting")]
    pub state: VmState,
    /// Required for running and sleeping VMs
    pub host: Option<String>,
}

fn waiting() -> VmState {
    VmState::Waiting
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetSpec {
    pub run: Vec<String>,
    pub sleep: Vec<String>,
    pub stop: Vec<String>,
    pub online: Vec<String>,
    pub offline: Vec<String>,
}

/// Placement rule over element names
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", deny_unknown_fields)]
pub enum ConstraintSpec {
    Fence { vms: Vec<String>, nodes: Vec<String> },
    Ban { vms: Vec<String>, nodes: Vec<String> },
    Spread { vms: Vec<String> },
    Gather { vms: Vec<String> },
    Root { vms: Vec<String> },
    Among { vms: Vec<String>, groups: Vec<Vec<String>> },
    Capacity { nodes: Vec<String>, max: usize },
    Lonely { vms: Vec<String> },
    Quarantine { nodes: Vec<String> },
}

impl Scenario {
    /// Load a scenario, as YAML for `.yaml`/`.yml` files and JSON otherwise
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            _ => Ok(serde_json::from_str(&content)?),
        }
    }

    /// Resolve names into a planning request
    pub fn into_request(self) -> CliResult<PlanningRequest> {
        let mut source = Configuration::new();
        for node in &self.nodes {
            source.add_node(Node::new(&node.name, node.cpu, node.memory), node.state)?;
        }
        for spec in &self.vms {
            let vm = source.add_vm(VirtualMachine::new(&spec.name, spec.cpu, spec.memory))?;
            let host = spec
                .host
                .as_deref()
                .map(|name| source.node_id(name))
                .transpose()?;
            match (spec.state, host) {
                (VmState::Running, Some(node)) => source.set_running(vm, node)?,
                (VmState::Sleeping, Some(node)) => source.set_sleeping(vm, node)?,
                (VmState::Waiting, None) => source.set_waiting(vm)?,
                (VmState::Terminated, None) => source.set_terminated(vm)?,
                (state, Some(_)) => {
                    return Err(CliError::Scenario(format!(
                        "{} VM '{}' cannot have a host",
                        state, spec.name
                    )))
                }
                (state, None) => {
                    return Err(CliError::Scenario(format!(
                        "{} VM '{}' needs a host",
                        state, spec.name
                    )))
                }
            }
        }

        let targets = TargetStates::new()
            .run(vm_ids(&source, &self.targets.run)?)
            .sleep(vm_ids(&source, &self.targets.sleep)?)
            .stop(vm_ids(&source, &self.targets.stop)?)
            .online(node_ids(&source, &self.targets.online)?)
            .offline(node_ids(&source, &self.targets.offline)?);

        let constraints = self
            .constraints
            .iter()
            .map(|spec| spec.resolve(&source))
            .collect::<CliResult<Vec<_>>>()?;

        Ok(PlanningRequest {
            source,
            targets,
            constraints,
        })
    }
}

impl ConstraintSpec {
    fn resolve(&self, cfg: &Configuration) -> CliResult<PlacementConstraint> {
        let constraint = match self {
            ConstraintSpec::Fence { vms, nodes } => {
                PlacementConstraint::fence(vm_ids(cfg, vms)?, node_ids(cfg, nodes)?)
            }
            ConstraintSpec::Ban { vms, nodes } => {
                PlacementConstraint::ban(vm_ids(cfg, vms)?, node_ids(cfg, nodes)?)
            }
            ConstraintSpec::Spread { vms } => PlacementConstraint::spread(vm_ids(cfg, vms)?),
            ConstraintSpec::Gather { vms } => PlacementConstraint::gather(vm_ids(cfg, vms)?),
            ConstraintSpec::Root { vms } => PlacementConstraint::root(vm_ids(cfg, vms)?),
            ConstraintSpec::Among { vms, groups } => {
                let groups = groups
                    .iter()
                    .map(|group| Ok(node_ids(cfg, group)?.into_iter().collect()))
                    .collect::<CliResult<Vec<BTreeSet<NodeId>>>>()?;
                PlacementConstraint::among(vm_ids(cfg, vms)?, groups)
            }
            ConstraintSpec::Capacity { nodes, max } => {
                PlacementConstraint::capacity(node_ids(cfg, nodes)?, *max)
            }
            ConstraintSpec::Lonely { vms } => PlacementConstraint::lonely(vm_ids(cfg, vms)?),
            ConstraintSpec::Quarantine { nodes } => {
                PlacementConstraint::quarantine(node_ids(cfg, nodes)?)
            }
        };
        Ok(constraint)
    }
}

fn vm_ids(cfg: &Configuration, names: &[String]) -> CliResult<Vec<VmId>> {
    names
        .iter()
        .map(|name| cfg.vm_id(name).map_err(CliError::from))
        .collect()
}

fn node_ids(cfg: &Configuration, names: &[String]) -> CliResult<Vec<NodeId>> {
    names
        .iter()
        .map(|name| cfg.node_id(name).map_err(CliError::from))
        .collect()
}
