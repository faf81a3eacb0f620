//! Duration estimates for actions
//!
//! The planner never measures anything itself: an external [`DurationEvaluator`] prices
//! every action once, while the model is being built.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::action::ActionType;
use crate::config::DurationConfig;
use crate::model::{Node, VirtualMachine};

/// Failure reported by a duration evaluator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("no duration known for '{element}'")]
    UnknownElement { element: String },

    #[error("invalid parameters for '{element}': {reason}")]
    InvalidParameters { element: String, reason: String },
}

/// Estimates how long each kind of action takes, in planner time units
pub trait DurationEvaluator: fmt::Debug + Send + Sync {
    fn run(&self, vm: &VirtualMachine) -> Result<u64, DurationError>;
    fn stop(&self, vm: &VirtualMachine) -> Result<u64, DurationError>;
    fn migration(&self, vm: &VirtualMachine) -> Result<u64, DurationError>;
    fn suspend(&self, vm: &VirtualMachine) -> Result<u64, DurationError>;
    fn local_resume(&self, vm: &VirtualMachine) -> Result<u64, DurationError>;
    fn remote_resume(&self, vm: &VirtualMachine) -> Result<u64, DurationError>;
    fn startup(&self, node: &Node) -> Result<u64, DurationError>;
    fn shutdown(&self, node: &Node) -> Result<u64, DurationError>;

    /// Evaluate a VM action by type
    fn vm_action(&self, action: ActionType, vm: &VirtualMachine) -> Result<u64, DurationError> {
        match action {
            ActionType::Run => self.run(vm),
            ActionType::Stop => self.stop(vm),
            ActionType::Migration => self.migration(vm),
            ActionType::Suspend => self.suspend(vm),
            ActionType::LocalResume => self.local_resume(vm),
            ActionType::RemoteResume => self.remote_resume(vm),
            ActionType::Startup | ActionType::Shutdown => Err(DurationError::InvalidParameters {
                element: vm.name.clone(),
                reason: format!("{} applies to nodes", action),
            }),
        }
    }

    /// Evaluate a node action by type
    fn node_action(&self, action: ActionType, node: &Node) -> Result<u64, DurationError> {
        match action {
            ActionType::Startup => self.startup(node),
            ActionType::Shutdown => self.shutdown(node),
            _ => Err(DurationError::InvalidParameters {
                element: node.name.clone(),
                reason: format!("{} applies to virtual machines", action),
            }),
        }
    }
}

/// Durations derived from the planner settings
///
/// Moving a VM's memory dominates migrations and remote resumes, so both grow with the
/// VM memory: `base + per_gib * ceil(memory / 1024)`.
#[derive(Debug, Clone)]
pub struct ConfiguredDurations {
    config: DurationConfig,
}

impl ConfiguredDurations {
    pub fn new(config: DurationConfig) -> Self {
        Self { config }
    }

    fn memory_bound(base: u64, per_gib: u64, vm: &VirtualMachine) -> u64 {
        base + per_gib * vm.memory_demand.div_ceil(1024)
    }
}

impl Default for ConfiguredDurations {
    fn default() -> Self {
        Self::new(DurationConfig::default())
    }
}

impl DurationEvaluator for ConfiguredDurations {
    fn run(&self, _vm: &VirtualMachine) -> Result<u64, DurationError> {
        Ok(self.config.run)
    }

    fn stop(&self, _vm: &VirtualMachine) -> Result<u64, DurationError> {
        Ok(self.config.stop)
    }

    fn migration(&self, vm: &VirtualMachine) -> Result<u64, DurationError> {
        Ok(Self::memory_bound(
            self.config.migration_base,
            self.config.migration_per_gib,
            vm,
        ))
    }

    fn suspend(&self, _vm: &VirtualMachine) -> Result<u64, DurationError> {
        Ok(self.config.suspend)
    }

    fn local_resume(&self, _vm: &VirtualMachine) -> Result<u64, DurationError> {
        Ok(self.config.local_resume)
    }

    fn remote_resume(&self, vm: &VirtualMachine) -> Result<u64, DurationError> {
        Ok(Self::memory_bound(
            self.config.local_resume,
            self.config.remote_resume_per_gib,
            vm,
        ))
    }

    fn startup(&self, _node: &Node) -> Result<u64, DurationError> {
        Ok(self.config.startup)
    }

    fn shutdown(&self, _node: &Node) -> Result<u64, DurationError> {
        Ok(self.config.shutdown)
    }
}

/// Explicit durations per action type and element name
///
/// Looking up an element that has no entry fails, which makes the table handy to pin
/// exact schedules in tests.
#[derive(Debug, Clone, Default)]
pub struct DurationTable {
    entries: HashMap<(ActionType, String), u64>,
}

impl DurationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, action: ActionType, element: impl Into<String>, duration: u64) -> Self {
        self.insert(action, element, duration);
        self
    }

    pub fn insert(&mut self, action: ActionType, element: impl Into<String>, duration: u64) {
        self.entries.insert((action, element.into()), duration);
    }

    fn lookup(&self, action: ActionType, element: &str) -> Result<u64, DurationError> {
        self.entries
            .get(&(action, element.to_string()))
            .copied()
            .ok_or_else(|| DurationError::UnknownElement {
                element: element.to_string(),
            })
    }
}

impl DurationEvaluator for DurationTable {
    fn run(&self, vm: &VirtualMachine) -> Result<u64, DurationError> {
        self.lookup(ActionType::Run, &vm.name)
    }

    fn stop(&self, vm: &VirtualMachine) -> Result<u64, DurationError> {
        self.lookup(ActionType::Stop, &vm.name)
    }

    fn migration(&self, vm: &VirtualMachine) -> Result<u64, DurationError> {
        self.lookup(ActionType::Migration, &vm.name)
    }

    fn suspend(&self, vm: &VirtualMachine) -> Result<u64, DurationError> {
        self.lookup(ActionType::Suspend, &vm.name)
    }

    fn local_resume(&self, vm: &VirtualMachine) -> Result<u64, DurationError> {
        self.lookup(ActionType::LocalResume, &vm.name)
    }

    fn remote_resume(&self, vm: &VirtualMachine) -> Result<u64, DurationError> {
        self.lookup(ActionType::RemoteResume, &vm.name)
    }

    fn startup(&self, node: &Node) -> Result<u64, DurationError> {
        self.lookup(ActionType::Startup, &node.name)
    }

    fn shutdown(&self, node: &Node) -> Result<u64, DurationError> {
        self.lookup(ActionType::Shutdown, &node.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_grows_with_memory() {
        let evaluator = ConfiguredDurations::new(DurationConfig {
            migration_base: 2,
            migration_per_gib: 3,
            ..DurationConfig::default()
        });
        let small = VirtualMachine::new("small", 1, 512);
        let big = VirtualMachine::new("big", 1, 4096);
        assert_eq!(evaluator.migration(&small).unwrap(), 5);
        assert_eq!(evaluator.migration(&big).unwrap(), 14);
        assert_eq!(
            evaluator.vm_action(ActionType::Migration, &big).unwrap(),
            14
        );
    }

    #[test]
    fn test_table_rejects_unknown_elements() {
        let table = DurationTable::new().with(ActionType::Run, "vm1", 4);
        let vm1 = VirtualMachine::new("vm1", 1, 1);
        let vm2 = VirtualMachine::new("vm2", 1, 1);
        assert_eq!(table.run(&vm1).unwrap(), 4);
        assert_eq!(
            table.run(&vm2),
            Err(DurationError::UnknownElement {
                element: "vm2".to_string()
            })
        );
        assert!(table.stop(&vm1).is_err());
    }

    #[test]
    fn test_type_dispatch_rejects_mismatched_element_kinds() {
        let evaluator = ConfiguredDurations::default();
        let vm = VirtualMachine::new("vm1", 1, 1);
        let node = Node::new("n1", 1, 1);
        assert!(evaluator.vm_action(ActionType::Startup, &vm).is_err());
        assert!(evaluator.node_action(ActionType::Run, &node).is_err());
        assert!(evaluator.node_action(ActionType::Shutdown, &node).is_ok());
    }
}
