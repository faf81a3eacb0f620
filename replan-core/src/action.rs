//! Reconfiguration actions
//!
//! An [`Action`] is one typed operation on a virtual machine or a node, with fixed start
//! and end instants chosen by the solver. Actions are immutable values: equality, hashing
//! and ordering cover the type, the element, the source and destination nodes and both
//! time bounds, so they can be stored in sets by the dependency graph.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ReplanError, ReplanResult};
use crate::model::{Configuration, ElementRef, NodeId, NodeState, VmId, VmPlacement};

/// Kind of an action, used to key duration evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    Run,
    Stop,
    Migration,
    Suspend,
    LocalResume,
    RemoteResume,
    Startup,
    Shutdown,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionType::Run => "run",
            ActionType::Stop => "stop",
            ActionType::Migration => "migration",
            ActionType::Suspend => "suspend",
            ActionType::LocalResume => "local-resume",
            ActionType::RemoteResume => "remote-resume",
            ActionType::Startup => "startup",
            ActionType::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// What an action does, and on which elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Run { vm: VmId, node: NodeId },
    Stop { vm: VmId, node: NodeId },
    Migration { vm: VmId, from: NodeId, to: NodeId },
    Suspend { vm: VmId, node: NodeId },
    LocalResume { vm: VmId, node: NodeId },
    RemoteResume { vm: VmId, from: NodeId, to: NodeId },
    Startup { node: NodeId },
    Shutdown { node: NodeId },
}

impl ActionKind {
    pub fn action_type(&self) -> ActionType {
        match self {
            ActionKind::Run { .. } => ActionType::Run,
            ActionKind::Stop { .. } => ActionType::Stop,
            ActionKind::Migration { .. } => ActionType::Migration,
            ActionKind::Suspend { .. } => ActionType::Suspend,
            ActionKind::LocalResume { .. } => ActionType::LocalResume,
            ActionKind::RemoteResume { .. } => ActionType::RemoteResume,
            ActionKind::Startup { .. } => ActionType::Startup,
            ActionKind::Shutdown { .. } => ActionType::Shutdown,
        }
    }
}

/// A scheduled action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub start: u64,
    pub end: u64,
}

impl Action {
    pub fn new(kind: ActionKind, start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "action ends before it starts");
        Self { kind, start, end }
    }

    pub fn action_type(&self) -> ActionType {
        self.kind.action_type()
    }

    pub fn duration(&self) -> u64 {
        self.end - self.start
    }

    /// The managed element this action operates on
    pub fn element(&self) -> ElementRef {
        match self.kind {
            ActionKind::Run { vm, .. }
            | ActionKind::Stop { vm, .. }
            | ActionKind::Migration { vm, .. }
            | ActionKind::Suspend { vm, .. }
            | ActionKind::LocalResume { vm, .. }
            | ActionKind::RemoteResume { vm, .. } => ElementRef::Vm(vm),
            ActionKind::Startup { node } | ActionKind::Shutdown { node } => ElementRef::Node(node),
        }
    }

    /// Node on which the action acquires resources
    pub fn incoming_node(&self) -> Option<NodeId> {
        match self.kind {
            ActionKind::Run { node, .. } | ActionKind::LocalResume { node, .. } => Some(node),
            ActionKind::Migration { to, .. } | ActionKind::RemoteResume { to, .. } => Some(to),
            ActionKind::Shutdown { node } => Some(node),
            ActionKind::Stop { .. } | ActionKind::Suspend { .. } | ActionKind::Startup { .. } => {
                None
            }
        }
    }

    /// Node on which the action releases resources once it completes
    pub fn outgoing_node(&self) -> Option<NodeId> {
        match self.kind {
            ActionKind::Stop { node, .. } | ActionKind::Suspend { node, .. } => Some(node),
            ActionKind::Migration { from, .. } => Some(from),
            ActionKind::Startup { node } => Some(node),
            ActionKind::Run { .. }
            | ActionKind::LocalResume { .. }
            | ActionKind::RemoteResume { .. }
            | ActionKind::Shutdown { .. } => None,
        }
    }

    /// Configuration obtained by applying this action, leaving the input untouched
    pub fn apply(&self, configuration: &Configuration) -> ReplanResult<Configuration> {
        let mut next = configuration.clone();
        self.apply_in_place(&mut next)?;
        Ok(next)
    }

    /// Apply the action directly on a configuration
    ///
    /// The configuration is left unchanged when the precondition does not hold.
    pub fn apply_in_place(&self, cfg: &mut Configuration) -> ReplanResult<()> {
        match self.kind {
            ActionKind::Run { vm, node } => {
                self.expect_vm(cfg, vm, VmPlacement::Waiting)?;
                self.expect_online(cfg, node)?;
                cfg.set_running(vm, node)
            }
            ActionKind::Stop { vm, node } => {
                self.expect_vm(cfg, vm, VmPlacement::Running(node))?;
                cfg.set_terminated(vm)
            }
            ActionKind::Migration { vm, from, to } => {
                self.expect_vm(cfg, vm, VmPlacement::Running(from))?;
                self.expect_online(cfg, to)?;
                cfg.set_running(vm, to)
            }
            ActionKind::Suspend { vm, node } => {
                self.expect_vm(cfg, vm, VmPlacement::Running(node))?;
                cfg.set_sleeping(vm, node)
            }
            ActionKind::LocalResume { vm, node } => {
                self.expect_vm(cfg, vm, VmPlacement::Sleeping(node))?;
                cfg.set_running(vm, node)
            }
            ActionKind::RemoteResume { vm, from, to } => {
                self.expect_vm(cfg, vm, VmPlacement::Sleeping(from))?;
                self.expect_online(cfg, to)?;
                cfg.set_running(vm, to)
            }
            ActionKind::Startup { node } => {
                if cfg.is_online(node) {
                    return Err(self.precondition(cfg, "node is already online"));
                }
                cfg.set_node_state(node, NodeState::Online)
            }
            ActionKind::Shutdown { node } => {
                if !cfg.is_online(node) {
                    return Err(self.precondition(cfg, "node is already offline"));
                }
                if cfg.running_on(node).next().is_some() || cfg.sleeping_on(node).next().is_some() {
                    return Err(self.precondition(cfg, "node still hosts virtual machines"));
                }
                cfg.set_node_state(node, NodeState::Offline)
            }
        }
    }

    fn expect_vm(&self, cfg: &Configuration, vm: VmId, expected: VmPlacement) -> ReplanResult<()> {
        if vm.index() >= cfg.vm_count() {
            return Err(ReplanError::UnknownElement(format!("vm #{}", vm.0)));
        }
        if cfg.placement(vm) != expected {
            return Err(self.precondition(
                cfg,
                &format!("VM '{}' is not in the expected state", cfg.vm(vm).name),
            ));
        }
        Ok(())
    }

    fn expect_online(&self, cfg: &Configuration, node: NodeId) -> ReplanResult<()> {
        if node.index() >= cfg.node_count() {
            return Err(ReplanError::UnknownElement(format!("node #{}", node.0)));
        }
        if !cfg.is_online(node) {
            return Err(self.precondition(
                cfg,
                &format!("node '{}' is offline", cfg.node(node).name),
            ));
        }
        Ok(())
    }

    fn precondition(&self, cfg: &Configuration, reason: &str) -> ReplanError {
        ReplanError::invalid_operation(self.label(cfg), reason)
    }

    /// Compact label naming the elements, e.g. `migrate(vm3,n1,n2)`
    pub fn label(&self, cfg: &Configuration) -> String {
        let vm = |id: VmId| cfg.vm(id).name.as_str();
        let node = |id: NodeId| cfg.node(id).name.as_str();
        match self.kind {
            ActionKind::Run { vm: v, node: n } => format!("run({},{})", vm(v), node(n)),
            ActionKind::Stop { vm: v, node: n } => format!("stop({},{})", vm(v), node(n)),
            ActionKind::Migration { vm: v, from, to } => {
                format!("migrate({},{},{})", vm(v), node(from), node(to))
            }
            ActionKind::Suspend { vm: v, node: n } => format!("suspend({},{})", vm(v), node(n)),
            ActionKind::LocalResume { vm: v, node: n } => {
                format!("resume({},{})", vm(v), node(n))
            }
            ActionKind::RemoteResume { vm: v, from, to } => {
                format!("resume({},{},{})", vm(v), node(from), node(to))
            }
            ActionKind::Startup { node: n } => format!("startup({})", node(n)),
            ActionKind::Shutdown { node: n } => format!("shutdown({})", node(n)),
        }
    }

    /// Label with its time window, e.g. `migrate(vm3,n1,n2)[7,9]`
    pub fn describe(&self, cfg: &Configuration) -> String {
        format!("{}[{},{}]", self.label(cfg), self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, VirtualMachine, VmState};
    use std::collections::HashSet;

    fn cluster() -> (Configuration, NodeId, NodeId, VmId) {
        let mut cfg = Configuration::new();
        let n1 = cfg.add_node(Node::new("n1", 4, 4096), NodeState::Online).unwrap();
        let n2 = cfg.add_node(Node::new("n2", 4, 4096), NodeState::Online).unwrap();
        let vm = cfg.add_vm(VirtualMachine::new("vm1", 1, 512)).unwrap();
        cfg.set_running(vm, n1).unwrap();
        (cfg, n1, n2, vm)
    }

    #[test]
    fn test_apply_does_not_mutate_input() {
        let (cfg, n1, n2, vm) = cluster();
        let migration = Action::new(ActionKind::Migration { vm, from: n1, to: n2 }, 0, 5);
        let next = migration.apply(&cfg).unwrap();
        assert_eq!(cfg.running_host(vm), Some(n1));
        assert_eq!(next.running_host(vm), Some(n2));
    }

    #[test]
    fn test_apply_checks_preconditions() {
        let (cfg, n1, n2, vm) = cluster();
        let wrong = Action::new(ActionKind::Migration { vm, from: n2, to: n1 }, 0, 5);
        let err = wrong.apply(&cfg).unwrap_err();
        assert!(matches!(err, ReplanError::InvalidOperation { .. }));

        let shutdown = Action::new(ActionKind::Shutdown { node: n1 }, 0, 1);
        assert!(shutdown.apply(&cfg).is_err());
        let shutdown = Action::new(ActionKind::Shutdown { node: n2 }, 0, 1);
        let off = shutdown.apply(&cfg).unwrap();
        assert!(!off.is_online(n2));

        let migration = Action::new(ActionKind::Migration { vm, from: n1, to: n2 }, 0, 5);
        assert!(migration.apply(&off).is_err());
    }

    #[test]
    fn test_suspend_then_resume_elsewhere() {
        let (cfg, n1, n2, vm) = cluster();
        let asleep = Action::new(ActionKind::Suspend { vm, node: n1 }, 0, 2)
            .apply(&cfg)
            .unwrap();
        assert_eq!(asleep.vm_state(vm), VmState::Sleeping);
        let awake = Action::new(ActionKind::RemoteResume { vm, from: n1, to: n2 }, 2, 6)
            .apply(&asleep)
            .unwrap();
        assert_eq!(awake.running_host(vm), Some(n2));
    }

    #[test]
    fn test_identity_includes_time_bounds() {
        let (_, n1, n2, vm) = cluster();
        let a = Action::new(ActionKind::Migration { vm, from: n1, to: n2 }, 0, 5);
        let b = Action::new(ActionKind::Migration { vm, from: n1, to: n2 }, 1, 6);
        let set: HashSet<Action> = [a, b, a].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_incoming_and_outgoing_nodes() {
        let (cfg, n1, n2, vm) = cluster();
        let migration = Action::new(ActionKind::Migration { vm, from: n1, to: n2 }, 0, 5);
        assert_eq!(migration.incoming_node(), Some(n2));
        assert_eq!(migration.outgoing_node(), Some(n1));
        assert_eq!(migration.label(&cfg), "migrate(vm1,n1,n2)");
        assert_eq!(migration.describe(&cfg), "migrate(vm1,n1,n2)[0,5]");

        let startup = Action::new(ActionKind::Startup { node: n2 }, 0, 3);
        assert_eq!(startup.incoming_node(), None);
        assert_eq!(startup.outgoing_node(), Some(n2));
        let shutdown = Action::new(ActionKind::Shutdown { node: n2 }, 0, 3);
        assert_eq!(shutdown.incoming_node(), Some(n2));
    }
}
