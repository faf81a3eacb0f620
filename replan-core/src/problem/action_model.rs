//! Action models: the solver-side view of the action each element may perform
//!
//! The model is chosen from the element's current state and its target state. Once the
//! search fixed every variable, [`ActionModel::to_action`] reads the concrete action back,
//! or `None` when the element does not need to act.

use crate::action::{Action, ActionKind};
use crate::model::{ElementRef, NodeId, VmId};
use crate::problem::slice::{ActionWindow, ConsumingSlice, DemandingSlice};
use crate::solver::{Solution, VarId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionModel {
    /// Running VM that keeps running, here or elsewhere
    Migratable {
        vm: VmId,
        source: NodeId,
        stay: VarId,
        window: ActionWindow,
        consuming: ConsumingSlice,
        demanding: DemandingSlice,
    },
    /// Waiting VM to start
    Run {
        vm: VmId,
        window: ActionWindow,
        demanding: DemandingSlice,
    },
    /// Sleeping VM to wake up, here or elsewhere
    Resume {
        vm: VmId,
        source: NodeId,
        stay: VarId,
        window: ActionWindow,
        demanding: DemandingSlice,
    },
    Suspend {
        vm: VmId,
        node: NodeId,
        window: ActionWindow,
        consuming: ConsumingSlice,
    },
    Stop {
        vm: VmId,
        node: NodeId,
        window: ActionWindow,
        consuming: ConsumingSlice,
    },
    /// Offline node to boot; unusable until the boot ends
    Startup {
        node: NodeId,
        window: ActionWindow,
        consuming: ConsumingSlice,
    },
    /// Online node to halt; claimed entirely from the shutdown start
    Shutdown {
        node: NodeId,
        window: ActionWindow,
        demanding: DemandingSlice,
    },
    /// Element keeping its state without acting
    Idle { element: ElementRef },
}

impl ActionModel {
    pub fn element(&self) -> ElementRef {
        match self {
            ActionModel::Migratable { vm, .. }
            | ActionModel::Run { vm, .. }
            | ActionModel::Resume { vm, .. }
            | ActionModel::Suspend { vm, .. }
            | ActionModel::Stop { vm, .. } => ElementRef::Vm(*vm),
            ActionModel::Startup { node, .. } | ActionModel::Shutdown { node, .. } => {
                ElementRef::Node(*node)
            }
            ActionModel::Idle { element } => *element,
        }
    }

    pub fn window(&self) -> Option<&ActionWindow> {
        match self {
            ActionModel::Migratable { window, .. }
            | ActionModel::Run { window, .. }
            | ActionModel::Resume { window, .. }
            | ActionModel::Suspend { window, .. }
            | ActionModel::Stop { window, .. }
            | ActionModel::Startup { window, .. }
            | ActionModel::Shutdown { window, .. } => Some(window),
            ActionModel::Idle { .. } => None,
        }
    }

    pub fn start(&self) -> Option<VarId> {
        self.window().map(|w| w.start)
    }

    pub fn end(&self) -> Option<VarId> {
        self.window().map(|w| w.end)
    }

    pub fn consuming(&self) -> Option<&ConsumingSlice> {
        match self {
            ActionModel::Migratable { consuming, .. }
            | ActionModel::Suspend { consuming, .. }
            | ActionModel::Stop { consuming, .. }
            | ActionModel::Startup { consuming, .. } => Some(consuming),
            _ => None,
        }
    }

    pub fn demanding(&self) -> Option<&DemandingSlice> {
        match self {
            ActionModel::Migratable { demanding, .. }
            | ActionModel::Run { demanding, .. }
            | ActionModel::Resume { demanding, .. }
            | ActionModel::Shutdown { demanding, .. } => Some(demanding),
            _ => None,
        }
    }

    /// Hoster variable, for VMs running once the plan is applied
    pub fn hoster(&self) -> Option<VarId> {
        match self {
            ActionModel::Migratable { demanding, .. }
            | ActionModel::Run { demanding, .. }
            | ActionModel::Resume { demanding, .. } => Some(demanding.hoster),
            _ => None,
        }
    }

    /// Node the element is on before acting, if any
    pub fn source(&self) -> Option<NodeId> {
        match self {
            ActionModel::Migratable { source, .. } | ActionModel::Resume { source, .. } => {
                Some(*source)
            }
            ActionModel::Suspend { node, .. } | ActionModel::Stop { node, .. } => Some(*node),
            _ => None,
        }
    }

    /// Concrete action of a solution; `None` for VMs staying where they run
    pub fn to_action(&self, solution: &Solution) -> Option<Action> {
        let window = self.window()?;
        let start = solution.value(window.start) as u64;
        let end = solution.value(window.end) as u64;
        let hoster = |slice: &DemandingSlice| NodeId(solution.value(slice.hoster) as u32);
        let kind = match self {
            ActionModel::Migratable {
                vm,
                source,
                demanding,
                ..
            } => {
                let to = hoster(demanding);
                if to == *source {
                    return None;
                }
                ActionKind::Migration {
                    vm: *vm,
                    from: *source,
                    to,
                }
            }
            ActionModel::Run { vm, demanding, .. } => ActionKind::Run {
                vm: *vm,
                node: hoster(demanding),
            },
            ActionModel::Resume {
                vm,
                source,
                demanding,
                ..
            } => {
                let to = hoster(demanding);
                if to == *source {
                    ActionKind::LocalResume { vm: *vm, node: to }
                } else {
                    ActionKind::RemoteResume {
                        vm: *vm,
                        from: *source,
                        to,
                    }
                }
            }
            ActionModel::Suspend { vm, node, .. } => ActionKind::Suspend {
                vm: *vm,
                node: *node,
            },
            ActionModel::Stop { vm, node, .. } => ActionKind::Stop {
                vm: *vm,
                node: *node,
            },
            ActionModel::Startup { node, .. } => ActionKind::Startup { node: *node },
            ActionModel::Shutdown { node, .. } => ActionKind::Shutdown { node: *node },
            ActionModel::Idle { .. } => return None,
        };
        Some(Action::new(kind, start, end))
    }
}
