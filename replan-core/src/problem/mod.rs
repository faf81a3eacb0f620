//! Reconfiguration problem
//!
//! Translates a source configuration, the requested target states and the placement
//! constraints into a constraint model:
//!
//! 1. every action is priced once by the [`DurationEvaluator`]
//! 2. the horizon is configured or derived from the longest possible durations
//! 3. every VM running in the destination gets a hoster variable over the usable nodes
//! 4. action models and their slices are created
//! 5. one bin-packing constraint per resource dimension covers all nodes, one timetable
//!    per node orders the slices in time
//! 6. placement constraints are attached, the cost is the sum of all action ends
//! 7. propagation runs at the root; a failure there means no plan can exist
//!
//! The problem owns the solver. Accessors are read-only, variables only change during
//! search.

pub mod action_model;
pub mod heuristics;
pub mod slice;

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::action::ActionType;
use crate::config::{ModelConfig, SearchConfig, SearchMode, MIN_HORIZON};
use crate::duration::{DurationError, DurationEvaluator};
use crate::error::{ReplanError, ReplanResult};
use crate::model::{
    Configuration, ElementRef, NodeId, NodeState, ResourceDimension, TargetStates, VmId,
    VmPlacement, VmState,
};
use crate::placement::PlacementConstraint;
use crate::solver::constraints::{BinPacking, Precedence, ReifiedEq, Sum, Timetable};
use crate::solver::{
    Cause, Constraint, ConstraintId, Contradiction, IntDomain, Objective, Search, SearchLimits,
    SearchOutcome, Solver, Store, VarId, VarKind,
};

pub use action_model::ActionModel;
pub use heuristics::PlanBrancher;
pub use slice::{ActionWindow, ConsumingSlice, DemandingSlice, Heights, SliceBuilder};

/// Solver view of a node
#[derive(Debug, Clone)]
pub struct NodeModel {
    pub node: NodeId,
    /// Whether VMs may run on the node in the destination
    pub usable: bool,
    /// Destination load, one variable per [`ResourceDimension`]
    pub loads: SmallVec<[VarId; 2]>,
    pub capacities: Heights,
}

impl NodeModel {
    pub fn load(&self, dimension: ResourceDimension) -> VarId {
        self.loads[dimension as usize]
    }
}

/// Durations of the transition an element goes through
#[derive(Debug, Clone, Copy)]
enum Transition {
    Migratable { migration: u64 },
    Run { run: u64 },
    Resume { local: u64, remote: u64 },
    Suspend { suspend: u64 },
    Stop { stop: u64 },
    Startup { startup: u64 },
    Shutdown { shutdown: u64 },
    Idle,
}

impl Transition {
    fn longest(&self) -> u64 {
        match *self {
            Transition::Migratable { migration } => migration,
            Transition::Run { run } => run,
            Transition::Resume { local, remote } => local.max(remote),
            Transition::Suspend { suspend } => suspend,
            Transition::Stop { stop } => stop,
            Transition::Startup { startup } => startup,
            Transition::Shutdown { shutdown } => shutdown,
            Transition::Idle => 0,
        }
    }
}

#[derive(Debug)]
pub struct ReconfigurationProblem {
    source: Configuration,
    solver: Solver,
    horizon: u64,
    nodes: Vec<NodeModel>,
    node_actions: Vec<ActionModel>,
    vm_actions: Vec<ActionModel>,
    future_runnings: Vec<VmId>,
    misplaced: BTreeSet<VmId>,
    displaced: Vec<VmId>,
    cost: VarId,
    var_owners: FxHashMap<VarId, ElementRef>,
    constraint_owners: FxHashMap<ConstraintId, Vec<ElementRef>>,
}

impl ReconfigurationProblem {
    /// Build the model and propagate it at the root
    pub fn build(
        source: &Configuration,
        targets: &TargetStates,
        constraints: &[PlacementConstraint],
        evaluator: &dyn DurationEvaluator,
        config: &ModelConfig,
    ) -> ReplanResult<Self> {
        source.validate()?;
        for vm in targets.mentioned_vms() {
            if vm.index() >= source.vm_count() {
                return Err(ReplanError::UnknownElement(format!("vm #{}", vm.0)));
            }
        }
        for node in targets.mentioned_nodes() {
            if node.index() >= source.node_count() {
                return Err(ReplanError::UnknownElement(format!("node #{}", node.0)));
            }
        }

        let vm_transitions = source
            .vm_ids()
            .map(|vm| vm_transition(source, targets, evaluator, vm))
            .collect::<ReplanResult<Vec<_>>>()?;
        let node_transitions = source
            .node_ids()
            .map(|node| node_transition(source, targets, evaluator, node))
            .collect::<ReplanResult<Vec<_>>>()?;

        let horizon = config
            .horizon
            .unwrap_or_else(|| {
                vm_transitions
                    .iter()
                    .chain(&node_transitions)
                    .map(Transition::longest)
                    .sum()
            })
            .max(MIN_HORIZON);

        let mut problem = Self {
            source: source.clone(),
            solver: Solver::new(),
            horizon,
            nodes: Vec::with_capacity(source.node_count()),
            node_actions: Vec::with_capacity(source.node_count()),
            vm_actions: Vec::with_capacity(source.vm_count()),
            future_runnings: Vec::new(),
            misplaced: BTreeSet::new(),
            displaced: Vec::new(),
            cost: VarId(0),
            var_owners: FxHashMap::default(),
            constraint_owners: FxHashMap::default(),
        };
        let builder = SliceBuilder::new(horizon);

        problem.make_nodes(targets);
        for (node, transition) in source.node_ids().zip(node_transitions) {
            let model = problem.make_node_action(&builder, node, transition)?;
            problem.node_actions.push(model);
        }
        for (vm, transition) in source.vm_ids().zip(vm_transitions) {
            let model = problem.make_vm_action(&builder, vm, transition)?;
            if model.hoster().is_some() {
                problem.future_runnings.push(vm);
            }
            problem.vm_actions.push(model);
        }
        problem.link_resumes_to_shutdowns();
        problem.post_packing();
        problem.post_timetables();

        for constraint in constraints {
            problem
                .misplaced
                .extend(constraint.misplaced(&problem.source));
        }
        for constraint in constraints {
            constraint.add(&mut problem)?;
        }
        problem.post_cost();

        if let Err(contradiction) = problem.solver.propagate() {
            return Err(problem.explain(contradiction));
        }
        problem.displaced = problem.compute_displaced();

        info!(
            nodes = problem.nodes.len(),
            vms = problem.vm_actions.len(),
            future_runnings = problem.future_runnings.len(),
            displaced = problem.displaced.len(),
            horizon = problem.horizon,
            variables = problem.solver.store().var_count(),
            constraints = problem.solver.constraint_count(),
            "Reconfiguration problem built"
        );
        Ok(problem)
    }

    fn make_nodes(&mut self, targets: &TargetStates) {
        for node in self.source.node_ids() {
            let usable = targets.node_target(&self.source, node) == NodeState::Online;
            let capacities = SliceBuilder::heights(|dim| self.source.node(node).capacity(dim));
            let loads = ResourceDimension::ALL
                .iter()
                .zip(&capacities)
                .map(|(dim, capacity)| {
                    let label = format!("load({},{})", self.source.node(node).name, dim);
                    let ub = if usable { *capacity } else { 0 };
                    let var = self
                        .solver
                        .store_mut()
                        .new_interval(label, VarKind::Load, 0, ub);
                    self.var_owners.insert(var, ElementRef::Node(node));
                    var
                })
                .collect();
            self.nodes.push(NodeModel {
                node,
                usable,
                loads,
                capacities,
            });
        }
    }

    fn own(&mut self, element: ElementRef, window: &ActionWindow) {
        for var in [window.start, window.end, window.duration] {
            self.var_owners.insert(var, element);
        }
    }

    fn make_node_action(
        &mut self,
        builder: &SliceBuilder,
        node: NodeId,
        transition: Transition,
    ) -> ReplanResult<ActionModel> {
        let element = ElementRef::Node(node);
        let name = self.source.node(node).name.clone();
        let capacities = self.nodes[node.index()].capacities.clone();
        let model = match transition {
            Transition::Startup { startup } => {
                let window =
                    builder.window(&mut self.solver, &format!("startup({})", name), &[startup])?;
                self.own(element, &window);
                ActionModel::Startup {
                    node,
                    consuming: builder.consuming(node, &window, capacities),
                    window,
                }
            }
            Transition::Shutdown { shutdown } => {
                let window = builder.window(
                    &mut self.solver,
                    &format!("shutdown({})", name),
                    &[shutdown],
                )?;
                self.own(element, &window);
                let hoster = self.solver.store_mut().new_constant(
                    format!("hoster({})", name),
                    VarKind::Hoster,
                    node.0 as i64,
                );
                ActionModel::Shutdown {
                    node,
                    demanding: builder.demanding(hoster, &window, capacities),
                    window,
                }
            }
            _ => ActionModel::Idle { element },
        };
        Ok(model)
    }

    fn usable_values(&self) -> Vec<i64> {
        self.nodes
            .iter()
            .filter(|n| n.usable)
            .map(|n| n.node.0 as i64)
            .collect()
    }

    fn hoster_var(&mut self, vm: VmId) -> ReplanResult<VarId> {
        let name = &self.source.vm(vm).name;
        let domain = IntDomain::from_values(&self.usable_values()).ok_or_else(|| {
            ReplanError::InfeasibleModel {
                elements: vec![name.clone()],
            }
        })?;
        let var = self
            .solver
            .store_mut()
            .new_var(format!("hoster({})", name), VarKind::Hoster, domain);
        self.var_owners.insert(var, ElementRef::Vm(vm));
        Ok(var)
    }

    fn check_not_halted(&self, vm: VmId, node: NodeId) -> ReplanResult<()> {
        if self.nodes[node.index()].usable {
            return Ok(());
        }
        debug!(
            vm = %self.source.vm(vm).name,
            node = %self.source.node(node).name,
            "Sleeping VM would remain on a node going offline"
        );
        Err(ReplanError::InfeasibleModel {
            elements: vec![
                self.source.vm(vm).name.clone(),
                self.source.node(node).name.clone(),
            ],
        })
    }

    fn make_vm_action(
        &mut self,
        builder: &SliceBuilder,
        vm: VmId,
        transition: Transition,
    ) -> ReplanResult<ActionModel> {
        let element = ElementRef::Vm(vm);
        let name = self.source.vm(vm).name.clone();
        let heights = SliceBuilder::heights(|dim| self.source.vm(vm).demand(dim));
        let placement = self.source.placement(vm);

        let model = match (transition, placement) {
            (Transition::Migratable { migration }, VmPlacement::Running(source)) => {
                let hoster = self.hoster_var(vm)?;
                let stay = self.solver.store_mut().new_bool(format!("stay({})", name));
                self.var_owners.insert(stay, element);
                self.solver
                    .post(ReifiedEq::new(stay, hoster, source.0 as i64));
                let durations: &[u64] = if migration > 0 {
                    &[0, migration]
                } else {
                    &[0]
                };
                let window =
                    builder.window(&mut self.solver, &format!("migrate({})", name), durations)?;
                self.own(element, &window);
                if migration > 0 {
                    self.solver.post(ReifiedEq::new(stay, window.duration, 0));
                }
                ActionModel::Migratable {
                    vm,
                    source,
                    stay,
                    consuming: builder.consuming(source, &window, heights.clone()),
                    demanding: builder.demanding(hoster, &window, heights),
                    window,
                }
            }
            (Transition::Run { run }, _) => {
                let hoster = self.hoster_var(vm)?;
                let window = builder.window(&mut self.solver, &format!("run({})", name), &[run])?;
                self.own(element, &window);
                ActionModel::Run {
                    vm,
                    demanding: builder.demanding(hoster, &window, heights),
                    window,
                }
            }
            (Transition::Resume { local, remote }, VmPlacement::Sleeping(source)) => {
                let hoster = self.hoster_var(vm)?;
                let stay = self.solver.store_mut().new_bool(format!("stay({})", name));
                self.var_owners.insert(stay, element);
                self.solver
                    .post(ReifiedEq::new(stay, hoster, source.0 as i64));
                let window = builder.window(
                    &mut self.solver,
                    &format!("resume({})", name),
                    &[local, remote],
                )?;
                self.own(element, &window);
                if local != remote {
                    self.solver
                        .post(ReifiedEq::new(stay, window.duration, local as i64));
                }
                ActionModel::Resume {
                    vm,
                    source,
                    stay,
                    demanding: builder.demanding(hoster, &window, heights),
                    window,
                }
            }
            (Transition::Suspend { suspend }, VmPlacement::Running(node)) => {
                self.check_not_halted(vm, node)?;
                let window =
                    builder.window(&mut self.solver, &format!("suspend({})", name), &[suspend])?;
                self.own(element, &window);
                ActionModel::Suspend {
                    vm,
                    node,
                    consuming: builder.consuming(node, &window, heights),
                    window,
                }
            }
            (Transition::Stop { stop }, VmPlacement::Running(node)) => {
                let window =
                    builder.window(&mut self.solver, &format!("stop({})", name), &[stop])?;
                self.own(element, &window);
                ActionModel::Stop {
                    vm,
                    node,
                    consuming: builder.consuming(node, &window, heights),
                    window,
                }
            }
            (_, VmPlacement::Sleeping(node)) => {
                self.check_not_halted(vm, node)?;
                ActionModel::Idle { element }
            }
            _ => ActionModel::Idle { element },
        };
        Ok(model)
    }

    /// A sleeping image leaves its node only once the resume is over
    fn link_resumes_to_shutdowns(&mut self) {
        let mut links = Vec::new();
        for model in &self.vm_actions {
            if let ActionModel::Resume { source, window, .. } = model {
                if let ActionModel::Shutdown {
                    window: shutdown, ..
                } = &self.node_actions[source.index()]
                {
                    links.push((window.end, shutdown.start));
                }
            }
        }
        for (end, start) in links {
            self.solver.post(Precedence::new(end, 0, start));
        }
    }

    fn post_packing(&mut self) {
        for dim in ResourceDimension::ALL {
            let loads = self.nodes.iter().map(|n| n.load(dim)).collect();
            let mut sizes = Vec::with_capacity(self.future_runnings.len());
            let mut bins = Vec::with_capacity(self.future_runnings.len());
            for vm in &self.future_runnings {
                let demand = self.source.vm(*vm).demand(dim) as i64;
                let label = format!("size({},{})", self.source.vm(*vm).name, dim);
                sizes.push(
                    self.solver
                        .store_mut()
                        .new_constant(label, VarKind::Other, demand),
                );
                if let Some(hoster) = self.vm_actions[vm.index()].hoster() {
                    bins.push(hoster);
                }
            }
            self.solver.post(BinPacking::new(loads, sizes, bins));
        }
    }

    fn post_timetables(&mut self) {
        let vm_count = self.source.vm_count() as u32;
        let mut timetables: Vec<Timetable> = self
            .nodes
            .iter()
            .map(|n| Timetable::new(n.node.0 as i64, n.capacities.iter().copied()))
            .collect();
        let usable = self.usable_values();

        for (vm, model) in self.source.vm_ids().zip(&self.vm_actions) {
            if let Some(consuming) = model.consuming() {
                timetables[consuming.node.index()].add_consuming(consuming.task(vm.0));
            }
            if let Some(demanding) = model.demanding() {
                for node in &usable {
                    timetables[*node as usize].add_demanding(demanding.task(vm.0, true));
                }
            }
        }
        for (node, model) in self.source.node_ids().zip(&self.node_actions) {
            let owner = vm_count + node.0;
            if let Some(consuming) = model.consuming() {
                timetables[node.index()].add_consuming(consuming.task(owner));
            }
            if let Some(demanding) = model.demanding() {
                timetables[node.index()].add_demanding(demanding.task(owner, false));
            }
        }

        for timetable in timetables {
            if timetable.is_empty() {
                continue;
            }
            let node = NodeId(timetable.node() as u32);
            let id = self.solver.post(timetable);
            self.constraint_owners.insert(id, vec![ElementRef::Node(node)]);
        }
    }

    fn post_cost(&mut self) {
        let ends: Vec<VarId> = self
            .node_actions
            .iter()
            .chain(&self.vm_actions)
            .filter_map(ActionModel::end)
            .collect();
        let ub = (ends.len() as i64).max(1) * self.horizon as i64;
        let cost = self
            .solver
            .store_mut()
            .new_interval("cost", VarKind::Cost, 0, ub);
        self.solver.post(Sum::new(ends, cost));
        self.cost = cost;
    }

    fn compute_displaced(&self) -> Vec<VmId> {
        let store = self.solver.store();
        self.future_runnings
            .iter()
            .copied()
            .filter(|vm| {
                let Some(host) = self.source.placement(*vm).host() else {
                    return false;
                };
                let Some(hoster) = self.vm_actions[vm.index()].hoster() else {
                    return false;
                };
                !store.contains(hoster, host.0 as i64) || self.misplaced.contains(vm)
            })
            .collect()
    }

    /// Turn a root contradiction into the error reported to the caller
    pub(crate) fn explain(&self, contradiction: Contradiction) -> ReplanError {
        let store = self.solver.store();
        if contradiction.cause == Cause::HorizonExceeded {
            if let Some(var) = contradiction.var {
                debug!(slice = store.label(var), "Slice exceeds the planning horizon");
                return ReplanError::DomainExhausted {
                    slice: store.label(var).to_string(),
                    horizon: self.horizon,
                };
            }
        }

        let mut elements: Vec<ElementRef> = Vec::new();
        if let Some(var) = contradiction.var {
            if let Some(owner) = self.var_owners.get(&var) {
                elements.push(*owner);
            }
            if let (VarKind::Load, Some(ElementRef::Node(node))) =
                (store.kind(var), self.var_owners.get(&var))
            {
                for vm in &self.future_runnings {
                    let hosted = self.vm_actions[vm.index()]
                        .hoster()
                        .and_then(|h| store.value(h))
                        == Some(node.0 as i64);
                    if hosted {
                        elements.push(ElementRef::Vm(*vm));
                    }
                }
            }
        }
        if let Some(owners) = contradiction
            .constraint
            .and_then(|id| self.constraint_owners.get(&id))
        {
            elements.extend(owners.iter().copied());
        }

        let mut names: Vec<String> = Vec::new();
        for element in elements {
            let name = self.source.name_of(element).to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        debug!(
            cause = ?contradiction.cause,
            constraint = contradiction
                .constraint
                .map(|id| self.solver.constraint(id).name()),
            elements = ?names,
            "Root propagation failed"
        );
        ReplanError::InfeasibleModel { elements: names }
    }

    /// Run the search with the given budget and heuristics
    pub fn solve(&mut self, config: &SearchConfig) -> SearchOutcome {
        let brancher = PlanBrancher::new(self, &config.heuristics);
        let objective = match config.mode {
            SearchMode::First => Objective::Satisfy,
            SearchMode::Best => Objective::Minimize(self.cost),
        };
        Search::new(&mut self.solver, brancher, objective)
            .with_limits(SearchLimits::new(config.max_nodes, config.timeout))
            .run()
    }

    pub fn source(&self) -> &Configuration {
        &self.source
    }

    pub fn horizon(&self) -> u64 {
        self.horizon
    }

    pub fn store(&self) -> &Store {
        self.solver.store()
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    /// VMs running once the plan is applied, in arena order
    pub fn future_runnings(&self) -> &[VmId] {
        &self.future_runnings
    }

    pub fn associated_action(&self, vm: VmId) -> &ActionModel {
        &self.vm_actions[vm.index()]
    }

    pub fn node_action(&self, node: NodeId) -> &ActionModel {
        &self.node_actions[node.index()]
    }

    /// Every action model, nodes first
    pub fn action_models(&self) -> impl Iterator<Item = &ActionModel> {
        self.node_actions.iter().chain(&self.vm_actions)
    }

    pub fn node(&self, node: NodeId) -> &NodeModel {
        &self.nodes[node.index()]
    }

    pub fn nodes(&self) -> &[NodeModel] {
        &self.nodes
    }

    pub fn hoster(&self, vm: VmId) -> Option<VarId> {
        self.vm_actions.get(vm.index()).and_then(ActionModel::hoster)
    }

    /// Hosted VMs whose current node cannot keep them, or that a placement constraint
    /// reports as misplaced
    pub fn displaced(&self) -> &[VmId] {
        &self.displaced
    }

    pub fn misplaced(&self) -> &BTreeSet<VmId> {
        &self.misplaced
    }

    pub fn cost(&self) -> VarId {
        self.cost
    }

    /// Keep the hoster values of `vm` accepted by `keep`
    pub(crate) fn restrict_hoster(
        &mut self,
        vm: VmId,
        keep: impl Fn(NodeId) -> bool,
        owners: &[ElementRef],
    ) -> ReplanResult<()> {
        let Some(hoster) = self.hoster(vm) else {
            return Ok(());
        };
        match self
            .solver
            .store_mut()
            .restrict(hoster, |value| keep(NodeId(value as u32)))
        {
            Ok(_) => Ok(()),
            Err(_) => {
                let mut elements = vec![self.source.vm(vm).name.clone()];
                elements.extend(
                    owners
                        .iter()
                        .map(|e| self.source.name_of(*e).to_string())
                        .filter(|name| *name != self.source.vm(vm).name),
                );
                Err(ReplanError::InfeasibleModel { elements })
            }
        }
    }

    /// Post a solver constraint on behalf of the given elements
    pub(crate) fn post(
        &mut self,
        constraint: impl Into<Constraint>,
        owners: Vec<ElementRef>,
    ) -> ConstraintId {
        let id = self.solver.post(constraint);
        self.constraint_owners.insert(id, owners);
        id
    }

    pub(crate) fn new_var(&mut self, label: impl Into<String>, domain: IntDomain) -> VarId {
        self.solver
            .store_mut()
            .new_var(label, VarKind::Other, domain)
    }

    /// End of the departure of a running VM from its current node
    pub(crate) fn departure_end(&self, vm: VmId) -> Option<VarId> {
        self.vm_actions
            .get(vm.index())
            .and_then(ActionModel::consuming)
            .map(|c| c.end)
    }

    /// Target state of a VM as encoded in the model
    pub fn vm_target(&self, vm: VmId) -> VmState {
        match &self.vm_actions[vm.index()] {
            ActionModel::Migratable { .. } | ActionModel::Run { .. } | ActionModel::Resume { .. } => {
                VmState::Running
            }
            ActionModel::Suspend { .. } => VmState::Sleeping,
            ActionModel::Stop { .. } => VmState::Terminated,
            _ => self.source.vm_state(vm),
        }
    }
}

fn evaluation_error(action: ActionType, element: &str, source: DurationError) -> ReplanError {
    ReplanError::DurationEvaluation {
        action,
        element: element.to_string(),
        source,
    }
}

fn vm_transition(
    source: &Configuration,
    targets: &TargetStates,
    evaluator: &dyn DurationEvaluator,
    vm: VmId,
) -> ReplanResult<Transition> {
    let machine = source.vm(vm);
    let evaluate = |action: ActionType| {
        evaluator
            .vm_action(action, machine)
            .map_err(|e| evaluation_error(action, &machine.name, e))
    };
    let from = source.vm_state(vm);
    let to = targets.vm_target(source, vm);
    let transition = match (from, to) {
        (VmState::Running, VmState::Running) => Transition::Migratable {
            migration: evaluate(ActionType::Migration)?,
        },
        (VmState::Waiting, VmState::Running) => Transition::Run {
            run: evaluate(ActionType::Run)?,
        },
        (VmState::Sleeping, VmState::Running) => Transition::Resume {
            local: evaluate(ActionType::LocalResume)?,
            remote: evaluate(ActionType::RemoteResume)?,
        },
        (VmState::Running, VmState::Sleeping) => Transition::Suspend {
            suspend: evaluate(ActionType::Suspend)?,
        },
        (VmState::Running, VmState::Terminated) => Transition::Stop {
            stop: evaluate(ActionType::Stop)?,
        },
        (from, to) if from == to => Transition::Idle,
        (from, to) => {
            return Err(ReplanError::UnsupportedTransition {
                vm: machine.name.clone(),
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    };
    Ok(transition)
}

fn node_transition(
    source: &Configuration,
    targets: &TargetStates,
    evaluator: &dyn DurationEvaluator,
    node: NodeId,
) -> ReplanResult<Transition> {
    let machine = source.node(node);
    let evaluate = |action: ActionType| {
        evaluator
            .node_action(action, machine)
            .map_err(|e| evaluation_error(action, &machine.name, e))
    };
    let transition = match (source.node_state(node), targets.node_target(source, node)) {
        (NodeState::Offline, NodeState::Online) => Transition::Startup {
            startup: evaluate(ActionType::Startup)?,
        },
        (NodeState::Online, NodeState::Offline) => Transition::Shutdown {
            shutdown: evaluate(ActionType::Shutdown)?,
        },
        _ => Transition::Idle,
    };
    Ok(transition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::{ConfiguredDurations, DurationTable};
    use crate::model::{Node, VirtualMachine};

    fn cluster() -> (Configuration, Vec<NodeId>, Vec<VmId>) {
        let mut cfg = Configuration::new();
        let nodes: Vec<NodeId> = (1..=3)
            .map(|i| {
                cfg.add_node(Node::new(format!("n{}", i), 4, 4096), NodeState::Online)
                    .unwrap()
            })
            .collect();
        let vms: Vec<VmId> = (1..=3)
            .map(|i| cfg.add_vm(VirtualMachine::new(format!("vm{}", i), 2, 1024)).unwrap())
            .collect();
        cfg.set_running(vms[0], nodes[0]).unwrap();
        cfg.set_sleeping(vms[1], nodes[1]).unwrap();
        (cfg, nodes, vms)
    }

    fn build(cfg: &Configuration, targets: &TargetStates) -> ReplanResult<ReconfigurationProblem> {
        ReconfigurationProblem::build(
            cfg,
            targets,
            &[],
            &ConfiguredDurations::default(),
            &ModelConfig::default(),
        )
    }

    #[test]
    fn test_action_models_follow_transitions() {
        let (cfg, _, vms) = cluster();
        let targets = TargetStates::new().run([vms[1], vms[2]]);
        let problem = build(&cfg, &targets).unwrap();
        assert!(matches!(
            problem.associated_action(vms[0]),
            ActionModel::Migratable { .. }
        ));
        assert!(matches!(
            problem.associated_action(vms[1]),
            ActionModel::Resume { .. }
        ));
        assert!(matches!(
            problem.associated_action(vms[2]),
            ActionModel::Run { .. }
        ));
        assert_eq!(problem.future_runnings(), &vms[..]);
        assert!(problem.displaced().is_empty());
    }

    #[test]
    fn test_derived_horizon_sums_longest_durations() {
        let (cfg, _, vms) = cluster();
        let targets = TargetStates::new().run([vms[2]]);
        let problem = build(&cfg, &targets).unwrap();
        // migration of 1 GiB (2 + 4) and run (10)
        assert_eq!(problem.horizon(), 16);
    }

    #[test]
    fn test_unsupported_transition() {
        let (cfg, _, vms) = cluster();
        let targets = TargetStates::new().sleep([vms[2]]);
        let err = build(&cfg, &targets).unwrap_err();
        assert!(matches!(err, ReplanError::UnsupportedTransition { ref vm, .. } if vm == "vm3"));
    }

    #[test]
    fn test_duration_failure_is_reported() {
        let (cfg, _, vms) = cluster();
        let targets = TargetStates::new().run([vms[2]]);
        let table = DurationTable::new().with(ActionType::Migration, "vm1", 3);
        let err = ReconfigurationProblem::build(
            &cfg,
            &targets,
            &[],
            &table,
            &ModelConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ReplanError::DurationEvaluation { action: ActionType::Run, ref element, .. } if element == "vm3"
        ));
    }

    #[test]
    fn test_offline_target_displaces_running_vms() {
        let (cfg, nodes, vms) = cluster();
        let targets = TargetStates::new().offline([nodes[0]]);
        let problem = build(&cfg, &targets).unwrap();
        assert_eq!(problem.displaced(), &[vms[0]]);
        let hoster = problem.hoster(vms[0]).unwrap();
        assert!(!problem.store().contains(hoster, nodes[0].0 as i64));
        assert!(matches!(
            problem.node_action(nodes[0]),
            ActionModel::Shutdown { .. }
        ));
    }

    #[test]
    fn test_sleeping_vm_on_halted_node_is_infeasible() {
        let (cfg, nodes, _) = cluster();
        let targets = TargetStates::new().offline([nodes[1]]);
        let err = build(&cfg, &targets).unwrap_err();
        assert!(matches!(err, ReplanError::InfeasibleModel { ref elements } if elements == &["vm2", "n2"]));
    }
}
