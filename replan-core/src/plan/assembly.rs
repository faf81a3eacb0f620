//! Reading a plan back from a solver solution

use tracing::debug;

use crate::error::ReplanResult;
use crate::plan::ReconfigurationPlan;
use crate::problem::ReconfigurationProblem;
use crate::solver::Solution;

/// Plan made of the actions a solution selects; staying VMs contribute nothing
pub fn assemble(
    problem: &ReconfigurationProblem,
    solution: &Solution,
) -> ReplanResult<ReconfigurationPlan> {
    let mut plan = ReconfigurationPlan::new(problem.source().clone());
    for model in problem.action_models() {
        if let Some(action) = model.to_action(solution) {
            plan.add(action)?;
        }
    }
    debug!(
        actions = plan.len(),
        duration = plan.duration(),
        cost = solution.value(problem.cost()),
        "Plan assembled"
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, ActionType};
    use crate::config::{ModelConfig, SearchConfig, SearchMode};
    use crate::duration::DurationTable;
    use crate::model::{Configuration, Node, NodeId, NodeState, TargetStates, VirtualMachine, VmId};
    use crate::placement::PlacementConstraint;

    #[test]
    fn test_best_plan_moves_only_what_it_must() {
        let mut cfg = Configuration::new();
        let n1 = cfg.add_node(Node::new("n1", 4, 4096), NodeState::Online).unwrap();
        let n2 = cfg.add_node(Node::new("n2", 4, 4096), NodeState::Online).unwrap();
        let vm1 = cfg.add_vm(VirtualMachine::new("vm1", 2, 1024)).unwrap();
        let vm2 = cfg.add_vm(VirtualMachine::new("vm2", 2, 1024)).unwrap();
        cfg.set_running(vm1, n1).unwrap();
        cfg.set_running(vm2, n1).unwrap();

        let durations = DurationTable::new()
            .with(ActionType::Migration, "vm1", 3)
            .with(ActionType::Migration, "vm2", 3);
        let mut problem = ReconfigurationProblem::build(
            &cfg,
            &TargetStates::new(),
            &[PlacementConstraint::ban([vm2], [n1])],
            &durations,
            &ModelConfig::default(),
        )
        .unwrap();
        let outcome = problem.solve(&SearchConfig {
            mode: SearchMode::Best,
            ..SearchConfig::default()
        });
        let plan = assemble(&problem, &outcome.best.unwrap()).unwrap();

        assert_eq!(plan.len(), 1);
        let action = plan.actions()[0];
        assert_eq!(
            action.kind,
            ActionKind::Migration {
                vm: VmId(1),
                from: NodeId(0),
                to: NodeId(1),
            }
        );
        assert_eq!((action.start, action.end), (0, 3));
        assert!(plan.check_capacity().is_ok());
    }
}
