//! End-to-end planning scenarios

mod common;

use std::sync::Arc;

use common::{cluster, node, planner, test_config, TEST_TIMEOUT};
use pretty_assertions::assert_eq;
use replan_core::{
    ActionKind, ActionType, DurationError, DurationEvaluator, Node, PlacementConstraint, Planner,
    PlannerConfigBuilder, PlanningRequest, ReplanError, SearchMode, TargetStates, VirtualMachine,
};
use test_case::test_case;

#[test_case(2, 2 ; "two nodes")]
#[test_case(4, 3 ; "four nodes")]
fn test_staying_vms_keep_their_hoster(node_count: usize, vms_per_node: usize) {
    let node_names: Vec<String> = (1..=node_count).map(|i| format!("n{}", i)).collect();
    let nodes: Vec<_> = node_names.iter().map(|n| node(n, 16, 16384)).collect();
    let vm_names: Vec<String> = (0..node_count * vms_per_node)
        .map(|i| format!("vm{}", i + 1))
        .collect();
    let mut vms: Vec<(&str, u64, u64, Option<&str>)> = vm_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), 1, 512, Some(node_names[i % node_count].as_str())))
        .collect();
    vms.push(("fresh", 1, 512, None));
    let source = cluster(&nodes, &vms);
    let fresh = source.vm_id("fresh").unwrap();

    let request = PlanningRequest::new(source.clone()).with_targets(TargetStates::new().run([fresh]));
    let plan = planner().plan(&request).unwrap();

    assert_eq!(plan.len(), 1);
    assert_eq!(plan.actions()[0].action_type(), ActionType::Run);
    let destination = plan.destination().unwrap();
    for vm in source.vm_ids().filter(|vm| *vm != fresh) {
        assert_eq!(destination.running_host(vm), source.running_host(vm));
    }
}

#[test]
fn test_banned_vm_migrates_away() {
    let source = cluster(
        &[node("n1", 4, 4096), node("n2", 4, 4096)],
        &[("vm1", 2, 1024, Some("n1")), ("vm2", 1, 1024, Some("n1"))],
    );
    let (vm1, n1, n2) = (
        source.vm_id("vm1").unwrap(),
        source.node_id("n1").unwrap(),
        source.node_id("n2").unwrap(),
    );
    let request =
        PlanningRequest::new(source).with_constraint(PlacementConstraint::ban([vm1], [n1]));

    let plan = planner().plan(&request).unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(
        plan.actions()[0].kind,
        ActionKind::Migration {
            vm: vm1,
            from: n1,
            to: n2,
        }
    );
    assert!(plan.check_capacity().is_ok());
}

#[test]
fn test_fence_onto_full_node_is_infeasible() {
    let source = cluster(
        &[node("n1", 4, 4096), node("n2", 4, 4096)],
        &[("vm1", 2, 1024, Some("n1")), ("vm2", 4, 1024, Some("n2"))],
    );
    let (vm1, vm2, n2) = (
        source.vm_id("vm1").unwrap(),
        source.vm_id("vm2").unwrap(),
        source.node_id("n2").unwrap(),
    );
    let request = PlanningRequest::new(source)
        .with_constraint(PlacementConstraint::root([vm2]))
        .with_constraint(PlacementConstraint::fence([vm1], [n2]));

    let err = planner().plan(&request).unwrap_err();
    match err {
        ReplanError::InfeasibleModel { elements } => {
            assert!(elements.contains(&"vm1".to_string()), "{:?}", elements);
        }
        other => panic!("expected an infeasible model, got {:?}", other),
    }
}

#[test]
fn test_action_longer_than_horizon_exhausts_domain() {
    let source = cluster(&[node("n1", 4, 4096)], &[("vm1", 1, 512, None)]);
    let vm1 = source.vm_id("vm1").unwrap();
    let config = PlannerConfigBuilder::new().horizon(4).build().unwrap();
    let request = PlanningRequest::new(source).with_targets(TargetStates::new().run([vm1]));

    let err = Planner::with_config(config).plan(&request).unwrap_err();
    assert!(matches!(err, ReplanError::DomainExhausted { horizon: 4, .. }));
}

#[test]
fn test_node_budget_exhausted_before_any_plan() {
    let source = cluster(
        &[node("n1", 4, 4096), node("n2", 4, 4096)],
        &[
            ("vm1", 3, 1024, None),
            ("vm2", 3, 1024, None),
            ("vm3", 1, 1024, None),
            ("vm4", 1, 1024, None),
        ],
    );
    let vms: Vec<_> = ["vm1", "vm2", "vm3", "vm4"]
        .iter()
        .map(|name| source.vm_id(name).unwrap())
        .collect();
    let request = PlanningRequest::new(source).with_targets(TargetStates::new().run(vms));

    // Feasible once each node pairs a large VM with a small one
    let plan = planner().plan(&request).unwrap();
    assert_eq!(plan.len(), 4);
    assert!(plan.check_capacity().is_ok());

    let config = PlannerConfigBuilder::new()
        .timeout(TEST_TIMEOUT)
        .max_nodes(1)
        .build()
        .unwrap();
    let err = Planner::with_config(config).plan(&request).unwrap_err();
    assert!(
        matches!(err, ReplanError::NoPlanFound { explored: 1, .. }),
        "expected an exhausted budget, got {:?}",
        err
    );
    assert!(err.is_budget_related());
}

#[derive(Debug)]
struct NoMigrations;

impl DurationEvaluator for NoMigrations {
    fn run(&self, _vm: &VirtualMachine) -> Result<u64, DurationError> {
        Ok(5)
    }

    fn stop(&self, _vm: &VirtualMachine) -> Result<u64, DurationError> {
        Ok(5)
    }

    fn migration(&self, vm: &VirtualMachine) -> Result<u64, DurationError> {
        Err(DurationError::InvalidParameters {
            element: vm.name.clone(),
            reason: "live migration disabled".to_string(),
        })
    }

    fn suspend(&self, _vm: &VirtualMachine) -> Result<u64, DurationError> {
        Ok(5)
    }

    fn local_resume(&self, _vm: &VirtualMachine) -> Result<u64, DurationError> {
        Ok(5)
    }

    fn remote_resume(&self, _vm: &VirtualMachine) -> Result<u64, DurationError> {
        Ok(5)
    }

    fn startup(&self, _node: &Node) -> Result<u64, DurationError> {
        Ok(30)
    }

    fn shutdown(&self, _node: &Node) -> Result<u64, DurationError> {
        Ok(10)
    }
}

#[test]
fn test_duration_failure_aborts_planning() {
    let source = cluster(&[node("n1", 4, 4096)], &[("vm1", 1, 512, Some("n1"))]);
    let planner = Planner::new(test_config(SearchMode::First), Arc::new(NoMigrations));

    let err = planner.plan(&PlanningRequest::new(source)).unwrap_err();
    match err {
        ReplanError::DurationEvaluation {
            action,
            element,
            source,
        } => {
            assert_eq!(action, ActionType::Migration);
            assert_eq!(element, "vm1");
            assert!(matches!(source, DurationError::InvalidParameters { .. }));
        }
        other => panic!("expected a duration failure, got {:?}", other),
    }
}

#[test]
fn test_best_mode_prefers_the_cheaper_node() {
    let source = cluster(
        &[node("n1", 4, 4096), node("n2", 4, 4096)],
        &[("vm1", 3, 1024, Some("n1")), ("vm2", 2, 1024, None)],
    );
    let vm2 = source.vm_id("vm2").unwrap();
    let n2 = source.node_id("n2").unwrap();
    let request = PlanningRequest::new(source).with_targets(TargetStates::new().run([vm2]));

    let plan = Planner::with_config(test_config(SearchMode::Best))
        .plan(&request)
        .unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.actions()[0].kind, ActionKind::Run { vm: vm2, node: n2 });
    assert_eq!((plan.actions()[0].start, plan.actions()[0].end), (0, 10));
}
