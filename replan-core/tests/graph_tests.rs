//! Dependency extraction and agenda rendering

mod common;

use common::{cluster, node};
use pretty_assertions::assert_eq;
use replan_core::{Action, ActionKind, Configuration, ExecutionGraph, ReconfigurationPlan};

fn six_vms() -> Configuration {
    let nodes: Vec<_> = ["n1", "n2", "n3", "n4", "n5"]
        .iter()
        .map(|name| node(name, 16, 16384))
        .collect();
    cluster(
        &nodes,
        &[
            ("vm1", 1, 512, Some("n1")),
            ("vm2", 1, 512, Some("n2")),
            ("vm3", 1, 512, Some("n1")),
            ("vm4", 1, 512, Some("n2")),
            ("vm5", 1, 512, Some("n4")),
            ("vm6", 1, 512, None),
        ],
    )
}

fn migrate(cfg: &Configuration, vm: &str, from: &str, to: &str, start: u64, end: u64) -> Action {
    Action::new(
        ActionKind::Migration {
            vm: cfg.vm_id(vm).unwrap(),
            from: cfg.node_id(from).unwrap(),
            to: cfg.node_id(to).unwrap(),
        },
        start,
        end,
    )
}

fn six_actions(cfg: &Configuration) -> Vec<Action> {
    vec![
        migrate(cfg, "vm3", "n1", "n2", 7, 9),
        migrate(cfg, "vm1", "n1", "n3", 0, 10),
        migrate(cfg, "vm2", "n2", "n3", 0, 5),
        migrate(cfg, "vm4", "n2", "n4", 3, 7),
        migrate(cfg, "vm5", "n4", "n3", 0, 3),
        Action::new(
            ActionKind::Run {
                vm: cfg.vm_id("vm6").unwrap(),
                node: cfg.node_id("n4").unwrap(),
            },
            0,
            5,
        ),
    ]
}

#[test]
fn test_six_action_dependencies() {
    let cfg = six_vms();
    let actions = six_actions(&cfg);
    let graph = ExecutionGraph::from_actions(&cfg, actions.clone());
    let (vm3, vm1, vm2, vm4, vm5, vm6) = (
        actions[0], actions[1], actions[2], actions[3], actions[4], actions[5],
    );

    assert_eq!(graph.len(), 6);
    assert_eq!(graph.dependencies(&vm4), Some(vec![vm5]));
    assert_eq!(graph.dependencies(&vm3), Some(vec![vm2, vm4]));
    for independent in [vm1, vm2, vm5, vm6] {
        assert_eq!(graph.dependencies(&independent), Some(vec![]));
    }
}

#[test]
fn test_extraction_is_idempotent() {
    let cfg = six_vms();
    let mut plan = ReconfigurationPlan::new(cfg.clone());
    for action in six_actions(&cfg) {
        plan.add(action).unwrap();
    }

    let first = plan.execution_graph();
    let second = plan.execution_graph();
    assert_eq!(first, second);

    let mut reversed = six_actions(&cfg);
    reversed.reverse();
    assert_eq!(ExecutionGraph::from_actions(&cfg, reversed), first);
}

#[test]
fn test_agenda_groups_by_prerequisites() {
    let cfg = six_vms();
    let agenda = ExecutionGraph::from_actions(&cfg, six_actions(&cfg)).agenda();
    assert_eq!(
        agenda.to_string(),
        "* -> migrate(vm1,n1,n3)[0,10] & migrate(vm2,n2,n3)[0,5] & migrate(vm5,n4,n3)[0,3] & run(vm6,n4)[0,5]\n\
         !migrate(vm5,n4,n3)[0,3] -> migrate(vm4,n2,n4)[3,7]\n\
         !migrate(vm2,n2,n3)[0,5] & !migrate(vm4,n2,n4)[3,7] -> migrate(vm3,n1,n2)[7,9]\n"
    );
}

#[test]
fn test_executor_walks_the_agenda() {
    let cfg = six_vms();
    let actions = six_actions(&cfg);
    let mut graph = ExecutionGraph::from_actions(&cfg, actions.clone());

    assert_eq!(graph.ready().len(), 4);
    assert_eq!(graph.complete(&actions[4]).unwrap(), vec![actions[3]]);
    assert!(graph.complete(&actions[2]).unwrap().is_empty());
    assert_eq!(graph.complete(&actions[3]).unwrap(), vec![actions[0]]);
    assert_eq!(graph.pending(&actions[0]), Some(vec![]));
}
