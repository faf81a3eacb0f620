//! Plan and check reports

use std::fmt::Write;

use serde::Serialize;

use replan_core::{
    ActionType, Agenda, PlanningRequest, ReconfigurationPlan, ResourceDimension,
};

use crate::error::CliResult;

#[derive(Debug, Serialize)]
struct PlanReport {
    duration: u64,
    actions: Vec<ActionReport>,
    agenda: Agenda,
}

#[derive(Debug, Serialize)]
struct ActionReport {
    #[serde(rename = "type")]
    action_type: ActionType,
    element: String,
    label: String,
    start: u64,
    end: u64,
}

pub fn plan_text(plan: &ReconfigurationPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {} action(s), duration {}", plan.len(), plan.duration());
    let _ = write!(out, "{}", plan);
    let _ = writeln!(out, "# agenda");
    let _ = write!(out, "{}", plan.execution_graph().agenda());
    out
}

pub fn plan_json(plan: &ReconfigurationPlan) -> CliResult<String> {
    let source = plan.source();
    let report = PlanReport {
        duration: plan.duration(),
        actions: plan
            .actions()
            .iter()
            .map(|action| ActionReport {
                action_type: action.action_type(),
                element: source.name_of(action.element()).to_string(),
                label: action.label(source),
                start: action.start,
                end: action.end,
            })
            .collect(),
        agenda: plan.execution_graph().agenda(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub struct CheckReport {
    pub text: String,
    pub violations: usize,
}

/// Rule satisfaction and overloaded nodes of the source configuration
pub fn check_text(request: &PlanningRequest) -> CheckReport {
    let cfg = &request.source;
    let mut text = String::new();
    let mut violations = 0;

    for constraint in &request.constraints {
        let misplaced = constraint.misplaced(cfg);
        if misplaced.is_empty() {
            let _ = writeln!(text, "{}: satisfied", constraint.name());
        } else {
            violations += 1;
            let names: Vec<&str> = misplaced.iter().map(|vm| cfg.vm(*vm).name.as_str()).collect();
            let _ = writeln!(text, "{}: misplaced {}", constraint.name(), names.join(", "));
        }
    }

    for node in cfg.overloaded_nodes() {
        violations += 1;
        let dimensions: Vec<String> = ResourceDimension::ALL
            .into_iter()
            .filter(|dim| cfg.load(node, *dim) > cfg.node(node).capacity(*dim))
            .map(|dim| format!("{} {}/{}", dim, cfg.load(node, dim), cfg.node(node).capacity(dim)))
            .collect();
        let _ = writeln!(
            text,
            "node {}: overloaded ({})",
            cfg.node(node).name,
            dimensions.join(", ")
        );
    }
    CheckReport { text, violations }
}
