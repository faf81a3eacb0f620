//! Exhaustive checks of the solver engine

use replan_core::solver::constraints::BinPacking;
use replan_core::solver::{InputOrder, Objective, Search, SearchStatus, Solver, VarId, VarKind};

fn packing(solver: &mut Solver, bins: usize, capacity: i64, items: usize, size: i64) -> Vec<VarId> {
    let store = solver.store_mut();
    let loads: Vec<VarId> = (0..bins)
        .map(|b| store.new_interval(format!("load{}", b), VarKind::Load, 0, capacity))
        .collect();
    let sizes: Vec<VarId> = (0..items)
        .map(|i| store.new_constant(format!("size{}", i), VarKind::Other, size))
        .collect();
    let assignments: Vec<VarId> = (0..items)
        .map(|i| store.new_interval(format!("bin{}", i), VarKind::Hoster, 0, bins as i64 - 1))
        .collect();
    solver.post(BinPacking::new(loads, sizes, assignments.clone()));
    assignments
}

#[test]
fn test_bin_packing_enumerates_every_assignment() {
    let mut solver = Solver::new();
    let assignments = packing(&mut solver, 5, 5, 5, 2);
    let outcome = Search::new(&mut solver, InputOrder::new(assignments), Objective::Enumerate).run();
    assert_eq!(outcome.status, SearchStatus::Complete);
    assert_eq!(outcome.stats.solutions, 2220);
}

#[test]
fn test_bin_packing_without_room_fails_at_root() {
    let mut solver = Solver::new();
    let assignments = packing(&mut solver, 2, 3, 4, 2);
    let outcome = Search::new(&mut solver, InputOrder::new(assignments), Objective::Enumerate).run();
    assert!(matches!(outcome.status, SearchStatus::RootFailure(_)));
    assert_eq!(outcome.stats.solutions, 0);
}
