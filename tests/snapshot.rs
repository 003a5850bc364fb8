//! Suspend and resume equivalence for mid-run snapshots

use std::fs;
use std::sync::Arc;

use tetrapack::io::events::{Solution, StopReason};
use tetrapack::io::puzzle::PuzzleFile;
use tetrapack::io::settings::SolverSettings;
use tetrapack::io::snapshot::SnapshotV1;
use tetrapack::solver::search::{SearchSession, StepOutcome};

fn exhaust_settings() -> SolverSettings {
    SolverSettings {
        max_solutions: None,
        // pure DFS keeps step counts stable and runs long enough to interrupt
        dlx_threshold: 0,
        ..SolverSettings::default()
    }
}

fn step_until_done(session: &mut SearchSession) -> (Vec<Solution>, StopReason) {
    let mut solutions = Vec::new();
    loop {
        match session.step() {
            StepOutcome::Progress => {}
            StepOutcome::Solution(solution) => solutions.push(solution),
            StepOutcome::Finished(reason) => return (solutions, reason),
        }
    }
}

#[test]
fn test_resumed_run_completes_the_interrupted_one() {
    let puzzle = PuzzleFile::demo().compile().unwrap();

    // reference: one uninterrupted run
    let mut reference =
        SearchSession::new(Arc::clone(&puzzle), exhaust_settings()).unwrap();
    let (reference_solutions, reference_reason) = step_until_done(&mut reference);
    assert_eq!(reference_reason, StopReason::Exhausted);
    assert_eq!(reference_solutions.len(), 2);

    // interrupted: a few steps, snapshot, resume, run out
    let mut interrupted =
        SearchSession::new(Arc::clone(&puzzle), exhaust_settings()).unwrap();
    let mut early = Vec::new();
    for _ in 0..6 {
        match interrupted.step() {
            StepOutcome::Progress => {}
            StepOutcome::Solution(solution) => early.push(solution),
            StepOutcome::Finished(reason) => panic!("finished too early: {reason:?}"),
        }
    }
    let snapshot = interrupted.to_snapshot();

    let mut resumed = SearchSession::from_snapshot(Arc::clone(&puzzle), snapshot).unwrap();
    let (late, reason) = step_until_done(&mut resumed);

    assert_eq!(reason, StopReason::Exhausted);
    let mut combined: Vec<_> = early
        .iter()
        .chain(late.iter())
        .map(Solution::signature)
        .collect();
    combined.sort();
    let mut expected: Vec<_> = reference_solutions.iter().map(Solution::signature).collect();
    expected.sort();
    assert_eq!(combined, expected);
}

#[test]
fn test_snapshot_counters_survive_the_round_trip() {
    let puzzle = PuzzleFile::demo().compile().unwrap();
    let mut session = SearchSession::new(Arc::clone(&puzzle), exhaust_settings()).unwrap();
    for _ in 0..6 {
        session.step();
    }
    let nodes_before = session.counters.nodes;
    let snapshot = session.to_snapshot();

    let json = snapshot.to_json().unwrap();
    let parsed = SnapshotV1::from_json(&json).unwrap();
    let resumed = SearchSession::from_snapshot(puzzle, parsed).unwrap();
    assert_eq!(resumed.counters.nodes, nodes_before);
    assert!(!resumed.is_finished());
}

#[test]
fn test_snapshot_save_and_load() {
    let puzzle = PuzzleFile::demo().compile().unwrap();
    let mut session = SearchSession::new(Arc::clone(&puzzle), exhaust_settings()).unwrap();
    for _ in 0..4 {
        session.step();
    }
    let snapshot = session.to_snapshot();

    let path = std::env::temp_dir().join(format!("tetrapack-snapshot-{}.json", std::process::id()));
    snapshot.save(&path).unwrap();
    let loaded = SnapshotV1::load(&path).unwrap();
    fs::remove_file(&path).unwrap();

    assert_eq!(loaded.cell_count, puzzle.cell_count());
    assert!(SearchSession::from_snapshot(puzzle, loaded).is_ok());
}

#[test]
fn test_snapshot_rejects_a_different_puzzle() {
    let demo = PuzzleFile::demo().compile().unwrap();
    let mut session = SearchSession::new(Arc::clone(&demo), exhaust_settings()).unwrap();
    for _ in 0..4 {
        session.step();
    }
    let snapshot = session.to_snapshot();

    let mut other_file = PuzzleFile::demo();
    other_file.cells = (0..12).map(|k| [k, k, 0]).collect();
    other_file.pieces.truncate(1);
    other_file.pieces[0].inventory = 3;
    let other = other_file.compile().unwrap();

    assert!(SearchSession::from_snapshot(other, snapshot).is_err());
}
