//! End-to-end search behavior on small lattice containers

use std::sync::Arc;

use tetrapack::io::events::{StopReason, VecSink};
use tetrapack::io::puzzle::PuzzleFile;
use tetrapack::io::settings::SolverSettings;
use tetrapack::solver::driver::Driver;
use tetrapack::solver::search::SearchSession;

fn exhaust_settings() -> SolverSettings {
    SolverSettings {
        max_solutions: None,
        ..SolverSettings::default()
    }
}

#[test]
fn test_demo_parallelogram_has_exactly_two_covers() {
    // the 4x2 patch is covered by two rods or by two squares, nothing else
    let puzzle = PuzzleFile::demo().compile().unwrap();
    let session = SearchSession::new(puzzle, exhaust_settings()).unwrap();
    let mut sink = VecSink::default();
    let summary = Driver::new(session).run(&mut sink);

    assert_eq!(summary.reason, StopReason::Exhausted);
    assert_eq!(summary.solutions, 2);
    assert_eq!(sink.solutions.len(), 2);

    let mut signatures: Vec<_> = sink
        .solutions
        .iter()
        .map(tetrapack::io::events::Solution::signature)
        .collect();
    signatures.sort();
    signatures.dedup();
    assert_eq!(signatures.len(), 2);
    // each cover is homogeneous: two rods or two squares
    for signature in &signatures {
        assert_eq!(signature.len(), 2);
        assert_eq!(signature[0].0, signature[1].0);
    }
}

#[test]
fn test_disconnected_container_is_refuted_without_placements() {
    // two 4-cell lines far apart; each would fit a rod, but the open
    // region is never a single component
    let mut file = PuzzleFile::demo();
    file.cells = (0..4)
        .map(|k| [k, k, 0])
        .chain((0..4).map(|k| [k + 100, k + 100, 0]))
        .collect();
    file.pieces.truncate(1);
    file.pieces[0].inventory = 2;
    let puzzle = file.compile().unwrap();

    let session = SearchSession::new(puzzle, exhaust_settings()).unwrap();
    let mut sink = VecSink::default();
    let summary = Driver::new(session).run(&mut sink);

    assert_eq!(summary.reason, StopReason::Exhausted);
    assert_eq!(summary.solutions, 0);
    assert!(summary.prunes.connectivity >= 1);
}

#[test]
fn test_unfillable_cell_count_exits_fast() {
    let mut file = PuzzleFile::demo();
    file.cells = (0..6).map(|k| [k, k, 0]).collect();
    file.pieces.truncate(1);
    let puzzle = file.compile().unwrap();

    let session = SearchSession::new(puzzle, exhaust_settings()).unwrap();
    let mut sink = VecSink::default();
    let summary = Driver::new(session).run(&mut sink);

    assert_eq!(summary.reason, StopReason::Exhausted);
    assert_eq!(summary.solutions, 0);
    assert_eq!(summary.prunes.mod_four, 1);
    // refuted before any placement was attempted
    assert_eq!(summary.best_depth, 0);
}

#[test]
fn test_identical_settings_replay_identically() {
    let puzzle = PuzzleFile::demo().compile().unwrap();
    let settings = SolverSettings {
        randomize_ties: true,
        shuffle_pieces: true,
        seed: 7,
        ..exhaust_settings()
    };

    let run = |settings: SolverSettings| {
        let session = SearchSession::new(Arc::clone(&puzzle), settings).unwrap();
        let mut sink = VecSink::default();
        let summary = Driver::new(session).run(&mut sink);
        let signatures: Vec<_> = sink
            .solutions
            .iter()
            .map(tetrapack::io::events::Solution::signature)
            .collect();
        (summary.nodes, signatures)
    };

    let (nodes_a, solutions_a) = run(settings.clone());
    let (nodes_b, solutions_b) = run(settings);
    assert_eq!(nodes_a, nodes_b);
    assert_eq!(solutions_a, solutions_b);
}

#[test]
fn test_solution_limit_stops_the_run() {
    let puzzle = PuzzleFile::demo().compile().unwrap();
    let session = SearchSession::new(puzzle, SolverSettings::default()).unwrap();
    let mut sink = VecSink::default();
    let summary = Driver::new(session).run(&mut sink);

    assert_eq!(summary.reason, StopReason::SolutionLimit);
    assert_eq!(summary.solutions, 1);
}
