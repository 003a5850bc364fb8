//! Performance measurement for exhaustive search at varying container sizes

// Criterion macros generate undocumented functions
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use tetrapack::io::puzzle::PuzzleFile;
use tetrapack::io::settings::SolverSettings;
use tetrapack::solver::bitboard::BitBoard;
use tetrapack::solver::candidates::CompiledPuzzle;
use tetrapack::solver::dlx::solve_tail;
use tetrapack::solver::search::{SearchSession, StepOutcome};

fn line_puzzle(count: i32) -> Arc<CompiledPuzzle> {
    let mut file = PuzzleFile::demo();
    file.cells = (0..count).map(|k| [k, k, 0]).collect();
    file.pieces.truncate(1);
    file.pieces[0].inventory = (count / 4) as u32;
    file.compile().unwrap()
}

fn exhaust(puzzle: &Arc<CompiledPuzzle>, dlx_threshold: u32) -> u64 {
    let settings = SolverSettings {
        max_solutions: None,
        dlx_threshold,
        ..SolverSettings::default()
    };
    let mut session = SearchSession::new(Arc::clone(puzzle), settings).unwrap();
    loop {
        match session.step() {
            StepOutcome::Progress | StepOutcome::Solution(_) => {}
            StepOutcome::Finished(_) => return session.counters.nodes,
        }
    }
}

/// Measures full exhaustive enumeration as the container grows
fn bench_exhaustive_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("exhaustive_search");

    for &cells in &[16, 32, 64] {
        let puzzle = line_puzzle(cells);
        group.bench_with_input(BenchmarkId::from_parameter(cells), &cells, |b, _| {
            b.iter(|| black_box(exhaust(&puzzle, 0)));
        });
    }

    group.finish();
}

/// Measures the same enumeration with the exact-cover tail solver engaged
fn bench_search_with_tail_solver(c: &mut Criterion) {
    let puzzle = line_puzzle(64);
    c.bench_function("search_with_tail_solver", |b| {
        b.iter(|| black_box(exhaust(&puzzle, 100)));
    });
}

/// Measures one tail solver invocation over an untouched board
fn bench_tail_solver_single_call(c: &mut Criterion) {
    let puzzle = line_puzzle(32);
    let occupancy = BitBoard::new(32);
    let inventory = vec![8u32];
    c.bench_function("tail_solver_single_call", |b| {
        b.iter(|| {
            black_box(solve_tail(
                &puzzle,
                black_box(&occupancy),
                &inventory,
                1_000_000,
            ))
        });
    });
}

criterion_group!(
    benches,
    bench_exhaustive_search,
    bench_search_with_tail_solver,
    bench_tail_solver_single_call
);
criterion_main!(benches);
