//! Worker pool racing independent sessions over one shared puzzle
//!
//! Each worker runs its own session with a derived seed, so the workers
//! explore the space in different orders while staying individually
//! deterministic. Workers share a single cancel flag: once the pool has
//! forwarded enough solutions, every peer is stopped. Solutions are
//! deduplicated across workers by signature, so racing never inflates the
//! solution count.
//!
//! Session construction failures abort the whole start; failures after the
//! start (a panicking worker) are collected into the terminal summary
//! without taking the pool down.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use rustc_hash::FxHashSet;

use crate::io::error::{Result, SolverError, invalid_parameter};
use crate::io::events::{EventSink, RunSummary, Solution, StatusReport, StopReason};
use crate::io::settings::{POOL_STATUS_CADENCE, SolverSettings};
use crate::solver::candidates::CompiledPuzzle;
use crate::solver::driver::{ControlHandle, Driver};
use crate::solver::pruning::PruneCounters;
use crate::solver::search::SearchSession;

/// SplitMix64 step used to derive per-worker seeds
const fn splitmix(mut value: u64) -> u64 {
    value = value.wrapping_add(0x9e37_79b9_7f4a_7c15);
    value = (value ^ (value >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    value = (value ^ (value >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    value ^ (value >> 31)
}

/// Seed for one worker of a pool
///
/// Worker 0 keeps the base seed, so a one-worker pool reproduces the
/// single-threaded run exactly.
pub const fn derived_seed(base: u64, worker: usize) -> u64 {
    if worker == 0 {
        base
    } else {
        splitmix(base ^ (worker as u64))
    }
}

/// Requested worker count bounded by the machine's available parallelism
fn clamp_workers(requested: usize) -> usize {
    thread::available_parallelism().map_or(requested, |cores| requested.min(cores.get()))
}

/// Merge the latest per-worker reports into one pool-wide status
///
/// Returns `None` until at least one worker has reported. Depth, open cells,
/// and the partial placement come from the deepest worker; node, restart,
/// and prune totals are summed.
fn combined_status(
    latest: &[Option<StatusReport>],
    best_depth: u32,
    best_depth_hits: u64,
    solutions: u64,
    elapsed: Duration,
) -> Option<StatusReport> {
    let reports: Vec<&StatusReport> = latest.iter().flatten().collect();
    let deepest = reports.iter().copied().max_by_key(|report| report.depth)?;
    let nodes: u64 = reports.iter().map(|report| report.nodes).sum();
    let mut prunes = PruneCounters::default();
    for report in &reports {
        prunes.merge(&report.prunes);
    }
    let seconds = elapsed.as_secs_f64();
    Some(StatusReport {
        worker: None,
        nodes,
        depth: deepest.depth,
        best_depth,
        best_depth_hits,
        elapsed,
        nodes_per_second: if seconds > 0.0 { nodes as f64 / seconds } else { 0.0 },
        open_cells: deepest.open_cells,
        solutions,
        restarts: reports.iter().map(|report| report.restarts).sum(),
        prunes,
        placements: deepest.placements.clone(),
    })
}

enum WorkerMsg {
    Status(StatusReport),
    Solution(Solution),
    Done(usize, RunSummary),
    Failed(usize, String),
}

struct ChannelSink {
    worker: usize,
    sender: mpsc::Sender<WorkerMsg>,
}

impl EventSink for ChannelSink {
    fn on_status(&mut self, status: &StatusReport) {
        let _ = self.sender.send(WorkerMsg::Status(status.clone()));
    }

    fn on_solution(&mut self, solution: &Solution) {
        let _ = self.sender.send(WorkerMsg::Solution(solution.clone()));
    }

    fn on_done(&mut self, summary: &RunSummary) {
        let _ = self
            .sender
            .send(WorkerMsg::Done(self.worker, summary.clone()));
    }
}

/// Race `workers` sessions over one puzzle and aggregate their events
///
/// The worker count is clamped to the machine's available parallelism.
/// Solutions are deduplicated globally; once the configured solution count
/// is reached every worker is canceled. The sink sees one combined status
/// report per cadence tick, deduplicated solutions, and exactly one
/// terminal summary.
///
/// # Errors
///
/// Returns `SolverError::InvalidParameter` for zero workers or settings a
/// pool cannot honor, and `SolverError::WorkerInit` if any session fails to
/// construct; no thread is spawned in either case.
pub fn run_race(
    puzzle: &Arc<CompiledPuzzle>,
    settings: &SolverSettings,
    workers: usize,
    sink: &mut dyn EventSink,
) -> Result<RunSummary> {
    if workers == 0 {
        return Err(invalid_parameter(
            "workers",
            &workers,
            &"at least one worker is required",
        ));
    }
    if settings.pause_on_solution {
        return Err(invalid_parameter(
            "pause_on_solution",
            &true,
            &"a paused racing worker has no resume path; run single-threaded",
        ));
    }
    let workers = clamp_workers(workers);

    // build every session before spawning anything
    let mut sessions = Vec::with_capacity(workers);
    for worker in 0..workers {
        let worker_settings = SolverSettings {
            seed: derived_seed(settings.seed, worker),
            ..settings.clone()
        };
        let session = SearchSession::new(Arc::clone(puzzle), worker_settings).map_err(|err| {
            SolverError::WorkerInit {
                worker,
                reason: err.to_string(),
            }
        })?;
        sessions.push(session);
    }

    let started = Instant::now();
    let shared_cancel = Arc::new(AtomicBool::new(false));
    let cancel_all = ControlHandle::with_cancel(Arc::clone(&shared_cancel));
    let (sender, receiver) = mpsc::channel();

    let mut handles = Vec::with_capacity(workers);
    for (worker, session) in sessions.into_iter().enumerate() {
        let control = ControlHandle::with_cancel(Arc::clone(&shared_cancel));
        let worker_sender = sender.clone();
        handles.push(thread::spawn(move || {
            let mut driver = Driver::new(session)
                .with_control(control)
                .with_worker(worker);
            let mut sink = ChannelSink {
                worker,
                sender: worker_sender.clone(),
            };
            let run = catch_unwind(AssertUnwindSafe(|| driver.run(&mut sink)));
            if let Err(panic) = run {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "worker panicked".to_string());
                let _ = worker_sender.send(WorkerMsg::Failed(worker, reason));
            }
        }));
    }
    drop(sender);

    let mut seen: FxHashSet<Vec<(usize, [u32; 4])>> = FxHashSet::default();
    let mut summaries: Vec<RunSummary> = Vec::new();
    let mut worker_failures: Vec<(usize, String)> = Vec::new();
    let mut solutions = 0u64;
    let mut finished = 0usize;
    let mut last_status = Instant::now();

    // cross-worker depth record; a new global maximum voids earlier re-hits
    let mut best_depth = 0u32;
    let mut best_depth_hits = 0u64;
    let mut hits_reported = vec![0u64; workers];
    let mut latest: Vec<Option<StatusReport>> = vec![None; workers];

    while finished < workers {
        match receiver.recv_timeout(POOL_STATUS_CADENCE) {
            Ok(WorkerMsg::Status(status)) => {
                let worker = status.worker.unwrap_or(0);
                if let Some(reported) = hits_reported.get_mut(worker) {
                    let fresh_hits = status.best_depth_hits.saturating_sub(*reported);
                    *reported = status.best_depth_hits;
                    if status.best_depth > best_depth {
                        best_depth = status.best_depth;
                        best_depth_hits = 0;
                    }
                    if status.best_depth == best_depth {
                        best_depth_hits += fresh_hits;
                    }
                }
                if let Some(slot) = latest.get_mut(worker) {
                    *slot = Some(status);
                }
            }
            Ok(WorkerMsg::Solution(solution)) => {
                if seen.insert(solution.signature()) {
                    solutions += 1;
                    sink.on_solution(&solution);
                    if settings
                        .max_solutions
                        .is_some_and(|limit| solutions >= limit)
                    {
                        cancel_all.cancel();
                    }
                }
            }
            Ok(WorkerMsg::Done(_, summary)) => {
                summaries.push(summary);
                finished += 1;
            }
            Ok(WorkerMsg::Failed(worker, reason)) => {
                worker_failures.push((worker, reason));
                finished += 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        // one combined report per cadence tick, never per worker
        if last_status.elapsed() >= POOL_STATUS_CADENCE
            && let Some(combined) = combined_status(
                &latest,
                best_depth,
                best_depth_hits,
                solutions,
                started.elapsed(),
            )
        {
            sink.on_status(&combined);
            last_status = Instant::now();
        }
    }

    for handle in handles {
        let _ = handle.join();
    }

    let limit_reached = settings
        .max_solutions
        .is_some_and(|limit| solutions >= limit);
    let reason = if limit_reached {
        StopReason::SolutionLimit
    } else if summaries
        .iter()
        .any(|summary| summary.reason == StopReason::TimedOut)
    {
        StopReason::TimedOut
    } else if summaries
        .iter()
        .any(|summary| summary.reason == StopReason::Canceled)
    {
        StopReason::Canceled
    } else {
        StopReason::Exhausted
    };

    let mut summary = RunSummary {
        reason,
        nodes: summaries.iter().map(|s| s.nodes).sum(),
        solutions,
        elapsed: started.elapsed(),
        best_depth: summaries
            .iter()
            .map(|s| s.best_depth)
            .max()
            .unwrap_or(0)
            .max(best_depth),
        restarts: summaries.iter().map(|s| s.restarts).sum(),
        prunes: Default::default(),
        worker_failures,
    };
    for worker_summary in &summaries {
        summary.prunes.merge(&worker_summary.prunes);
    }

    sink.on_done(&summary);
    Ok(summary)
}
