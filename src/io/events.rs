//! Push-based run telemetry: status, solution, and terminal events
//!
//! Events are delivered through a synchronous handler trait rather than
//! stored callbacks; implementations decide whether to print, forward over
//! a channel, or collect. Ordering is preserved: every `solution` precedes
//! the single terminal `done`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::geometry::lattice::{Cell, OrientationId};
use crate::solver::pruning::PruneCounters;

/// One placed piece within a solution or status report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionPiece {
    /// Piece index within the set
    pub piece: usize,
    /// Orientation id within the piece's table
    pub orientation: OrientationId,
    /// Translation applied to the orientation offsets
    pub translation: Cell,
    /// Covered container cell indices in ascending order
    pub cells: [u32; 4],
}

/// A complete, deduplicated placement list covering the container
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    /// Placements in emission order
    pub pieces: Vec<SolutionPiece>,
}

impl Solution {
    /// Canonical signature used for deduplication
    ///
    /// Pieces are keyed by (piece id, sorted covered cells) and the list is
    /// sorted, so the same cover reached through different move orders
    /// compares equal.
    pub fn signature(&self) -> Vec<(usize, [u32; 4])> {
        let mut signature: Vec<(usize, [u32; 4])> = self
            .pieces
            .iter()
            .map(|placed| (placed.piece, placed.cells))
            .collect();
        signature.sort_unstable();
        signature
    }
}

/// Periodic telemetry snapshot
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusReport {
    /// Worker index, `None` for single-threaded runs and pool aggregates
    pub worker: Option<usize>,
    /// Search nodes expanded so far
    pub nodes: u64,
    /// Current placement depth
    pub depth: u32,
    /// Deepest placement count reached
    pub best_depth: u32,
    /// Times the best depth was re-hit after falling strictly below it
    pub best_depth_hits: u64,
    /// Wall-clock time since the run started
    pub elapsed: Duration,
    /// Nodes per second over the whole run
    pub nodes_per_second: f64,
    /// Currently open cells
    pub open_cells: u32,
    /// Deduplicated solutions emitted
    pub solutions: u64,
    /// Completed restarts
    pub restarts: u64,
    /// Per-rule prune counters
    pub prunes: PruneCounters,
    /// Current partial placement
    pub placements: Vec<SolutionPiece>,
}

/// Why a run stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The search space was exhausted
    Exhausted,
    /// The configured solution count was reached
    SolutionLimit,
    /// The advisory timeout elapsed
    TimedOut,
    /// Cancellation was requested
    Canceled,
}

/// Terminal summary, emitted exactly once per run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    /// Why the run stopped
    pub reason: StopReason,
    /// Total search nodes expanded
    pub nodes: u64,
    /// Deduplicated solutions emitted
    pub solutions: u64,
    /// Total wall-clock time
    pub elapsed: Duration,
    /// Deepest placement count reached
    pub best_depth: u32,
    /// Completed restarts
    pub restarts: u64,
    /// Per-rule prune counters
    pub prunes: PruneCounters,
    /// Mid-run worker failures as (worker index, description)
    pub worker_failures: Vec<(usize, String)>,
}

/// Synchronous receiver of run events
///
/// All methods default to no-ops so sinks implement only what they need.
pub trait EventSink {
    /// Periodic telemetry, rate-limited by the status interval
    fn on_status(&mut self, _status: &StatusReport) {}
    /// One deduplicated solution
    fn on_solution(&mut self, _solution: &Solution) {}
    /// Terminal summary
    fn on_done(&mut self, _summary: &RunSummary) {}
}

/// Sink that discards every event
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {}

/// Sink that collects every event, mainly for tests and embedding
#[derive(Debug, Default)]
pub struct VecSink {
    /// Collected status reports
    pub statuses: Vec<StatusReport>,
    /// Collected solutions
    pub solutions: Vec<Solution>,
    /// Collected terminal summaries
    pub summaries: Vec<RunSummary>,
}

impl EventSink for VecSink {
    fn on_status(&mut self, status: &StatusReport) {
        self.statuses.push(status.clone());
    }

    fn on_solution(&mut self, solution: &Solution) {
        self.solutions.push(solution.clone());
    }

    fn on_done(&mut self, summary: &RunSummary) {
        self.summaries.push(summary.clone());
    }
}
