//! Terminal progress display for interactive runs

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use crate::io::events::{EventSink, RunSummary, Solution, StatusReport, StopReason};
use crate::solver::candidates::CompiledPuzzle;

static SPINNER_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
});

/// Event sink rendering a live spinner plus solution printouts
///
/// Solutions are printed above the spinner as they arrive; the spinner
/// line tracks nodes, depth, rate, and prune totals from status events.
pub struct ProgressSink {
    puzzle: Arc<CompiledPuzzle>,
    spinner: ProgressBar,
    solutions: u64,
}

impl ProgressSink {
    /// Create a sink over the puzzle being solved
    pub fn new(puzzle: Arc<CompiledPuzzle>) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(SPINNER_STYLE.clone());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message("compiling...");
        Self {
            puzzle,
            spinner,
            solutions: 0,
        }
    }

    fn format_solution(&self, solution: &Solution) -> String {
        let mut lines = Vec::with_capacity(solution.pieces.len() + 1);
        lines.push(format!("solution #{}:", self.solutions));
        for placed in &solution.pieces {
            let cells: Vec<String> = placed
                .cells
                .iter()
                .filter_map(|&index| self.puzzle.container.cell(index))
                .map(|cell| format!("({},{},{})", cell[0], cell[1], cell[2]))
                .collect();
            lines.push(format!(
                "  {} @ {}",
                self.puzzle.pieces.name_of(placed.piece),
                cells.join(" ")
            ));
        }
        lines.join("\n")
    }
}

impl EventSink for ProgressSink {
    fn on_status(&mut self, status: &StatusReport) {
        self.spinner.set_message(format!(
            "nodes {} | depth {}/{} | {:.0} n/s | open {} | pruned {} | solutions {}",
            status.nodes,
            status.depth,
            status.best_depth,
            status.nodes_per_second,
            status.open_cells,
            status.prunes.total(),
            status.solutions,
        ));
    }

    fn on_solution(&mut self, solution: &Solution) {
        self.solutions += 1;
        self.spinner.println(self.format_solution(solution));
    }

    fn on_done(&mut self, summary: &RunSummary) {
        let reason = match summary.reason {
            StopReason::Exhausted => "search space exhausted",
            StopReason::SolutionLimit => "solution limit reached",
            StopReason::TimedOut => "timed out",
            StopReason::Canceled => "canceled",
        };
        self.spinner.finish_with_message(format!(
            "{reason}: {} solution(s), {} nodes in {:.2?}",
            summary.solutions, summary.nodes, summary.elapsed
        ));
    }
}
