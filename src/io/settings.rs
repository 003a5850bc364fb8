//! Run configuration with explicit defaults and fail-fast validation

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::io::error::{Result, invalid_parameter};
use crate::solver::table::TablePolicy;

// Hard memory budgets; exceeding them fails construction
/// Maximum transposition table entry count
pub const MAX_TT_CAPACITY: usize = 1 << 26;
/// Maximum deduplicated candidate count per compiled puzzle
pub const MAX_CANDIDATES: usize = 1_000_000;

// Default values for configurable parameters
/// Fixed seed for reproducible runs
pub const DEFAULT_SEED: u64 = 42;
/// Steps executed between cooperative yields
pub const DEFAULT_BATCH_SIZE: usize = 200;
/// Minimum delay between status events
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_millis(500);
/// Open-cell count at which the exact-cover tail solver takes over
pub const DEFAULT_DLX_THRESHOLD: u32 = 100;
/// Link operations the tail solver may spend per invocation
pub const DEFAULT_DLX_OPERATION_BUDGET: u64 = 2_000_000;
/// Default transposition table entry capacity
pub const DEFAULT_TT_CAPACITY: usize = 1 << 20;
/// Table occupancy above which a restart clears the table
pub const TT_CLEAR_WATERMARK: f64 = 0.9;
/// Sleep between pause-loop heartbeats
pub const PAUSE_HEARTBEAT: Duration = Duration::from_millis(10);
/// Cadence of aggregated worker pool status
pub const POOL_STATUS_CADENCE: Duration = Duration::from_millis(250);

/// Strategy for picking the next target cell
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum MoveOrdering {
    /// Open cell with the fewest currently-legal candidates, ties by
    /// encounter order
    #[default]
    MostConstrained,
    /// Lowest open cell index
    Naive,
}

/// When the controller abandons the current attempt and starts over
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartPolicy {
    /// Never restart
    #[default]
    None,
    /// Restart every fixed number of search nodes
    Periodic {
        /// Nodes between restarts
        interval_nodes: u64,
    },
    /// Restart after a run of backtracks with no depth progress
    Adaptive {
        /// Backtracks below the best depth that trigger a restart
        stall_backtracks: u64,
    },
}

/// Individual pruning rule toggles
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PruneToggles {
    /// Placements after the first must touch the filled region
    pub neighbor_touch: bool,
    /// Both open parity color classes must stay even
    pub color_parity: bool,
    /// Open-cell count must stay a multiple of four
    pub mod_four: bool,
    /// Open cells must remain one connected region
    pub connectivity: bool,
    /// Reject candidates leading to states proven unsolvable
    pub table: bool,
}

impl Default for PruneToggles {
    fn default() -> Self {
        Self {
            neighbor_touch: true,
            color_parity: true,
            mod_four: true,
            connectivity: true,
            table: true,
        }
    }
}

/// Complete configuration of one search run
///
/// Every field has an explicit default; `validate` is called by session
/// construction so misconfiguration fails before any search work starts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Stop after this many deduplicated solutions; `None` = exhaust
    pub max_solutions: Option<u64>,
    /// Advisory wall-clock limit, checked at batch boundaries
    pub timeout: Option<Duration>,
    /// Minimum delay between status events
    pub status_interval: Duration,
    /// Suspend instead of backtracking when a solution is emitted
    pub pause_on_solution: bool,
    /// Target cell selection strategy
    pub move_ordering: MoveOrdering,
    /// Pruning rule toggles
    pub pruning: PruneToggles,
    /// RNG seed for tie-randomization and piece shuffling
    pub seed: u64,
    /// Jump each frame's initial cursor to a random offset
    pub randomize_ties: bool,
    /// Shuffle piece priority at start and on every restart
    pub shuffle_pieces: bool,
    /// Restart strategy
    pub restart: RestartPolicy,
    /// Transposition table entry capacity
    pub tt_capacity: usize,
    /// Transposition table insert policy when full
    pub tt_policy: TablePolicy,
    /// Open-cell count at which the tail solver engages; 0 disables it
    pub dlx_threshold: u32,
    /// Link-operation budget per tail solver invocation
    pub dlx_operation_budget: u64,
    /// Steps per cooperative batch
    pub batch_size: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_solutions: Some(1),
            timeout: None,
            status_interval: DEFAULT_STATUS_INTERVAL,
            pause_on_solution: false,
            move_ordering: MoveOrdering::default(),
            pruning: PruneToggles::default(),
            seed: DEFAULT_SEED,
            randomize_ties: false,
            shuffle_pieces: false,
            restart: RestartPolicy::default(),
            tt_capacity: DEFAULT_TT_CAPACITY,
            tt_policy: TablePolicy::Reject,
            dlx_threshold: DEFAULT_DLX_THRESHOLD,
            dlx_operation_budget: DEFAULT_DLX_OPERATION_BUDGET,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl SolverSettings {
    /// Check every field against its admissible range
    ///
    /// # Errors
    ///
    /// Returns `SolverError::InvalidParameter` describing the first
    /// offending field.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(invalid_parameter(
                "batch_size",
                &self.batch_size,
                &"must be at least 1",
            ));
        }
        if self.max_solutions == Some(0) {
            return Err(invalid_parameter(
                "max_solutions",
                &"0",
                &"use None to exhaust the space, or at least 1",
            ));
        }
        if self.status_interval.is_zero() {
            return Err(invalid_parameter(
                "status_interval",
                &"0",
                &"must be a positive duration",
            ));
        }
        if self.dlx_threshold > 0 && self.dlx_operation_budget == 0 {
            return Err(invalid_parameter(
                "dlx_operation_budget",
                &self.dlx_operation_budget,
                &"must be positive while the tail solver is enabled",
            ));
        }
        match self.restart {
            RestartPolicy::Periodic { interval_nodes: 0 } => Err(invalid_parameter(
                "restart.interval_nodes",
                &0,
                &"must be positive",
            )),
            RestartPolicy::Adaptive {
                stall_backtracks: 0,
            } => Err(invalid_parameter(
                "restart.stall_backtracks",
                &0,
                &"must be positive",
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(SolverSettings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_batch_is_rejected() {
        let settings = SolverSettings {
            batch_size: 0,
            ..SolverSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_solution_limit_is_rejected() {
        let settings = SolverSettings {
            max_solutions: Some(0),
            ..SolverSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_restart_interval_is_rejected() {
        let settings = SolverSettings {
            restart: RestartPolicy::Periodic { interval_nodes: 0 },
            ..SolverSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
