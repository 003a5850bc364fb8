//! Command-line interface for solving packing puzzles from JSON descriptions

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::io::error::{Result, invalid_parameter};
use crate::io::events::{EventSink, NullSink, StopReason};
use crate::io::progress::ProgressSink;
use crate::io::puzzle::PuzzleFile;
use crate::io::settings::{
    DEFAULT_DLX_THRESHOLD, DEFAULT_SEED, MoveOrdering, PruneToggles, RestartPolicy, SolverSettings,
};
use crate::io::snapshot::SnapshotV1;
use crate::solver::candidates::CompiledPuzzle;
use crate::solver::driver::Driver;
use crate::solver::pool::run_race;
use crate::solver::search::SearchSession;

#[derive(Parser)]
#[command(name = "tetrapack")]
#[command(
    author,
    version,
    about = "Exhaustive packing solver for close-packed lattice containers"
)]
/// Command-line arguments for the packing solver
// CLI tools commonly need multiple boolean flags for various features and user preferences
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Puzzle description (JSON) to solve
    #[arg(value_name = "PUZZLE", required_unless_present_any = ["demo", "resume"])]
    pub puzzle: Option<PathBuf>,

    /// Solve the built-in demo puzzle instead of a file
    #[arg(long, conflicts_with = "puzzle")]
    pub demo: bool,

    /// Resume from a snapshot written by a previous run
    #[arg(long, value_name = "SNAPSHOT", conflicts_with = "demo")]
    pub resume: Option<PathBuf>,

    /// Write a resumable snapshot here if the run times out or is canceled
    #[arg(long, value_name = "SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Random seed for tie-randomization and piece shuffling
    #[arg(short, long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Stop after this many distinct solutions
    #[arg(short = 'n', long, default_value_t = 1)]
    pub max_solutions: u64,

    /// Enumerate every distinct solution
    #[arg(long, conflicts_with = "max_solutions")]
    pub all: bool,

    /// Number of racing worker threads
    #[arg(short, long, default_value_t = 1)]
    pub workers: usize,

    /// Wall-clock limit in seconds
    #[arg(short, long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Target cell selection strategy
    #[arg(long, value_enum, default_value_t = MoveOrdering::MostConstrained)]
    pub ordering: MoveOrdering,

    /// Start each frame's candidate scan at a random offset
    #[arg(long)]
    pub randomize_ties: bool,

    /// Shuffle piece priority at start and on every restart
    #[arg(long)]
    pub shuffle_pieces: bool,

    /// Restart every N search nodes
    #[arg(long, value_name = "NODES")]
    pub restart_nodes: Option<u64>,

    /// Restart after N backtracks without depth progress
    #[arg(long, value_name = "BACKTRACKS", conflicts_with = "restart_nodes")]
    pub restart_stall: Option<u64>,

    /// Open-cell count at which the exact-cover tail solver engages; 0 disables it
    #[arg(long, default_value_t = DEFAULT_DLX_THRESHOLD)]
    pub dlx_threshold: u32,

    /// Disable the neighbor-touch placement heuristic
    #[arg(long)]
    pub no_neighbor_touch: bool,

    /// Disable the color parity prune
    #[arg(long)]
    pub no_color_parity: bool,

    /// Disable the mod-4 open-cell prune
    #[arg(long)]
    pub no_mod_four: bool,

    /// Disable the open-region connectivity prune
    #[arg(long)]
    pub no_connectivity: bool,

    /// Disable the transposition table prune
    #[arg(long)]
    pub no_table: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Check if progress should be displayed
    pub const fn should_show_progress(&self) -> bool {
        !self.quiet
    }

    /// Translate the arguments into a validated-on-use settings struct
    pub fn to_settings(&self) -> SolverSettings {
        let restart = match (self.restart_nodes, self.restart_stall) {
            (Some(interval_nodes), _) => RestartPolicy::Periodic { interval_nodes },
            (None, Some(stall_backtracks)) => RestartPolicy::Adaptive { stall_backtracks },
            (None, None) => RestartPolicy::None,
        };
        SolverSettings {
            max_solutions: if self.all { None } else { Some(self.max_solutions) },
            timeout: self.timeout.map(Duration::from_secs),
            move_ordering: self.ordering,
            pruning: PruneToggles {
                neighbor_touch: !self.no_neighbor_touch,
                color_parity: !self.no_color_parity,
                mod_four: !self.no_mod_four,
                connectivity: !self.no_connectivity,
                table: !self.no_table,
            },
            seed: self.seed,
            randomize_ties: self.randomize_ties,
            shuffle_pieces: self.shuffle_pieces,
            restart,
            dlx_threshold: self.dlx_threshold,
            ..SolverSettings::default()
        }
    }

    fn load_puzzle(&self) -> Result<Arc<CompiledPuzzle>> {
        let file = match &self.puzzle {
            Some(path) => PuzzleFile::from_path(path)?,
            None => PuzzleFile::demo(),
        };
        file.compile()
    }
}

/// Solve the puzzle named by the arguments
///
/// # Errors
///
/// Returns an error if the puzzle fails to load or compile, the settings
/// are invalid, or a worker session cannot be constructed.
pub fn run(cli: &Cli) -> Result<()> {
    let puzzle = cli.load_puzzle()?;
    let settings = cli.to_settings();

    let mut progress;
    let mut null = NullSink;
    let sink: &mut dyn EventSink = if cli.should_show_progress() {
        progress = ProgressSink::new(Arc::clone(&puzzle));
        &mut progress
    } else {
        &mut null
    };

    if cli.workers > 1 {
        if cli.resume.is_some() {
            return Err(invalid_parameter(
                "workers",
                &cli.workers,
                &"snapshots resume single-threaded runs only",
            ));
        }
        if cli.snapshot.is_some() {
            return Err(invalid_parameter(
                "workers",
                &cli.workers,
                &"snapshots capture single-threaded runs only",
            ));
        }
        run_race(&puzzle, &settings, cli.workers, sink)?;
        return Ok(());
    }

    let session = match &cli.resume {
        Some(path) => SearchSession::from_snapshot(puzzle, SnapshotV1::load(path)?)?,
        None => SearchSession::new(puzzle, settings)?,
    };
    let mut driver = Driver::new(session);
    let summary = driver.run(sink);

    // an interrupted run leaves a resumable suspension point
    if let Some(path) = &cli.snapshot
        && matches!(summary.reason, StopReason::TimedOut | StopReason::Canceled)
    {
        driver.session_mut().to_snapshot().save(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tetrapack").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_demo_defaults() {
        let cli = parse(&["--demo"]);
        let settings = cli.to_settings();
        assert_eq!(settings.max_solutions, Some(1));
        assert_eq!(settings.seed, DEFAULT_SEED);
        assert!(settings.pruning.connectivity);
        assert_eq!(settings.restart, RestartPolicy::None);
    }

    #[test]
    fn test_all_exhausts_the_space() {
        let cli = parse(&["--demo", "--all"]);
        assert_eq!(cli.to_settings().max_solutions, None);
    }

    #[test]
    fn test_prune_flags_map_to_toggles() {
        let cli = parse(&["--demo", "--no-color-parity", "--no-table"]);
        let pruning = cli.to_settings().pruning;
        assert!(!pruning.color_parity);
        assert!(!pruning.table);
        assert!(pruning.neighbor_touch);
        assert!(pruning.mod_four);
    }

    #[test]
    fn test_restart_flags_select_the_policy() {
        let periodic = parse(&["--demo", "--restart-nodes", "5000"]);
        assert_eq!(
            periodic.to_settings().restart,
            RestartPolicy::Periodic {
                interval_nodes: 5000
            }
        );
        let adaptive = parse(&["--demo", "--restart-stall", "64"]);
        assert_eq!(
            adaptive.to_settings().restart,
            RestartPolicy::Adaptive {
                stall_backtracks: 64
            }
        );
    }

    #[test]
    fn test_puzzle_or_demo_is_required() {
        assert!(Cli::try_parse_from(["tetrapack"]).is_err());
    }

    #[test]
    fn test_snapshot_with_workers_is_rejected() {
        let cli = parse(&["--demo", "--quiet", "-w", "2", "--snapshot", "out.json"]);
        assert!(run(&cli).is_err());
    }

    #[test]
    fn test_timed_out_run_writes_a_resumable_snapshot() {
        // a 2-row strip with far too many tilings for a single batch
        let mut file = PuzzleFile::demo();
        file.cells.clear();
        for a in 0..32i32 {
            for b in 0..2i32 {
                file.cells.push([a + b, a - b, 0]);
            }
        }
        file.pieces[0].inventory = 16;
        file.pieces[1].inventory = 16;

        let dir = std::env::temp_dir();
        let puzzle_path = dir.join(format!("tetrapack-cli-puzzle-{}.json", std::process::id()));
        let snapshot_path =
            dir.join(format!("tetrapack-cli-snapshot-{}.json", std::process::id()));
        std::fs::write(&puzzle_path, serde_json::to_string(&file).unwrap()).unwrap();

        let cli = parse(&[
            puzzle_path.to_str().unwrap(),
            "--all",
            "--timeout",
            "0",
            "--dlx-threshold",
            "0",
            "--quiet",
            "--snapshot",
            snapshot_path.to_str().unwrap(),
        ]);
        run(&cli).unwrap();

        let snapshot = SnapshotV1::load(&snapshot_path).unwrap();
        std::fs::remove_file(&puzzle_path).unwrap();
        std::fs::remove_file(&snapshot_path).unwrap();
        assert_eq!(snapshot.cell_count, 64);
        assert!(!snapshot.frames.is_empty());
    }
}
