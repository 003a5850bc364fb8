//! Input/output: puzzle files, configuration, events, snapshots, and the CLI

/// Command-line argument parsing and run orchestration
pub mod cli;
/// Error types for every fallible operation
pub mod error;
/// Event sinks, solutions, status reports, and run summaries
pub mod events;
/// Terminal progress rendering
pub mod progress;
/// JSON puzzle descriptions
pub mod puzzle;
/// Run configuration and tunable defaults
pub mod settings;
/// Versioned session snapshots for suspend and resume
pub mod snapshot;

pub use error::{Result, SolverError};
pub use events::{EventSink, RunSummary, Solution, SolutionPiece, StatusReport, StopReason};
pub use puzzle::PuzzleFile;
pub use settings::{MoveOrdering, PruneToggles, RestartPolicy, SolverSettings};
pub use snapshot::SnapshotV1;
