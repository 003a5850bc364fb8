//! Search engine: bitboards, hashing, pruning, DFS, and the exact-cover tail

/// Block-based occupancy bitsets over container cells
pub mod bitboard;
/// Candidate placement compilation and the shared compiled puzzle
pub mod candidates;
/// Dancing-links exact-cover solver for small open regions
pub mod dlx;
/// Cooperative batch driver with pause, cancel, and timeout
pub mod driver;
/// Solvability assessment and next-piece hints for partial boards
pub mod hints;
/// Racing worker pool with global solution deduplication
pub mod pool;
/// Pruning rules over open-region structure
pub mod pruning;
/// Restart scheduling and piece priority permutation
pub mod restart;
/// Iterative depth-first search over an explicit frame stack
pub mod search;
/// Transposition table over Zobrist state hashes
pub mod table;
/// Incremental Zobrist hashing of board plus inventory state
pub mod zobrist;

pub use bitboard::BitBoard;
pub use candidates::{Candidate, CompiledPuzzle};
pub use dlx::{CoverCount, CoverReport, DlxOutcome, count_covers, solve_tail};
pub use driver::{ControlHandle, Driver};
pub use hints::{
    Assessment, BoardPiece, HintEngine, HintFailure, HintResponse, HintSettings, Inventory,
    PartialBoard,
};
pub use pool::{derived_seed, run_race};
pub use pruning::PruneCounters;
pub use restart::RestartController;
pub use search::{SearchCounters, SearchSession, StepOutcome};
pub use table::{TableFlag, TablePolicy, TranspositionTable};
pub use zobrist::ZobristKeys;
