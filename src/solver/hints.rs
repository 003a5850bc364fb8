//! Solvability assessment and next-placement hints for partial boards
//!
//! The interactive app hands over the player's position: a set of placed
//! pieces plus the remaining inventory. Above the exactness threshold only
//! cheap necessary conditions are checked and the verdict is advisory; at
//! or below it the exact-cover solver is authoritative and also yields a
//! witness cover. Hints are served from that witness, so consecutive hints
//! on an unchanged board are mutually consistent, and the witness is cached
//! keyed by the board's state hash.

use rustc_hash::FxHashSet;
use std::sync::Arc;

use crate::geometry::lattice::{CELLS_PER_PIECE, Cell};
use crate::io::error::{Result, invalid_geometry, invalid_parameter};
use crate::io::events::SolutionPiece;
use crate::io::settings::{
    DEFAULT_DLX_OPERATION_BUDGET, DEFAULT_DLX_THRESHOLD, PruneToggles, SolverSettings,
};
use crate::solver::bitboard::BitBoard;
use crate::solver::candidates::CompiledPuzzle;
use crate::solver::dlx::{self, CoverCount};
use crate::solver::pruning::{ConnectivityScratch, open_region_connected};
use crate::solver::search::{SearchSession, StepOutcome};

/// Cells per piece as the u32 the board arithmetic works in
const PIECE_CELLS: u32 = CELLS_PER_PIECE as u32;

/// Default cap on the cover count reported alongside a verdict
pub const DEFAULT_COUNT_CAP: u64 = 32;
/// Default step budget for the depth-first fallback
pub const DEFAULT_DFS_NODE_BUDGET: u64 = 200_000;

/// Remaining pieces available to the player
#[derive(Clone, Debug)]
pub enum Inventory {
    /// Explicit remaining count per piece
    Counted(Vec<u32>),
    /// No inventory limit; capped internally at one quarter of the open
    /// cells per piece, which no cover can exceed
    Unlimited,
}

/// One piece the player has already placed
#[derive(Clone, Debug)]
pub struct BoardPiece {
    /// Piece index within the set
    pub piece: usize,
    /// Container cells the piece covers
    pub cells: [Cell; 4],
}

/// A player's position: placed pieces plus remaining inventory
#[derive(Clone, Debug)]
pub struct PartialBoard {
    /// Pieces already on the board
    pub pieces: Vec<BoardPiece>,
    /// Remaining inventory
    pub inventory: Inventory,
}

/// Why a board cannot be completed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HintFailure {
    /// The remaining inventory cannot cover the open cells
    InventoryExhausted,
    /// A necessary geometric condition fails (cell count or connectivity)
    GeometricallyImpossible,
    /// The exact-cover solver refuted every completion
    ProvenUnsolvable,
    /// Budgets ran out before any verdict
    TimedOut,
}

/// Solvability verdict for a partial board
#[derive(Clone, Debug)]
pub enum Assessment {
    /// A completion exists; the witness covers every open cell
    Solvable {
        /// Cover count, exact or truncated at the cap
        cover_count: CoverCount,
        /// One concrete completion
        witness: Vec<SolutionPiece>,
    },
    /// Above the exactness threshold all necessary conditions pass
    PossiblySolvable,
    /// The board cannot be completed
    Unsolvable(HintFailure),
    /// Budgets ran out before any verdict
    TimedOut,
}

/// Answer to a hint request for one target cell
#[derive(Clone, Debug)]
pub enum HintResponse {
    /// Place this piece; it covers the target and keeps the board solvable
    Placement(SolutionPiece),
    /// No placement can be recommended
    Failure(HintFailure),
}

/// Budgets and thresholds for hint queries
#[derive(Clone, Copy, Debug)]
pub struct HintSettings {
    /// Open-cell count at or below which verdicts are exact
    pub exact_threshold: u32,
    /// Link-operation budget per exact-cover invocation
    pub dlx_operation_budget: u64,
    /// Cap on the reported cover count
    pub count_cap: u64,
    /// Step budget for the depth-first fallback
    pub dfs_node_budget: u64,
}

impl Default for HintSettings {
    fn default() -> Self {
        Self {
            exact_threshold: DEFAULT_DLX_THRESHOLD,
            dlx_operation_budget: DEFAULT_DLX_OPERATION_BUDGET,
            count_cap: DEFAULT_COUNT_CAP,
            dfs_node_budget: DEFAULT_DFS_NODE_BUDGET,
        }
    }
}

/// Query statistics for status displays
#[derive(Clone, Copy, Debug, Default)]
pub struct HintStats {
    /// Assessments served
    pub assessments: u64,
    /// Hints served
    pub hints: u64,
    /// Hints answered from the cached witness
    pub cache_hits: u64,
    /// Exact-cover invocations
    pub dlx_calls: u64,
    /// Depth-first fallbacks after an exact-cover abort
    pub dfs_fallbacks: u64,
}

struct WitnessCache {
    board_hash: u64,
    witness: Vec<SolutionPiece>,
    /// Witness entries already handed out as hints
    used: FxHashSet<usize>,
}

enum DfsVerdict {
    Witness(Vec<SolutionPiece>),
    Refuted,
    OutOfBudget,
}

/// Hint and assessment service over one compiled puzzle
///
/// The puzzle must have been compiled with a nonzero inventory for every
/// piece the player may still hold, since compilation drops candidates for
/// zero-inventory pieces.
pub struct HintEngine {
    puzzle: Arc<CompiledPuzzle>,
    settings: HintSettings,
    cache: Option<WitnessCache>,
    scratch: ConnectivityScratch,
    /// Query statistics
    pub stats: HintStats,
}

impl HintEngine {
    /// Create an engine over a compiled puzzle
    pub fn new(puzzle: Arc<CompiledPuzzle>, settings: HintSettings) -> Self {
        let cell_count = puzzle.cell_count() as usize;
        Self {
            puzzle,
            settings,
            cache: None,
            scratch: ConnectivityScratch::new(cell_count),
            stats: HintStats::default(),
        }
    }

    /// Judge whether a partial board can still be completed
    ///
    /// # Errors
    ///
    /// Returns an error if the board references cells outside the
    /// container, covers a cell twice, or carries a malformed inventory.
    pub fn assess(&mut self, board: &PartialBoard) -> Result<Assessment> {
        self.stats.assessments += 1;
        let (occupancy, inventory) = self.resolve_board(board)?;
        let open_count = self.puzzle.cell_count() - occupancy.count_ones();

        // a legally filled board is its own witness
        if open_count == 0 {
            return Ok(Assessment::Solvable {
                cover_count: CoverCount::Exact(1),
                witness: Vec::new(),
            });
        }

        // necessary conditions, cheap at any size
        if open_count % PIECE_CELLS != 0 {
            return Ok(Assessment::Unsolvable(HintFailure::GeometricallyImpossible));
        }
        let supply: u64 = inventory.iter().map(|&count| u64::from(count)).sum();
        if supply * u64::from(PIECE_CELLS) < u64::from(open_count) {
            return Ok(Assessment::Unsolvable(HintFailure::InventoryExhausted));
        }
        if !open_region_connected(
            &self.puzzle.container,
            &occupancy,
            None,
            open_count,
            &mut self.scratch,
        ) {
            return Ok(Assessment::Unsolvable(HintFailure::GeometricallyImpossible));
        }

        if open_count > self.settings.exact_threshold {
            return Ok(Assessment::PossiblySolvable);
        }

        self.exact_assess(&occupancy, &inventory)
    }

    /// Recommend a placement covering `target` that keeps the board
    /// completable
    ///
    /// # Errors
    ///
    /// Returns an error if the board is malformed, or if `target` is not an
    /// open container cell.
    pub fn hint(&mut self, board: &PartialBoard, target: Cell) -> Result<HintResponse> {
        self.stats.hints += 1;
        let (occupancy, inventory) = self.resolve_board(board)?;
        let Some(target_index) = self.puzzle.container.index_of(target) else {
            return Err(invalid_geometry(&format!(
                "hint target {target:?} is not a container cell"
            )));
        };
        if occupancy.get(target_index) {
            return Err(invalid_geometry(&format!(
                "hint target {target:?} is already covered"
            )));
        }

        let board_hash = self.puzzle.zobrist.state_hash(&occupancy, &inventory);
        if let Some(placement) = self.cached_placement(board_hash, target_index) {
            self.stats.cache_hits += 1;
            return Ok(HintResponse::Placement(placement));
        }

        let witness = match self.find_witness(&occupancy, &inventory)? {
            Ok(witness) => witness,
            Err(failure) => return Ok(HintResponse::Failure(failure)),
        };

        self.cache = Some(WitnessCache {
            board_hash,
            witness,
            used: FxHashSet::default(),
        });
        self.cached_placement(board_hash, target_index).map_or_else(
            || {
                Err(invalid_geometry(
                    &"witness cover does not reach the target cell",
                ))
            },
            |placement| Ok(HintResponse::Placement(placement)),
        )
    }

    fn exact_assess(&mut self, occupancy: &BitBoard, inventory: &[u32]) -> Result<Assessment> {
        self.stats.dlx_calls += 1;
        let report = dlx::count_covers(
            &self.puzzle,
            occupancy,
            inventory,
            self.settings.count_cap,
            self.settings.dlx_operation_budget,
        );
        match (report.count, report.witness) {
            (count, Some(rows)) => Ok(Assessment::Solvable {
                cover_count: count,
                witness: self.rows_to_pieces(&rows),
            }),
            (CoverCount::Exact(0), None) => {
                Ok(Assessment::Unsolvable(HintFailure::ProvenUnsolvable))
            }
            // aborted with nothing found: fall back to plain search
            (CoverCount::Aborted(_), None) => {
                match self.dfs_fallback(occupancy, inventory)? {
                    DfsVerdict::Witness(witness) => Ok(Assessment::Solvable {
                        cover_count: CoverCount::AtLeast(1),
                        witness,
                    }),
                    DfsVerdict::Refuted => {
                        Ok(Assessment::Unsolvable(HintFailure::ProvenUnsolvable))
                    }
                    DfsVerdict::OutOfBudget => Ok(Assessment::TimedOut),
                }
            }
            _ => Ok(Assessment::TimedOut),
        }
    }

    /// Full witness search used by `hint`; outer error is a malformed
    /// query, inner error a well-formed "no placement" answer
    fn find_witness(
        &mut self,
        occupancy: &BitBoard,
        inventory: &[u32],
    ) -> Result<std::result::Result<Vec<SolutionPiece>, HintFailure>> {
        let open_count = self.puzzle.cell_count() - occupancy.count_ones();
        if open_count % PIECE_CELLS != 0 {
            return Ok(Err(HintFailure::GeometricallyImpossible));
        }
        let supply: u64 = inventory.iter().map(|&count| u64::from(count)).sum();
        if supply * u64::from(PIECE_CELLS) < u64::from(open_count) {
            return Ok(Err(HintFailure::InventoryExhausted));
        }
        if !open_region_connected(
            &self.puzzle.container,
            occupancy,
            None,
            open_count,
            &mut self.scratch,
        ) {
            return Ok(Err(HintFailure::GeometricallyImpossible));
        }

        if open_count <= self.settings.exact_threshold {
            return Ok(match self.exact_assess(occupancy, inventory)? {
                Assessment::Solvable { witness, .. } => Ok(witness),
                Assessment::Unsolvable(failure) => Err(failure),
                Assessment::PossiblySolvable | Assessment::TimedOut => {
                    Err(HintFailure::TimedOut)
                }
            });
        }

        // large open region: a bounded complete search must find the witness
        Ok(match self.dfs_fallback(occupancy, inventory)? {
            DfsVerdict::Witness(witness) => Ok(witness),
            DfsVerdict::Refuted => Err(HintFailure::ProvenUnsolvable),
            DfsVerdict::OutOfBudget => Err(HintFailure::TimedOut),
        })
    }

    fn dfs_fallback(&mut self, occupancy: &BitBoard, inventory: &[u32]) -> Result<DfsVerdict> {
        self.stats.dfs_fallbacks += 1;
        let settings = SolverSettings {
            max_solutions: Some(1),
            dlx_threshold: 0,
            // neighbor-touch is incomplete; a witness search must stay exact
            pruning: PruneToggles {
                neighbor_touch: false,
                ..PruneToggles::default()
            },
            ..SolverSettings::default()
        };
        let mut session = SearchSession::with_board(
            Arc::clone(&self.puzzle),
            settings,
            occupancy.clone(),
            inventory.to_vec(),
        )?;

        for _ in 0..self.settings.dfs_node_budget {
            match session.step() {
                StepOutcome::Progress => {}
                StepOutcome::Solution(solution) => {
                    return Ok(DfsVerdict::Witness(solution.pieces));
                }
                StepOutcome::Finished(_) => return Ok(DfsVerdict::Refuted),
            }
        }
        Ok(DfsVerdict::OutOfBudget)
    }

    fn cached_placement(&mut self, board_hash: u64, target_index: u32) -> Option<SolutionPiece> {
        let cache = self.cache.as_mut()?;
        if cache.board_hash != board_hash {
            return None;
        }
        // placements already handed out are spent; covering the target with
        // one again must recompute the witness instead
        let (index, placement) = cache
            .witness
            .iter()
            .enumerate()
            .find(|(index, piece)| {
                !cache.used.contains(index) && piece.cells.contains(&target_index)
            })
            .map(|(index, piece)| (index, piece.clone()))?;
        cache.used.insert(index);
        Some(placement)
    }

    /// Resolve a partial board into an occupancy mask and a concrete
    /// inventory
    fn resolve_board(&self, board: &PartialBoard) -> Result<(BitBoard, Vec<u32>)> {
        let mut occupancy = BitBoard::new(self.puzzle.cell_count());
        for placed in &board.pieces {
            if placed.piece >= self.puzzle.pieces.len() {
                return Err(invalid_parameter(
                    "board",
                    &placed.piece,
                    &format!("unknown piece index ({} pieces)", self.puzzle.pieces.len()),
                ));
            }
            for &cell in &placed.cells {
                let Some(index) = self.puzzle.container.index_of(cell) else {
                    return Err(invalid_geometry(&format!(
                        "placed cell {cell:?} is outside the container"
                    )));
                };
                if occupancy.get(index) {
                    return Err(invalid_geometry(&format!(
                        "cell {cell:?} is covered twice"
                    )));
                }
                occupancy.set(index);
            }
        }

        let open_count = self.puzzle.cell_count() - occupancy.count_ones();
        let inventory = match &board.inventory {
            Inventory::Counted(counts) => {
                if counts.len() != self.puzzle.pieces.len() {
                    return Err(invalid_parameter(
                        "inventory",
                        &counts.len(),
                        &format!(
                            "must list one count per piece ({} pieces)",
                            self.puzzle.pieces.len()
                        ),
                    ));
                }
                counts.clone()
            }
            Inventory::Unlimited => {
                let cap = open_count / PIECE_CELLS;
                vec![cap; self.puzzle.pieces.len()]
            }
        };
        Ok((occupancy, inventory))
    }

    fn rows_to_pieces(&self, rows: &[u32]) -> Vec<SolutionPiece> {
        rows.iter()
            .filter_map(|&id| self.puzzle.candidate(id))
            .map(|candidate| SolutionPiece {
                piece: candidate.piece,
                orientation: candidate.orientation,
                translation: candidate.translation,
                cells: candidate.cells,
            })
            .collect()
    }
}
