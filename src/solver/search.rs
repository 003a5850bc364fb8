//! Iterative depth-first search over an explicit frame stack
//!
//! The session owns all mutable run state: occupancy board, remaining
//! inventory, incremental Zobrist hash, decision stack, and counters. One
//! call to [`SearchSession::step`] performs one bounded unit of work, so a
//! driver can interleave thousands of sessions-steps with pause, cancel,
//! and status checks without the search ever blocking.
//!
//! A frame records a target cell plus a cursor into that cell's candidate
//! list. The cursor starts at a (possibly randomized) offset and wraps
//! through the whole list, so tie randomization changes visit order but
//! never reachability. When a frame exhausts its list the state above it is
//! proven unsolvable and recorded in the transposition table.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::io::error::{Result, SolverError, invalid_parameter};
use crate::io::events::{Solution, SolutionPiece, StatusReport, StopReason};
use crate::io::settings::{MoveOrdering, SolverSettings, TT_CLEAR_WATERMARK};
use crate::io::snapshot::{SNAPSHOT_VERSION, SnapshotV1};
use crate::solver::bitboard::BitBoard;
use crate::solver::candidates::{Candidate, CompiledPuzzle};
use crate::solver::dlx::{self, DlxOutcome};
use crate::solver::pruning::{
    ConnectivityScratch, PruneCounters, colors_even, open_count_fits_pieces,
    open_region_connected, touches_filled,
};
use crate::solver::restart::RestartController;
use crate::solver::table::{TableFlag, TranspositionTable};

/// One suspended decision point on the search stack
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFrame {
    /// Open cell this frame must cover
    pub target: u32,
    /// Initial cursor offset into the target's candidate list
    pub offset: u32,
    /// Candidates examined so far, counting from the offset
    pub scanned: u32,
    /// Candidate currently placed by this frame
    pub placed: Option<u32>,
}

/// Run counters carried by status reports and snapshots
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SearchCounters {
    /// Step invocations that performed search work
    pub nodes: u64,
    /// Accepted placements
    pub placements: u64,
    /// Undone placements
    pub backtracks: u64,
    /// Deduplicated solutions emitted
    pub solutions: u64,
    /// Deepest placement count reached
    pub best_depth: u32,
    /// Times the best depth was re-hit after falling strictly below it
    pub best_depth_hits: u64,
    /// Tail solver invocations
    pub dlx_calls: u64,
    /// Tail solver invocations that ran out of budget
    pub dlx_aborts: u64,
}

/// Result of one search step
#[derive(Clone, Debug)]
pub enum StepOutcome {
    /// Work was done; call again
    Progress,
    /// A new solution was found; the run continues unless finished
    Solution(Solution),
    /// The run is over; further steps repeat this outcome
    Finished(StopReason),
}

enum TailVerdict {
    /// Tail solver not consulted or inconclusive
    Skipped,
    /// Fresh cover found and registered
    Witness(Solution),
    /// Cover found but already emitted
    Duplicate,
    /// Current state proven unsolvable
    Refuted,
}

/// One independent search over a shared compiled puzzle
pub struct SearchSession {
    puzzle: Arc<CompiledPuzzle>,
    settings: SolverSettings,
    /// Per-cell candidate ids, re-sorted by piece priority
    ordered: Vec<Vec<u32>>,
    /// Board state the run starts from; restarts reset to this
    initial_occupancy: BitBoard,
    initial_inventory: Vec<u32>,
    occupancy: BitBoard,
    inventory: Vec<u32>,
    open_count: u32,
    open_colors: [u32; 2],
    hash: u64,
    stack: Vec<SearchFrame>,
    depth: u32,
    below_best: bool,
    /// Step and placement counters
    pub counters: SearchCounters,
    /// Per-rule prune counters
    pub prunes: PruneCounters,
    table: TranspositionTable,
    controller: RestartController,
    seen_solutions: FxHashSet<Vec<(usize, [u32; 4])>>,
    /// State hashes the tail solver has already been tried on
    dlx_attempted: FxHashSet<u64>,
    scratch: ConnectivityScratch,
    /// Leaf unwind deferred so a just-emitted solution stays inspectable
    pending_advance: bool,
    root_expanded: bool,
    finished: Option<StopReason>,
}

impl SearchSession {
    /// Create a session over an empty board
    ///
    /// # Errors
    ///
    /// Returns an error if the settings fail validation or the
    /// transposition table capacity is over budget.
    pub fn new(puzzle: Arc<CompiledPuzzle>, settings: SolverSettings) -> Result<Self> {
        let occupancy = BitBoard::new(puzzle.cell_count());
        let inventory = puzzle.initial_inventory.clone();
        Self::with_board(puzzle, settings, occupancy, inventory)
    }

    /// Create a session over a partially filled board
    ///
    /// Used by the hint engine to search from a player's position. The
    /// given inventory replaces the puzzle's initial inventory.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings fail validation or the board and
    /// inventory dimensions do not match the compiled puzzle.
    pub fn with_board(
        puzzle: Arc<CompiledPuzzle>,
        settings: SolverSettings,
        occupancy: BitBoard,
        inventory: Vec<u32>,
    ) -> Result<Self> {
        settings.validate()?;
        if occupancy.len() != puzzle.cell_count() {
            return Err(invalid_parameter(
                "board",
                &occupancy.len(),
                &format!("board must cover {} container cells", puzzle.cell_count()),
            ));
        }
        if inventory.len() != puzzle.pieces.len() {
            return Err(invalid_parameter(
                "inventory",
                &inventory.len(),
                &format!("must list one count per piece ({} pieces)", puzzle.pieces.len()),
            ));
        }

        let table = TranspositionTable::with_capacity(settings.tt_capacity, settings.tt_policy)?;
        let controller = RestartController::new(
            settings.seed,
            settings.randomize_ties,
            settings.shuffle_pieces,
            settings.restart,
            puzzle.pieces.len(),
        );
        let hash = puzzle.zobrist.state_hash(&occupancy, &inventory);
        let (open_count, open_colors) = open_stats(&puzzle, &occupancy);
        let cell_count = puzzle.cell_count() as usize;

        let mut session = Self {
            initial_occupancy: occupancy.clone(),
            initial_inventory: inventory.clone(),
            occupancy,
            inventory,
            open_count,
            open_colors,
            hash,
            stack: Vec::new(),
            depth: 0,
            below_best: false,
            counters: SearchCounters::default(),
            prunes: PruneCounters::default(),
            table,
            controller,
            seen_solutions: FxHashSet::default(),
            dlx_attempted: FxHashSet::default(),
            scratch: ConnectivityScratch::new(cell_count),
            pending_advance: false,
            root_expanded: false,
            finished: None,
            ordered: Vec::new(),
            settings,
            puzzle,
        };
        session.rebuild_ordered();
        Ok(session)
    }

    /// Perform one bounded unit of search work
    pub fn step(&mut self) -> StepOutcome {
        if let Some(reason) = self.finished {
            return StepOutcome::Finished(reason);
        }

        if self.pending_advance {
            self.pending_advance = false;
            self.backtrack_top();
            return StepOutcome::Progress;
        }

        self.counters.nodes += 1;

        if self.controller.restart_due(self.counters.nodes) {
            self.restart();
            return StepOutcome::Progress;
        }

        if !self.root_expanded {
            return self.expand_root();
        }

        if self.stack.is_empty() {
            return self.finish(StopReason::Exhausted);
        }

        if self.stack.last().is_some_and(|frame| frame.placed.is_some()) {
            return self.descend();
        }

        self.scan_top()
    }

    /// Abandon the current attempt and start over from the initial board
    ///
    /// Solutions, counters, prune statistics, and (below the clear
    /// watermark) the transposition table all survive the restart.
    pub fn restart(&mut self) {
        self.controller.begin_restart(self.counters.nodes);
        self.occupancy = self.initial_occupancy.clone();
        self.inventory = self.initial_inventory.clone();
        let (open_count, open_colors) = open_stats(&self.puzzle, &self.occupancy);
        self.open_count = open_count;
        self.open_colors = open_colors;
        self.hash = self
            .puzzle
            .zobrist
            .state_hash(&self.occupancy, &self.inventory);
        self.stack.clear();
        self.depth = 0;
        self.below_best = self.counters.best_depth > 0;
        self.pending_advance = false;
        self.root_expanded = false;
        self.rebuild_ordered();
        if self.table.occupancy() > TT_CLEAR_WATERMARK {
            self.table.clear();
        }
    }

    /// Whether the run has reached a terminal state
    pub const fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// Terminal reason, once the run is over
    pub const fn finish_reason(&self) -> Option<StopReason> {
        self.finished
    }

    /// Whether the configured solution count has been reached
    pub fn solution_limit_reached(&self) -> bool {
        self.settings
            .max_solutions
            .is_some_and(|limit| self.counters.solutions >= limit)
    }

    /// Force the terminal state; used by drivers for timeout and cancel
    pub const fn finish_with(&mut self, reason: StopReason) {
        if self.finished.is_none() {
            self.finished = Some(reason);
        }
    }

    /// Settings the session was built with
    pub const fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Shared compiled puzzle
    pub const fn puzzle(&self) -> &Arc<CompiledPuzzle> {
        &self.puzzle
    }

    /// Currently open cell count
    pub const fn open_cells(&self) -> u32 {
        self.open_count
    }

    /// Completed restarts
    pub const fn restarts(&self) -> u64 {
        self.controller.restarts
    }

    /// Build a status report for the current state
    pub fn status(&self, elapsed: Duration, worker: Option<usize>) -> StatusReport {
        let seconds = elapsed.as_secs_f64();
        let nodes_per_second = if seconds > 0.0 {
            self.counters.nodes as f64 / seconds
        } else {
            0.0
        };
        StatusReport {
            worker,
            nodes: self.counters.nodes,
            depth: self.depth,
            best_depth: self.counters.best_depth,
            best_depth_hits: self.counters.best_depth_hits,
            elapsed,
            nodes_per_second,
            open_cells: self.open_count,
            solutions: self.counters.solutions,
            restarts: self.controller.restarts,
            prunes: self.prunes,
            placements: self.placed_pieces(),
        }
    }

    /// Capture the full resumable state of the run
    ///
    /// The transposition table is not captured: it only prunes, so a resume
    /// without it repeats work but emits the same solution stream. The RNG
    /// is captured as a fresh reseed value rather than raw generator state.
    pub fn to_snapshot(&mut self) -> SnapshotV1 {
        SnapshotV1 {
            version: SNAPSHOT_VERSION,
            container_id: self.puzzle.container.id().map(str::to_owned),
            cell_count: self.puzzle.cell_count(),
            candidate_count: self.puzzle.candidates.len(),
            piece_count: self.puzzle.pieces.len(),
            settings: self.settings.clone(),
            initial_occupancy_blocks: self.initial_occupancy.blocks().to_vec(),
            occupancy_blocks: self.occupancy.blocks().to_vec(),
            inventory: self.inventory.clone(),
            initial_inventory: self.initial_inventory.clone(),
            frames: self.stack.clone(),
            hash: self.hash,
            counters: self.counters,
            prunes: self.prunes,
            seen_solutions: self.seen_solutions.iter().cloned().collect(),
            rng_reseed: self.controller.reseed_for_snapshot(),
            piece_priority: self.controller.priority_snapshot(),
            restarts: self.controller.restarts,
            depth: self.depth,
            below_best: self.below_best,
            pending_advance: self.pending_advance,
            root_expanded: self.root_expanded,
        }
    }

    /// Rebuild a session from a snapshot over the same compiled puzzle
    ///
    /// # Errors
    ///
    /// Returns `SolverError::Snapshot` if the snapshot version or puzzle
    /// dimensions do not match, or if the recorded state is internally
    /// inconsistent.
    pub fn from_snapshot(puzzle: Arc<CompiledPuzzle>, snapshot: SnapshotV1) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(snapshot_error(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        if snapshot.cell_count != puzzle.cell_count()
            || snapshot.candidate_count != puzzle.candidates.len()
            || snapshot.piece_count != puzzle.pieces.len()
        {
            return Err(snapshot_error(
                "snapshot dimensions do not match the compiled puzzle".to_string(),
            ));
        }

        let cell_count = puzzle.cell_count();
        let initial_occupancy =
            BitBoard::from_blocks(snapshot.initial_occupancy_blocks, cell_count)
                .ok_or_else(|| snapshot_error("initial occupancy blocks are malformed".to_string()))?;
        let occupancy = BitBoard::from_blocks(snapshot.occupancy_blocks, cell_count)
            .ok_or_else(|| snapshot_error("occupancy blocks are malformed".to_string()))?;

        for frame in &snapshot.frames {
            if frame.target >= cell_count {
                return Err(snapshot_error(format!(
                    "frame targets cell {} outside the container",
                    frame.target
                )));
            }
            if frame
                .placed
                .is_some_and(|id| id as usize >= puzzle.candidates.len())
            {
                return Err(snapshot_error(
                    "frame references an unknown candidate".to_string(),
                ));
            }
        }

        if puzzle.zobrist.state_hash(&occupancy, &snapshot.inventory) != snapshot.hash {
            return Err(snapshot_error(
                "recorded hash does not match the recorded board".to_string(),
            ));
        }

        let mut settings = snapshot.settings;
        settings.seed = snapshot.rng_reseed;

        let mut session = Self::with_board(
            puzzle,
            settings,
            initial_occupancy,
            snapshot.initial_inventory,
        )?;
        session.occupancy = occupancy;
        session.inventory = snapshot.inventory;
        let (open_count, open_colors) = open_stats(&session.puzzle, &session.occupancy);
        session.open_count = open_count;
        session.open_colors = open_colors;
        session.hash = snapshot.hash;
        session.stack = snapshot.frames;
        session.depth = snapshot.depth;
        session.below_best = snapshot.below_best;
        session.counters = snapshot.counters;
        session.prunes = snapshot.prunes;
        session.seen_solutions = snapshot.seen_solutions.into_iter().collect();
        session.pending_advance = snapshot.pending_advance;
        session.root_expanded = snapshot.root_expanded;
        session
            .controller
            .restore(snapshot.restarts, snapshot.counters.nodes, snapshot.piece_priority);
        session.rebuild_ordered();
        Ok(session)
    }

    fn expand_root(&mut self) -> StepOutcome {
        self.root_expanded = true;

        if self.settings.pruning.mod_four && !open_count_fits_pieces(self.open_count) {
            self.prunes.mod_four += 1;
            return self.finish(StopReason::Exhausted);
        }
        if self.settings.pruning.color_parity
            && self.puzzle.parity_uniform
            && !colors_even(self.open_colors)
        {
            self.prunes.color_parity += 1;
            return self.finish(StopReason::Exhausted);
        }
        let puzzle = Arc::clone(&self.puzzle);
        if self.settings.pruning.connectivity
            && !open_region_connected(
                &puzzle.container,
                &self.occupancy,
                None,
                self.open_count,
                &mut self.scratch,
            )
        {
            self.prunes.connectivity += 1;
            return self.finish(StopReason::Exhausted);
        }

        if self.open_count == 0 {
            // the board arrived complete; the empty placement list is its cover
            let pieces = self.placed_pieces();
            let registered = self.register_solution(pieces);
            if self.finished.is_none() {
                self.finished = Some(StopReason::Exhausted);
            }
            return registered.map_or_else(
                || StepOutcome::Finished(StopReason::Exhausted),
                StepOutcome::Solution,
            );
        }

        self.push_frame();
        match self.consult_tail_solver() {
            TailVerdict::Witness(solution) => StepOutcome::Solution(solution),
            TailVerdict::Refuted => {
                self.stack.pop();
                self.finish(StopReason::Exhausted)
            }
            TailVerdict::Skipped | TailVerdict::Duplicate => StepOutcome::Progress,
        }
    }

    fn descend(&mut self) -> StepOutcome {
        if self.open_count == 0 {
            return self.handle_full_board();
        }
        match self.consult_tail_solver() {
            TailVerdict::Witness(solution) => StepOutcome::Solution(solution),
            TailVerdict::Refuted => {
                self.backtrack_top();
                StepOutcome::Progress
            }
            TailVerdict::Skipped | TailVerdict::Duplicate => {
                self.push_frame();
                StepOutcome::Progress
            }
        }
    }

    fn scan_top(&mut self) -> StepOutcome {
        let Some(frame) = self.stack.last().copied() else {
            return self.finish(StopReason::Exhausted);
        };
        let list_len = self.ordered.get(frame.target as usize).map_or(0, Vec::len) as u32;

        let mut scanned = frame.scanned;
        while scanned < list_len {
            let position = (frame.offset + scanned) % list_len;
            let candidate_id = self
                .ordered
                .get(frame.target as usize)
                .and_then(|list| list.get(position as usize))
                .copied();
            scanned += 1;
            let Some(candidate_id) = candidate_id else {
                continue;
            };
            if self.try_place(candidate_id) {
                if let Some(top) = self.stack.last_mut() {
                    top.scanned = scanned;
                    top.placed = Some(candidate_id);
                }
                self.note_depth_after_place();
                return StepOutcome::Progress;
            }
        }

        if let Some(top) = self.stack.last_mut() {
            top.scanned = scanned;
        }
        self.on_frame_exhausted()
    }

    /// Apply the full prune chain to a candidate and place it on success
    fn try_place(&mut self, candidate_id: u32) -> bool {
        let puzzle = Arc::clone(&self.puzzle);
        let Some(candidate) = puzzle.candidate(candidate_id) else {
            return false;
        };

        if self
            .inventory
            .get(candidate.piece)
            .copied()
            .unwrap_or(0)
            == 0
        {
            self.prunes.inventory += 1;
            return false;
        }
        if candidate.mask.intersects(&self.occupancy) {
            self.prunes.overlap += 1;
            return false;
        }

        let toggles = self.settings.pruning;
        if toggles.neighbor_touch && !touches_filled(candidate, &self.occupancy) {
            self.prunes.neighbor_touch += 1;
            return false;
        }

        let open_after = self.open_count.saturating_sub(4);
        if toggles.color_parity && puzzle.parity_uniform {
            let colors_after = [
                self.open_colors[0].saturating_sub(u32::from(candidate.color_counts[0])),
                self.open_colors[1].saturating_sub(u32::from(candidate.color_counts[1])),
            ];
            if !colors_even(colors_after) {
                self.prunes.color_parity += 1;
                return false;
            }
        }
        if toggles.mod_four && !open_count_fits_pieces(open_after) {
            self.prunes.mod_four += 1;
            return false;
        }
        if toggles.connectivity
            && !open_region_connected(
                &puzzle.container,
                &self.occupancy,
                Some(&candidate.mask),
                open_after,
                &mut self.scratch,
            )
        {
            self.prunes.connectivity += 1;
            return false;
        }

        let remaining = self.inventory.get(candidate.piece).copied().unwrap_or(0);
        let delta = self.transition_delta(candidate, remaining);
        if toggles.table && self.table.lookup(self.hash ^ delta) == Some(TableFlag::Unsolvable) {
            self.prunes.table += 1;
            return false;
        }

        self.apply(candidate, delta);
        true
    }

    fn apply(&mut self, candidate: &Candidate, delta: u64) {
        self.occupancy.union_with(&candidate.mask);
        if let Some(count) = self.inventory.get_mut(candidate.piece) {
            *count = count.saturating_sub(1);
        }
        self.open_count = self.open_count.saturating_sub(4);
        self.open_colors[0] = self.open_colors[0].saturating_sub(u32::from(candidate.color_counts[0]));
        self.open_colors[1] = self.open_colors[1].saturating_sub(u32::from(candidate.color_counts[1]));
        self.hash ^= delta;
        self.counters.placements += 1;
    }

    /// Undo the top frame's placement and leave its scan to continue
    fn backtrack_top(&mut self) {
        let Some(frame) = self.stack.last().copied() else {
            return;
        };
        let Some(candidate_id) = frame.placed else {
            return;
        };

        let puzzle = Arc::clone(&self.puzzle);
        if let Some(candidate) = puzzle.candidate(candidate_id) {
            let remaining_before = self
                .inventory
                .get(candidate.piece)
                .copied()
                .unwrap_or(0)
                + 1;
            let delta = self.transition_delta(candidate, remaining_before);
            self.occupancy.subtract(&candidate.mask);
            if let Some(count) = self.inventory.get_mut(candidate.piece) {
                *count += 1;
            }
            self.open_count += 4;
            self.open_colors[0] += u32::from(candidate.color_counts[0]);
            self.open_colors[1] += u32::from(candidate.color_counts[1]);
            self.hash ^= delta;
        }
        if let Some(top) = self.stack.last_mut() {
            top.placed = None;
        }

        self.counters.backtracks += 1;
        self.depth = self.depth.saturating_sub(1);
        if self.depth < self.counters.best_depth {
            self.below_best = true;
            self.controller.note_stalled_backtrack();
        }
    }

    fn on_frame_exhausted(&mut self) -> StepOutcome {
        // every completion must cover the frame's target, so the state the
        // frame was opened on is refuted
        if self.settings.pruning.table {
            self.table.mark_unsolvable(self.hash);
        }
        self.stack.pop();
        if self.stack.is_empty() {
            return self.finish(StopReason::Exhausted);
        }
        self.backtrack_top();
        StepOutcome::Progress
    }

    fn handle_full_board(&mut self) -> StepOutcome {
        let pieces = self.placed_pieces();
        if let Some(solution) = self.register_solution(pieces) {
            self.pending_advance = true;
            StepOutcome::Solution(solution)
        } else {
            self.backtrack_top();
            StepOutcome::Progress
        }
    }

    fn consult_tail_solver(&mut self) -> TailVerdict {
        let threshold = self.settings.dlx_threshold;
        if threshold == 0 || self.open_count == 0 || self.open_count > threshold {
            return TailVerdict::Skipped;
        }
        if !self.dlx_attempted.insert(self.hash) {
            return TailVerdict::Skipped;
        }

        self.counters.dlx_calls += 1;
        let puzzle = Arc::clone(&self.puzzle);
        match dlx::solve_tail(
            &puzzle,
            &self.occupancy,
            &self.inventory,
            self.settings.dlx_operation_budget,
        ) {
            DlxOutcome::Satisfiable(rows) => {
                let mut pieces = self.placed_pieces();
                pieces.extend(rows.iter().filter_map(|&id| self.solution_piece(id)));
                self.register_solution(pieces)
                    .map_or(TailVerdict::Duplicate, TailVerdict::Witness)
            }
            DlxOutcome::Unsatisfiable => {
                if self.settings.pruning.table {
                    self.table.mark_unsolvable(self.hash);
                }
                TailVerdict::Refuted
            }
            DlxOutcome::Aborted => {
                self.counters.dlx_aborts += 1;
                TailVerdict::Skipped
            }
        }
    }

    fn register_solution(&mut self, pieces: Vec<SolutionPiece>) -> Option<Solution> {
        let solution = Solution { pieces };
        if !self.seen_solutions.insert(solution.signature()) {
            return None;
        }
        self.counters.solutions += 1;
        if self.solution_limit_reached() {
            self.finished = Some(StopReason::SolutionLimit);
        }
        Some(solution)
    }

    fn push_frame(&mut self) {
        if self.settings.pruning.table {
            self.table.mark_seen(self.hash);
        }
        let target = self.select_target();
        let list_len = self.ordered.get(target as usize).map_or(0, Vec::len);
        let offset = self.controller.entry_offset(list_len);
        self.stack.push(SearchFrame {
            target,
            offset,
            scanned: 0,
            placed: None,
        });
    }

    /// Pick the next cell to cover
    fn select_target(&self) -> u32 {
        match self.settings.move_ordering {
            MoveOrdering::Naive => self.occupancy.first_zero().unwrap_or(0),
            MoveOrdering::MostConstrained => {
                let mut best = self.occupancy.first_zero().unwrap_or(0);
                let mut best_count = usize::MAX;
                for cell in 0..self.puzzle.cell_count() {
                    if self.occupancy.get(cell) {
                        continue;
                    }
                    let count = self
                        .ordered
                        .get(cell as usize)
                        .map_or(0, |list| {
                            list.iter()
                                .filter(|&&id| self.candidate_is_legal(id))
                                .count()
                        });
                    if count < best_count {
                        best_count = count;
                        best = cell;
                        if count == 0 {
                            break;
                        }
                    }
                }
                best
            }
        }
    }

    fn candidate_is_legal(&self, candidate_id: u32) -> bool {
        self.puzzle.candidate(candidate_id).is_some_and(|candidate| {
            self.inventory
                .get(candidate.piece)
                .copied()
                .unwrap_or(0)
                > 0
                && !candidate.mask.intersects(&self.occupancy)
        })
    }

    fn note_depth_after_place(&mut self) {
        self.depth += 1;
        if self.depth > self.counters.best_depth {
            self.counters.best_depth = self.depth;
            self.below_best = false;
            self.controller.note_progress();
            // a deeper frontier invalidates the attempted-set heuristic
            self.dlx_attempted.clear();
        } else if self.depth == self.counters.best_depth && self.below_best {
            self.counters.best_depth_hits += 1;
            self.below_best = false;
        }
    }

    /// Hash delta for placing or undoing one candidate
    ///
    /// `remaining_before` is the piece's inventory before the placement.
    fn transition_delta(&self, candidate: &Candidate, remaining_before: u32) -> u64 {
        let zobrist = &self.puzzle.zobrist;
        let mut delta = 0u64;
        for &cell in &candidate.cells {
            delta ^= zobrist.cell(cell);
        }
        delta ^= zobrist.piece_count(candidate.piece, remaining_before);
        delta ^= zobrist.piece_count(candidate.piece, remaining_before.saturating_sub(1));
        delta
    }

    /// Current stack placements as solution pieces, in placement order
    fn placed_pieces(&self) -> Vec<SolutionPiece> {
        self.stack
            .iter()
            .filter_map(|frame| frame.placed)
            .filter_map(|id| self.solution_piece(id))
            .collect()
    }

    fn solution_piece(&self, candidate_id: u32) -> Option<SolutionPiece> {
        self.puzzle.candidate(candidate_id).map(|candidate| SolutionPiece {
            piece: candidate.piece,
            orientation: candidate.orientation,
            translation: candidate.translation,
            cells: candidate.cells,
        })
    }

    fn rebuild_ordered(&mut self) {
        let puzzle = Arc::clone(&self.puzzle);
        self.ordered = puzzle
            .by_cell
            .iter()
            .map(|bucket| {
                let mut list = bucket.clone();
                list.sort_by_key(|&id| {
                    let piece = puzzle.candidate(id).map_or(usize::MAX, |c| c.piece);
                    (self.controller.priority_of(piece), id)
                });
                list
            })
            .collect();
    }

    fn finish(&mut self, reason: StopReason) -> StepOutcome {
        if self.finished.is_none() {
            self.finished = Some(reason);
        }
        StepOutcome::Finished(self.finished.unwrap_or(reason))
    }
}

fn open_stats(puzzle: &CompiledPuzzle, occupancy: &BitBoard) -> (u32, [u32; 2]) {
    let open_count = puzzle.cell_count() - occupancy.count_ones();
    let mut open_colors = puzzle.container.color_totals();
    for cell in occupancy.ones() {
        let color = puzzle.container.color_of(cell);
        if let Some(total) = open_colors.get_mut(color) {
            *total = total.saturating_sub(1);
        }
    }
    (open_count, open_colors)
}

fn snapshot_error(reason: String) -> SolverError {
    SolverError::Snapshot { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::container::Container;
    use crate::geometry::lattice::{Cell, Orientation};
    use crate::geometry::pieces::{Piece, PieceSet};

    fn rod_piece() -> Piece {
        Piece {
            name: "rod".to_string(),
            orientations: vec![Orientation {
                id: 0,
                offsets: [[0, 0, 0], [1, 1, 0], [2, 2, 0], [3, 3, 0]],
            }],
        }
    }

    fn line_puzzle(count: i32, rods: u32) -> Arc<CompiledPuzzle> {
        let cells: Vec<Cell> = (0..count).map(|k| [k, k, 0]).collect();
        let container = Container::new(cells, None).unwrap();
        let pieces = PieceSet::new(vec![rod_piece()]).unwrap();
        CompiledPuzzle::compile(container, pieces, vec![rods]).unwrap()
    }

    fn dfs_settings() -> SolverSettings {
        SolverSettings {
            dlx_threshold: 0,
            ..SolverSettings::default()
        }
    }

    fn run_to_end(session: &mut SearchSession) -> (Vec<Solution>, StopReason) {
        let mut solutions = Vec::new();
        for _ in 0..1_000_000 {
            match session.step() {
                StepOutcome::Progress => {}
                StepOutcome::Solution(solution) => solutions.push(solution),
                StepOutcome::Finished(reason) => return (solutions, reason),
            }
        }
        panic!("search did not terminate");
    }

    #[test]
    fn test_exact_fit_finds_one_solution() {
        let puzzle = line_puzzle(4, 1);
        let mut session = SearchSession::new(puzzle, dfs_settings()).unwrap();
        let (solutions, reason) = run_to_end(&mut session);
        assert_eq!(reason, StopReason::SolutionLimit);
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].pieces[0].cells, [0, 1, 2, 3]);
    }

    #[test]
    fn test_exhaustion_deduplicates_solutions() {
        let puzzle = line_puzzle(8, 2);
        let settings = SolverSettings {
            max_solutions: None,
            ..dfs_settings()
        };
        let mut session = SearchSession::new(puzzle, settings).unwrap();
        let (solutions, reason) = run_to_end(&mut session);
        // one distinct cover, regardless of placement order
        assert_eq!(reason, StopReason::Exhausted);
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].pieces.len(), 2);
    }

    #[test]
    fn test_mod_four_exits_before_expanding() {
        let puzzle = line_puzzle(5, 2);
        let mut session = SearchSession::new(puzzle, dfs_settings()).unwrap();
        let (solutions, reason) = run_to_end(&mut session);
        assert_eq!(reason, StopReason::Exhausted);
        assert!(solutions.is_empty());
        assert_eq!(session.prunes.mod_four, 1);
        assert_eq!(session.counters.placements, 0);
    }

    #[test]
    fn test_tail_solver_short_circuits_small_boards() {
        let puzzle = line_puzzle(8, 2);
        let mut session = SearchSession::new(puzzle, SolverSettings::default()).unwrap();
        let (solutions, reason) = run_to_end(&mut session);
        assert_eq!(reason, StopReason::SolutionLimit);
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].pieces.len(), 2);
        assert!(session.counters.dlx_calls >= 1);
    }

    #[test]
    fn test_insufficient_inventory_exhausts() {
        let puzzle = line_puzzle(8, 1);
        let settings = SolverSettings {
            max_solutions: None,
            ..dfs_settings()
        };
        let mut session = SearchSession::new(puzzle, settings).unwrap();
        let (solutions, reason) = run_to_end(&mut session);
        assert_eq!(reason, StopReason::Exhausted);
        assert!(solutions.is_empty());
    }

    #[test]
    fn test_same_settings_replay_identically() {
        let settings = SolverSettings {
            max_solutions: None,
            randomize_ties: true,
            shuffle_pieces: true,
            seed: 1234,
            ..dfs_settings()
        };
        let mut first = SearchSession::new(line_puzzle(12, 3), settings.clone()).unwrap();
        let mut second = SearchSession::new(line_puzzle(12, 3), settings).unwrap();
        let (solutions_a, reason_a) = run_to_end(&mut first);
        let (solutions_b, reason_b) = run_to_end(&mut second);
        assert_eq!(reason_a, reason_b);
        assert_eq!(solutions_a, solutions_b);
        assert_eq!(first.counters.nodes, second.counters.nodes);
        assert_eq!(first.prunes, second.prunes);
    }

    #[test]
    fn test_with_board_searches_the_remainder() {
        let puzzle = line_puzzle(8, 2);
        let mut occupancy = BitBoard::new(8);
        for index in 0..4 {
            occupancy.set(index);
        }
        let mut session =
            SearchSession::with_board(puzzle, dfs_settings(), occupancy, vec![1]).unwrap();
        let (solutions, reason) = run_to_end(&mut session);
        assert_eq!(reason, StopReason::SolutionLimit);
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].pieces.len(), 1);
        assert_eq!(solutions[0].pieces[0].cells, [4, 5, 6, 7]);
    }

    #[test]
    fn test_full_board_at_root_is_a_trivial_solution() {
        let puzzle = line_puzzle(4, 1);
        let mut occupancy = BitBoard::new(4);
        for index in 0..4 {
            occupancy.set(index);
        }
        let mut session =
            SearchSession::with_board(puzzle, dfs_settings(), occupancy, vec![0]).unwrap();
        let (solutions, reason) = run_to_end(&mut session);
        assert_eq!(solutions.len(), 1);
        assert!(solutions[0].pieces.is_empty());
        assert_eq!(reason, StopReason::SolutionLimit);
    }

    #[test]
    fn test_snapshot_round_trip_resumes_the_run() {
        let settings = SolverSettings {
            max_solutions: None,
            ..dfs_settings()
        };
        let mut reference = SearchSession::new(line_puzzle(12, 3), settings.clone()).unwrap();
        let (expected, expected_reason) = run_to_end(&mut reference);

        let mut interrupted = SearchSession::new(line_puzzle(12, 3), settings).unwrap();
        let mut solutions = Vec::new();
        for _ in 0..8 {
            match interrupted.step() {
                StepOutcome::Progress => {}
                StepOutcome::Solution(solution) => solutions.push(solution),
                StepOutcome::Finished(_) => panic!("finished before the snapshot point"),
            }
        }
        let snapshot = interrupted.to_snapshot();
        drop(interrupted);

        let mut resumed = SearchSession::from_snapshot(line_puzzle(12, 3), snapshot).unwrap();
        let (rest, reason) = run_to_end(&mut resumed);
        solutions.extend(rest);

        assert_eq!(reason, expected_reason);
        assert_eq!(solutions, expected);
    }

    #[test]
    fn test_snapshot_rejects_mismatched_puzzle() {
        let mut session = SearchSession::new(line_puzzle(12, 3), dfs_settings()).unwrap();
        let snapshot = session.to_snapshot();
        assert!(SearchSession::from_snapshot(line_puzzle(8, 2), snapshot).is_err());
    }

    #[test]
    fn test_restart_preserves_solutions_and_counters() {
        let settings = SolverSettings {
            max_solutions: None,
            ..dfs_settings()
        };
        let mut session = SearchSession::new(line_puzzle(8, 2), settings).unwrap();
        let mut early = Vec::new();
        for _ in 0..10 {
            if let StepOutcome::Solution(solution) = session.step() {
                early.push(solution);
            }
        }
        let nodes_before = session.counters.nodes;
        session.restart();
        assert_eq!(session.restarts(), 1);
        assert_eq!(session.counters.nodes, nodes_before);
        assert_eq!(session.open_cells(), 8);
        let (late, reason) = run_to_end(&mut session);
        assert_eq!(reason, StopReason::Exhausted);
        // the cover found before the restart is never re-emitted after it
        assert_eq!(early.len() + late.len(), 1);
        assert_eq!(session.counters.solutions, 1);
    }

    #[test]
    fn test_status_reports_current_state() {
        let mut session = SearchSession::new(line_puzzle(8, 2), dfs_settings()).unwrap();
        for _ in 0..5 {
            let _ = session.step();
        }
        let status = session.status(Duration::from_millis(100), Some(3));
        assert_eq!(status.worker, Some(3));
        assert_eq!(status.nodes, session.counters.nodes);
        assert!(status.nodes_per_second > 0.0);
    }
}
