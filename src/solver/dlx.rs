//! Exact-cover tail solver over dancing links
//!
//! When the open region is small the remaining problem is a pure exact
//! cover: columns are open cells, rows are candidates that fit the current
//! board, and piece inventory rides along as a side constraint checked at
//! row-selection time. Nodes live in one flat arena indexed by `u32`, so
//! building and discarding a matrix per invocation is cheap and the solver
//! holds no references into the search state.
//!
//! Every invocation carries a link-operation budget. A search that exhausts
//! it reports `Aborted` and the caller falls back to plain DFS; an aborted
//! run proves nothing either way.

use crate::solver::bitboard::BitBoard;
use crate::solver::candidates::CompiledPuzzle;

/// Arena sentinel for the matrix root
const ROOT: u32 = 0;
/// Row marker carried by column headers
const HEADER_ROW: u32 = u32::MAX;

/// Result of a single satisfiability run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DlxOutcome {
    /// A cover exists; candidate ids of the witness rows
    Satisfiable(Vec<u32>),
    /// No cover exists under the current board and inventory
    Unsatisfiable,
    /// The operation budget ran out before a proof either way
    Aborted,
}

/// Result of a capped counting run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoverCount {
    /// The space was exhausted; this is the exact cover count
    Exact(u64),
    /// Counting stopped at the cap; at least this many covers exist
    AtLeast(u64),
    /// The operation budget ran out; the count is a lower bound only
    Aborted(u64),
}

/// Counting result with the first witness found, if any
#[derive(Clone, Debug)]
pub struct CoverReport {
    /// Cover count, exact or truncated
    pub count: CoverCount,
    /// Candidate ids of the first cover found
    pub witness: Option<Vec<u32>>,
}

#[derive(Clone, Copy, Debug, Default)]
struct Node {
    left: u32,
    right: u32,
    up: u32,
    down: u32,
    column: u32,
    row: u32,
}

enum Step {
    Found,
    NotFound,
    Aborted,
}

enum CountStep {
    Continue,
    CapReached,
    Aborted,
}

/// One-shot dancing-links matrix for a fixed board state
struct DlxMatrix {
    nodes: Vec<Node>,
    /// Rows below each column header, indexed by header node
    sizes: Vec<u32>,
    /// Candidate id of each row
    row_candidates: Vec<u32>,
    /// Piece index of each row
    row_pieces: Vec<usize>,
    /// Remaining inventory, decremented while a row is chosen
    piece_left: Vec<u32>,
    ops: u64,
    budget: u64,
}

impl DlxMatrix {
    /// Build the matrix for the open cells of `occupancy`
    fn build(
        puzzle: &CompiledPuzzle,
        occupancy: &BitBoard,
        inventory: &[u32],
        budget: u64,
    ) -> Self {
        let cell_count = puzzle.cell_count();

        // column ordinal per container cell; filled cells get no column
        let mut column_of: Vec<u32> = vec![u32::MAX; cell_count as usize];
        let mut column_count = 0u32;
        for index in 0..cell_count {
            if !occupancy.get(index) {
                if let Some(slot) = column_of.get_mut(index as usize) {
                    *slot = column_count;
                }
                column_count += 1;
            }
        }

        // root and circular header list
        let mut nodes: Vec<Node> = Vec::with_capacity(1 + column_count as usize);
        nodes.push(Node {
            left: column_count,
            right: if column_count == 0 { ROOT } else { 1 },
            up: ROOT,
            down: ROOT,
            column: ROOT,
            row: HEADER_ROW,
        });
        for header in 1..=column_count {
            nodes.push(Node {
                left: header - 1,
                right: if header == column_count { ROOT } else { header + 1 },
                up: header,
                down: header,
                column: header,
                row: HEADER_ROW,
            });
        }
        let sizes = vec![0u32; nodes.len()];

        let mut matrix = Self {
            nodes,
            sizes,
            row_candidates: Vec::new(),
            row_pieces: Vec::new(),
            piece_left: inventory.to_vec(),
            ops: 0,
            budget,
        };

        for (candidate_id, candidate) in puzzle.candidates.iter().enumerate() {
            if matrix.piece_left.get(candidate.piece).copied().unwrap_or(0) == 0 {
                continue;
            }
            if candidate.mask.intersects(occupancy) {
                continue;
            }
            let row = matrix.row_candidates.len() as u32;
            matrix.row_candidates.push(candidate_id as u32);
            matrix.row_pieces.push(candidate.piece);

            let first = matrix.nodes.len() as u32;
            for (slot, &cell) in candidate.cells.iter().enumerate() {
                let header = column_of[cell as usize] + 1;
                let node_index = first + slot as u32;
                let above = matrix.nodes[header as usize].up;
                matrix.nodes.push(Node {
                    left: if slot == 0 { first + 3 } else { node_index - 1 },
                    right: if slot == 3 { first } else { node_index + 1 },
                    up: above,
                    down: header,
                    column: header,
                    row,
                });
                matrix.nodes[above as usize].down = node_index;
                matrix.nodes[header as usize].up = node_index;
                matrix.sizes.push(0);
                matrix.sizes[header as usize] += 1;
            }
        }

        matrix
    }

    const fn over_budget(&self) -> bool {
        self.ops > self.budget
    }

    /// Column with the fewest rows, or `None` when the matrix is empty
    fn pick_column(&self) -> Option<u32> {
        let mut best: Option<u32> = None;
        let mut best_size = u32::MAX;
        let mut header = self.nodes[ROOT as usize].right;
        while header != ROOT {
            let size = self.sizes[header as usize];
            if size < best_size {
                best_size = size;
                best = Some(header);
            }
            header = self.nodes[header as usize].right;
        }
        best
    }

    fn cover(&mut self, header: u32) {
        let (left, right) = {
            let node = self.nodes[header as usize];
            (node.left, node.right)
        };
        self.nodes[left as usize].right = right;
        self.nodes[right as usize].left = left;

        let mut row_node = self.nodes[header as usize].down;
        while row_node != header {
            let mut peer = self.nodes[row_node as usize].right;
            while peer != row_node {
                let node = self.nodes[peer as usize];
                self.nodes[node.up as usize].down = node.down;
                self.nodes[node.down as usize].up = node.up;
                self.sizes[node.column as usize] -= 1;
                self.ops += 1;
                peer = node.right;
            }
            row_node = self.nodes[row_node as usize].down;
        }
    }

    fn uncover(&mut self, header: u32) {
        let mut row_node = self.nodes[header as usize].up;
        while row_node != header {
            let mut peer = self.nodes[row_node as usize].left;
            while peer != row_node {
                let node = self.nodes[peer as usize];
                self.nodes[node.up as usize].down = peer;
                self.nodes[node.down as usize].up = peer;
                self.sizes[node.column as usize] += 1;
                self.ops += 1;
                peer = node.left;
            }
            row_node = self.nodes[row_node as usize].up;
        }
        let (left, right) = {
            let node = self.nodes[header as usize];
            (node.left, node.right)
        };
        self.nodes[left as usize].right = header;
        self.nodes[right as usize].left = header;
    }

    fn cover_row_peers(&mut self, row_node: u32) {
        let mut peer = self.nodes[row_node as usize].right;
        while peer != row_node {
            self.cover(self.nodes[peer as usize].column);
            peer = self.nodes[peer as usize].right;
        }
    }

    fn uncover_row_peers(&mut self, row_node: u32) {
        let mut peer = self.nodes[row_node as usize].left;
        while peer != row_node {
            self.uncover(self.nodes[peer as usize].column);
            peer = self.nodes[peer as usize].left;
        }
    }

    fn solve(&mut self, chosen: &mut Vec<u32>) -> Step {
        if self.over_budget() {
            return Step::Aborted;
        }
        let Some(header) = self.pick_column() else {
            return Step::Found;
        };
        if self.sizes[header as usize] == 0 {
            return Step::NotFound;
        }

        self.cover(header);
        let mut outcome = Step::NotFound;
        let mut row_node = self.nodes[header as usize].down;
        while row_node != header {
            let row = self.nodes[row_node as usize].row;
            let piece = self.row_pieces[row as usize];
            if self.piece_left[piece] > 0 {
                self.piece_left[piece] -= 1;
                chosen.push(row);
                self.cover_row_peers(row_node);
                let step = self.solve(chosen);
                self.uncover_row_peers(row_node);
                self.piece_left[piece] += 1;
                match step {
                    Step::Found => {
                        outcome = Step::Found;
                        break;
                    }
                    Step::Aborted => {
                        chosen.pop();
                        outcome = Step::Aborted;
                        break;
                    }
                    Step::NotFound => {
                        chosen.pop();
                    }
                }
            }
            if self.over_budget() {
                outcome = Step::Aborted;
                break;
            }
            row_node = self.nodes[row_node as usize].down;
        }
        self.uncover(header);
        outcome
    }

    fn count(
        &mut self,
        chosen: &mut Vec<u32>,
        cap: u64,
        found: &mut u64,
        witness: &mut Option<Vec<u32>>,
    ) -> CountStep {
        if self.over_budget() {
            return CountStep::Aborted;
        }
        let Some(header) = self.pick_column() else {
            *found += 1;
            if witness.is_none() {
                *witness = Some(self.rows_to_candidates(chosen));
            }
            return if *found >= cap {
                CountStep::CapReached
            } else {
                CountStep::Continue
            };
        };
        if self.sizes[header as usize] == 0 {
            return CountStep::Continue;
        }

        self.cover(header);
        let mut outcome = CountStep::Continue;
        let mut row_node = self.nodes[header as usize].down;
        while row_node != header {
            let row = self.nodes[row_node as usize].row;
            let piece = self.row_pieces[row as usize];
            if self.piece_left[piece] > 0 {
                self.piece_left[piece] -= 1;
                chosen.push(row);
                self.cover_row_peers(row_node);
                let step = self.count(chosen, cap, found, witness);
                self.uncover_row_peers(row_node);
                self.piece_left[piece] += 1;
                chosen.pop();
                match step {
                    CountStep::Continue => {}
                    CountStep::CapReached => {
                        outcome = CountStep::CapReached;
                        break;
                    }
                    CountStep::Aborted => {
                        outcome = CountStep::Aborted;
                        break;
                    }
                }
            }
            if self.over_budget() {
                outcome = CountStep::Aborted;
                break;
            }
            row_node = self.nodes[row_node as usize].down;
        }
        self.uncover(header);
        outcome
    }

    fn rows_to_candidates(&self, rows: &[u32]) -> Vec<u32> {
        rows.iter()
            .filter_map(|&row| self.row_candidates.get(row as usize).copied())
            .collect()
    }
}

/// Decide satisfiability of the remaining open region
///
/// `inventory` is the remaining per-piece count at the current search node.
/// Returns the witness rows as candidate ids on success; the order follows
/// the cover, not the container.
pub fn solve_tail(
    puzzle: &CompiledPuzzle,
    occupancy: &BitBoard,
    inventory: &[u32],
    budget: u64,
) -> DlxOutcome {
    let mut matrix = DlxMatrix::build(puzzle, occupancy, inventory, budget);
    let mut chosen: Vec<u32> = Vec::new();
    match matrix.solve(&mut chosen) {
        Step::Found => DlxOutcome::Satisfiable(matrix.rows_to_candidates(&chosen)),
        Step::NotFound => DlxOutcome::Unsatisfiable,
        Step::Aborted => DlxOutcome::Aborted,
    }
}

/// Count covers of the remaining open region, stopping at `cap`
///
/// Used by the hint engine, which needs "solvable, and roughly how
/// constrained" rather than a full enumeration.
pub fn count_covers(
    puzzle: &CompiledPuzzle,
    occupancy: &BitBoard,
    inventory: &[u32],
    cap: u64,
    budget: u64,
) -> CoverReport {
    let mut matrix = DlxMatrix::build(puzzle, occupancy, inventory, budget);
    let mut chosen: Vec<u32> = Vec::new();
    let mut found = 0u64;
    let mut witness: Option<Vec<u32>> = None;
    let count = if cap == 0 {
        CoverCount::AtLeast(0)
    } else {
        match matrix.count(&mut chosen, cap, &mut found, &mut witness) {
            CountStep::Continue => CoverCount::Exact(found),
            CountStep::CapReached => CoverCount::AtLeast(found),
            CountStep::Aborted => CoverCount::Aborted(found),
        }
    };
    CoverReport { count, witness }
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

    fn line_container(count: i32) -> Container {
        let cells: Vec<Cell> = (0..count).map(|k| [k, k, 0]).collect();
        Container::new(cells, None).unwrap()
    }

    fn line_puzzle(count: i32, inventory: Vec<u32>) -> std::sync::Arc<CompiledPuzzle> {
        let pieces = PieceSet::new(vec![rod_piece()]).unwrap();
        CompiledPuzzle::compile(line_container(count), pieces, inventory).unwrap()
    }

    #[test]
    fn test_exact_fit_is_satisfiable() {
        let puzzle = line_puzzle(4, vec![1]);
        let empty = BitBoard::new(4);
        match solve_tail(&puzzle, &empty, &[1], 1_000) {
            DlxOutcome::Satisfiable(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(puzzle.candidate(rows[0]).unwrap().cells, [0, 1, 2, 3]);
            }
            other => panic!("expected a witness, got {other:?}"),
        }
    }

    #[test]
    fn test_double_line_needs_two_rods() {
        let puzzle = line_puzzle(8, vec![2]);
        let empty = BitBoard::new(8);
        match solve_tail(&puzzle, &empty, &[2], 10_000) {
            DlxOutcome::Satisfiable(rows) => assert_eq!(rows.len(), 2),
            other => panic!("expected a witness, got {other:?}"),
        }
        // with only one rod left the inventory side constraint refutes it
        assert_eq!(
            solve_tail(&puzzle, &empty, &[1], 10_000),
            DlxOutcome::Unsatisfiable
        );
    }

    #[test]
    fn test_partially_filled_board_restricts_rows() {
        let puzzle = line_puzzle(8, vec![2]);
        let mut occupancy = BitBoard::new(8);
        for index in 0..4 {
            occupancy.set(index);
        }
        match solve_tail(&puzzle, &occupancy, &[1], 10_000) {
            DlxOutcome::Satisfiable(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(puzzle.candidate(rows[0]).unwrap().cells, [4, 5, 6, 7]);
            }
            other => panic!("expected a witness, got {other:?}"),
        }
    }

    #[test]
    fn test_misaligned_fill_is_unsatisfiable() {
        let puzzle = line_puzzle(8, vec![2]);
        let mut occupancy = BitBoard::new(8);
        // filling cells 2..=5 leaves two 2-cell fragments
        for index in 2..6 {
            occupancy.set(index);
        }
        assert_eq!(
            solve_tail(&puzzle, &occupancy, &[1], 10_000),
            DlxOutcome::Unsatisfiable
        );
    }

    #[test]
    fn test_zero_budget_aborts() {
        let puzzle = line_puzzle(8, vec![2]);
        let empty = BitBoard::new(8);
        assert_eq!(solve_tail(&puzzle, &empty, &[2], 0), DlxOutcome::Aborted);
    }

    #[test]
    fn test_full_board_is_trivially_satisfiable() {
        let puzzle = line_puzzle(4, vec![1]);
        let mut occupancy = BitBoard::new(4);
        for index in 0..4 {
            occupancy.set(index);
        }
        match solve_tail(&puzzle, &occupancy, &[0], 1_000) {
            DlxOutcome::Satisfiable(rows) => assert!(rows.is_empty()),
            other => panic!("expected the empty cover, got {other:?}"),
        }
    }

    #[test]
    fn test_count_is_exact_on_small_spaces() {
        // a 12-cell line with 3 rods covers exactly one way
        let puzzle = line_puzzle(12, vec![3]);
        let empty = BitBoard::new(12);
        let report = count_covers(&puzzle, &empty, &[3], 16, 100_000);
        assert_eq!(report.count, CoverCount::Exact(1));
        assert_eq!(report.witness.map(|rows| rows.len()), Some(3));
    }

    #[test]
    fn test_count_stops_at_cap() {
        let puzzle = line_puzzle(4, vec![1]);
        let empty = BitBoard::new(4);
        let report = count_covers(&puzzle, &empty, &[1], 1, 100_000);
        assert_eq!(report.count, CoverCount::AtLeast(1));
        assert!(report.witness.is_some());
    }

    #[test]
    fn test_count_zero_when_unsatisfiable() {
        let puzzle = line_puzzle(6, vec![2]);
        let empty = BitBoard::new(6);
        let report = count_covers(&puzzle, &empty, &[2], 16, 100_000);
        assert_eq!(report.count, CoverCount::Exact(0));
        assert!(report.witness.is_none());
    }
}
