//! Candidate placement compilation
//!
//! Enumerates every valid (piece, orientation, translation) placement as a
//! deduplicated bitmask embedding, bucketed by covered cell. Placements
//! reaching outside the container are dropped silently. Compilation is
//! deterministic: pieces, orientations, anchor offsets, and target cells
//! are iterated in stable input order, so downstream heuristics see a
//! reproducible candidate ordering.

use rustc_hash::FxHashSet;
use std::sync::Arc;

use crate::geometry::container::Container;
use crate::geometry::lattice::{self, Cell, OrientationId};
use crate::geometry::pieces::PieceSet;
use crate::io::error::{Result, capacity_exceeded, invalid_parameter};
use crate::io::settings::MAX_CANDIDATES;
use crate::solver::bitboard::BitBoard;
use crate::solver::zobrist::ZobristKeys;

/// One concrete placement of a piece in the container
#[derive(Clone, Debug)]
pub struct Candidate {
    /// Piece index within the set
    pub piece: usize,
    /// Orientation id within the piece's table
    pub orientation: OrientationId,
    /// Translation applied to the orientation offsets
    pub translation: Cell,
    /// Covered cells as a bitmask
    pub mask: BitBoard,
    /// Cells adjacent to the placement but not covered by it
    ///
    /// Intersecting this with the occupancy board answers the
    /// neighbor-touch predicate in O(blocks).
    pub touch_mask: BitBoard,
    /// Covered cell indices in ascending order
    pub cells: [u32; 4],
    /// Lowest covered cell index
    pub min_cell: u32,
    /// Covered cells per parity color class
    pub color_counts: [u8; 2],
}

/// Immutable compiled form of one puzzle
///
/// Built once per run and shared read-only across workers; all mutable
/// search state lives in the sessions that borrow this.
#[derive(Debug)]
pub struct CompiledPuzzle {
    /// Container geometry and adjacency
    pub container: Container,
    /// Piece and orientation tables
    pub pieces: PieceSet,
    /// Remaining-count inventory the run starts from, indexed by piece
    pub initial_inventory: Vec<u32>,
    /// Deduplicated candidate embeddings
    pub candidates: Vec<Candidate>,
    /// Candidate ids covering each cell, in compilation order
    pub by_cell: Vec<Vec<u32>>,
    /// State hashing keys shared by every session over this puzzle
    pub zobrist: ZobristKeys,
    /// Whether every candidate splits the color classes 2/2
    ///
    /// The color-residue prune is only sound under a uniform split, so it
    /// stays disarmed when compilation disproves the property.
    pub parity_uniform: bool,
}

impl CompiledPuzzle {
    /// Compile candidates for a container, piece set, and inventory
    ///
    /// Pieces with zero inventory are skipped entirely, which doubles as
    /// the piece allow-list.
    ///
    /// # Errors
    ///
    /// Returns an error if the inventory length does not match the piece
    /// set, or if the deduplicated candidate count exceeds the memory
    /// budget.
    pub fn compile(container: Container, pieces: PieceSet, inventory: Vec<u32>) -> Result<Arc<Self>> {
        if inventory.len() != pieces.len() {
            return Err(invalid_parameter(
                "inventory",
                &inventory.len(),
                &format!("must list one count per piece ({} pieces)", pieces.len()),
            ));
        }

        let cell_count = container.len() as u32;
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut dedup: FxHashSet<(usize, [u32; 4])> = FxHashSet::default();

        for (piece_index, piece) in pieces.pieces().iter().enumerate() {
            if inventory.get(piece_index).copied().unwrap_or(0) == 0 {
                continue;
            }
            for orientation in &piece.orientations {
                for &anchor in &orientation.offsets {
                    for target in container.cells() {
                        let translation = lattice::offset_between(anchor, *target);
                        let Some(cells) =
                            resolve_cells(&container, &orientation.offsets, translation)
                        else {
                            continue;
                        };
                        if !dedup.insert((piece_index, cells)) {
                            continue;
                        }
                        if candidates.len() >= MAX_CANDIDATES {
                            return Err(capacity_exceeded(
                                "candidate table",
                                candidates.len() + 1,
                                MAX_CANDIDATES,
                            ));
                        }
                        candidates.push(build_candidate(
                            &container,
                            piece_index,
                            orientation.id,
                            translation,
                            cells,
                            cell_count,
                        ));
                    }
                }
            }
        }

        let mut by_cell: Vec<Vec<u32>> = vec![Vec::new(); container.len()];
        for (candidate_id, candidate) in candidates.iter().enumerate() {
            for &cell in &candidate.cells {
                if let Some(bucket) = by_cell.get_mut(cell as usize) {
                    bucket.push(candidate_id as u32);
                }
            }
        }

        let parity_uniform = candidates
            .iter()
            .all(|candidate| candidate.color_counts == [2, 2]);

        let zobrist = ZobristKeys::generate(container.len(), pieces.len());

        Ok(Arc::new(Self {
            container,
            pieces,
            initial_inventory: inventory,
            candidates,
            by_cell,
            zobrist,
            parity_uniform,
        }))
    }

    /// Number of container cells
    pub const fn cell_count(&self) -> u32 {
        self.container.len() as u32
    }

    /// Candidate by id
    pub fn candidate(&self, id: u32) -> Option<&Candidate> {
        self.candidates.get(id as usize)
    }

    /// Candidate ids covering a cell
    pub fn candidates_at(&self, cell: u32) -> &[u32] {
        self.by_cell.get(cell as usize).map_or(&[], Vec::as_slice)
    }
}

/// Map orientation offsets under a translation to sorted container indices
///
/// Returns `None` as soon as any covered cell falls outside the container.
fn resolve_cells(
    container: &Container,
    offsets: &[Cell; 4],
    translation: Cell,
) -> Option<[u32; 4]> {
    let mut cells = [0u32; 4];
    for (slot, &offset) in cells.iter_mut().zip(offsets) {
        *slot = container.index_of(lattice::translate(offset, translation))?;
    }
    cells.sort_unstable();
    // degenerate orientations with repeated offsets collapse to fewer cells
    if cells.windows(2).any(|pair| pair[0] == pair[1]) {
        return None;
    }
    Some(cells)
}

fn build_candidate(
    container: &Container,
    piece: usize,
    orientation: OrientationId,
    translation: Cell,
    cells: [u32; 4],
    cell_count: u32,
) -> Candidate {
    let mut mask = BitBoard::new(cell_count);
    let mut touch_mask = BitBoard::new(cell_count);
    let mut color_counts = [0u8; 2];

    for &cell in &cells {
        mask.set(cell);
        if let Some(count) = color_counts.get_mut(container.color_of(cell)) {
            *count += 1;
        }
        for &neighbor in container.neighbors_of(cell) {
            touch_mask.set(neighbor);
        }
    }
    touch_mask.subtract(&mask);

    Candidate {
        piece,
        orientation,
        translation,
        mask,
        touch_mask,
        cells,
        min_cell: cells[0],
        color_counts,
    }
}
