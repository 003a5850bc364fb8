//! Pruning predicates and their named failure counters
//!
//! Predicates are evaluated against the child state a candidate would
//! create, in a fixed order: neighbor-touch, color-residue parity,
//! multiple-of-4, connectivity, then the transposition table (the table
//! check lives in the search loop because it needs the incremental hash).
//! All predicates reject only; none can manufacture a solution.

use bitvec::prelude::{BitVec, bitvec};
use serde::{Deserialize, Serialize};

use crate::geometry::container::Container;
use crate::solver::bitboard::BitBoard;
use crate::solver::candidates::Candidate;

/// Per-rule rejection counters, reported with every status event
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneCounters {
    /// Candidate's piece had no remaining inventory
    pub inventory: u64,
    /// Candidate overlapped the occupancy board
    pub overlap: u64,
    /// Candidate did not touch the filled region
    pub neighbor_touch: u64,
    /// Child state left an odd open color class
    pub color_parity: u64,
    /// Child state's open count was not a multiple of four
    pub mod_four: u64,
    /// Child state's open cells split into multiple regions
    pub connectivity: u64,
    /// Child state was recorded unsolvable in the transposition table
    pub table: u64,
}

impl PruneCounters {
    /// Sum of all rejections
    pub const fn total(&self) -> u64 {
        self.inventory
            + self.overlap
            + self.neighbor_touch
            + self.color_parity
            + self.mod_four
            + self.connectivity
            + self.table
    }

    /// Accumulate another counter set into this one
    pub fn merge(&mut self, other: &Self) {
        self.inventory += other.inventory;
        self.overlap += other.overlap;
        self.neighbor_touch += other.neighbor_touch;
        self.color_parity += other.color_parity;
        self.mod_four += other.mod_four;
        self.connectivity += other.connectivity;
        self.table += other.table;
    }
}

/// Reusable buffers for the connectivity BFS
///
/// One scratch set per session keeps the per-candidate check allocation
/// free.
#[derive(Clone, Debug)]
pub struct ConnectivityScratch {
    visited: BitVec,
    queue: Vec<u32>,
}

impl ConnectivityScratch {
    /// Create scratch buffers for a container of `cell_count` cells
    pub fn new(cell_count: usize) -> Self {
        Self {
            visited: bitvec![0; cell_count],
            queue: Vec::with_capacity(cell_count),
        }
    }
}

/// Neighbor-touch predicate
///
/// After the first placement, a new placement must border the filled
/// region. Disabled while the board is empty.
pub fn touches_filled(candidate: &Candidate, occupancy: &BitBoard) -> bool {
    occupancy.is_empty() || candidate.touch_mask.intersects(occupancy)
}

/// Color-residue parity predicate on the child state
///
/// Sound only while every candidate splits the two classes identically,
/// which candidate compilation verifies.
pub const fn colors_even(open_colors_after: [u32; 2]) -> bool {
    open_colors_after[0] % 2 == 0 && open_colors_after[1] % 2 == 0
}

/// Multiple-of-four predicate on the child state
pub const fn open_count_fits_pieces(open_count_after: u32) -> bool {
    open_count_after % 4 == 0
}

/// Connectivity predicate on the child state
///
/// The open cells remaining after `occupancy` and `placed_mask` are both
/// treated as filled must form a single BFS-reachable region. An empty
/// open set passes. Sound but incomplete: a connected open region is no
/// guarantee of coverability.
pub fn open_region_connected(
    container: &Container,
    occupancy: &BitBoard,
    placed_mask: Option<&BitBoard>,
    open_count_after: u32,
    scratch: &mut ConnectivityScratch,
) -> bool {
    if open_count_after == 0 {
        return true;
    }

    let cell_count = container.len() as u32;
    let is_open = |index: u32| {
        !occupancy.get(index) && placed_mask.is_none_or(|mask| !mask.get(index))
    };

    let Some(start) = (0..cell_count).find(|&index| is_open(index)) else {
        return true;
    };

    scratch.visited.fill(false);
    scratch.queue.clear();
    scratch.queue.push(start);
    scratch.visited.set(start as usize, true);
    let mut reached = 1u32;

    while let Some(cell) = scratch.queue.pop() {
        for &neighbor in container.neighbors_of(cell) {
            if is_open(neighbor)
                && !scratch
                    .visited
                    .get(neighbor as usize)
                    .as_deref()
                    .copied()
                    .unwrap_or(true)
            {
                scratch.visited.set(neighbor as usize, true);
                scratch.queue.push(neighbor);
                reached += 1;
            }
        }
    }

    reached == open_count_after
}
