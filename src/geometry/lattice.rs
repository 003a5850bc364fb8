//! Face-centered-cubic lattice primitives
//!
//! Cells are integer triples. Two cells are nearest neighbors when their
//! difference is one of the twelve permutations of (±1, ±1, 0), giving the
//! 12-direction adjacency used by pyramid-style packing puzzles.

use serde::{Deserialize, Serialize};

/// A lattice cell as an integer coordinate triple
pub type Cell = [i32; 3];

/// Number of cells covered by every piece
pub const CELLS_PER_PIECE: usize = 4;

/// The twelve nearest-neighbor offsets of the FCC lattice
pub const FCC_DIRECTIONS: [Cell; 12] = [
    [1, 1, 0],
    [1, -1, 0],
    [-1, 1, 0],
    [-1, -1, 0],
    [1, 0, 1],
    [1, 0, -1],
    [-1, 0, 1],
    [-1, 0, -1],
    [0, 1, 1],
    [0, 1, -1],
    [0, -1, 1],
    [0, -1, -1],
];

/// Translate a cell by an offset
pub const fn translate(cell: Cell, offset: Cell) -> Cell {
    [
        cell[0] + offset[0],
        cell[1] + offset[1],
        cell[2] + offset[2],
    ]
}

/// Offset that maps `from` onto `to`
pub const fn offset_between(from: Cell, to: Cell) -> Cell {
    [to[0] - from[0], to[1] - from[1], to[2] - from[2]]
}

/// Coordinate-parity color class of a cell
///
/// Partitions the lattice into two classes used by the color-residue prune.
/// The partition is only exploited when candidate compilation verifies that
/// every placement splits the classes identically.
pub const fn color_of(cell: Cell) -> usize {
    ((cell[0] + cell[1]).rem_euclid(2)) as usize
}

/// Test whether an offset is one of the twelve lattice directions
pub fn is_lattice_direction(offset: Cell) -> bool {
    FCC_DIRECTIONS.contains(&offset)
}

/// Orientation identifier within a piece's orientation table
pub type OrientationId = u16;

/// One rotational variant of a piece: exactly four relative cell offsets
///
/// Orientation tables are supplied by an external, pre-validated source;
/// the solver only checks containment when compiling placements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orientation {
    /// Stable orientation id within the owning piece
    pub id: OrientationId,
    /// Relative offsets of the four covered cells
    pub offsets: [Cell; 4],
}
