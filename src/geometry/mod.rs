//! Lattice geometry: cells, containers, adjacency, and piece tables

/// Container indexing and the flat adjacency arena
pub mod container;
/// FCC lattice primitives and orientation data
pub mod lattice;
/// Piece and orientation table types
pub mod pieces;

pub use container::Container;
pub use lattice::{CELLS_PER_PIECE, Cell, FCC_DIRECTIONS, Orientation, OrientationId};
pub use pieces::{Piece, PieceSet};
