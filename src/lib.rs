//! Exhaustive packing solver for fixed containers on the face-centered cubic lattice
//!
//! Containers are finite cell sets with 12-neighbor adjacency; pieces are rigid
//! 4-cell shapes given as pre-enumerated orientation tables. The solver compiles
//! every legal placement up front, then enumerates exact covers with an
//! iterative bitboard DFS backed by Zobrist-hashed transposition pruning and a
//! dancing-links tail solver for small endgames. Sessions step cooperatively,
//! snapshot mid-run, and race across worker threads.

#![forbid(unsafe_code)]

/// Lattice cells, containers, adjacency, and piece orientation tables
pub mod geometry;
/// Puzzle files, configuration, events, snapshots, and the command line
pub mod io;
/// Candidate compilation, pruning, search, tail solving, and hints
pub mod solver;

pub use io::error::{Result, SolverError};
