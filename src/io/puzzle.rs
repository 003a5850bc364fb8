//! JSON puzzle descriptions: container cells, pieces, and inventory
//!
//! The file format mirrors what the solver consumes directly: an ordered
//! cell list (input order fixes the bit indices), and per piece an ordered
//! orientation table plus an inventory count. Orientation data is taken as
//! given; candidate compilation decides containment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::geometry::container::Container;
use crate::geometry::lattice::{Cell, Orientation};
use crate::geometry::pieces::{Piece, PieceSet};
use crate::io::error::{Result, SolverError};
use crate::solver::candidates::CompiledPuzzle;

/// One piece entry of a puzzle file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PieceFile {
    /// Display name, unique within the file
    pub name: String,
    /// Number of copies available
    pub inventory: u32,
    /// Ordered orientation table as four-offset lists
    pub orientations: Vec<[Cell; 4]>,
}

/// A complete puzzle description as stored on disk
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PuzzleFile {
    /// Optional id used for logging and snapshot tagging
    #[serde(default)]
    pub id: Option<String>,
    /// Ordered container cells; list order fixes the bit indices
    pub cells: Vec<Cell>,
    /// Available pieces with their inventories
    pub pieces: Vec<PieceFile>,
}

impl PuzzleFile {
    /// Read a puzzle description from a JSON file
    ///
    /// # Errors
    ///
    /// Returns `SolverError::FileSystem` if the file cannot be read, or
    /// `SolverError::Parse` if the contents do not parse.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|source| SolverError::FileSystem {
            path: path.to_path_buf(),
            operation: "read puzzle",
            source,
        })?;
        serde_json::from_str(&json).map_err(|err| SolverError::Parse {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    /// Split the description into solver inputs
    ///
    /// # Errors
    ///
    /// Returns an error if the cell list or any piece fails structural
    /// validation.
    pub fn into_parts(self) -> Result<(Container, PieceSet, Vec<u32>)> {
        let container = Container::new(self.cells, self.id)?;
        let inventory: Vec<u32> = self.pieces.iter().map(|piece| piece.inventory).collect();
        let pieces = self
            .pieces
            .into_iter()
            .map(|piece| Piece {
                name: piece.name,
                orientations: piece
                    .orientations
                    .into_iter()
                    .enumerate()
                    .map(|(index, offsets)| Orientation {
                        id: index as u16,
                        offsets,
                    })
                    .collect(),
            })
            .collect();
        let pieces = PieceSet::new(pieces)?;
        Ok((container, pieces, inventory))
    }

    /// Compile the description straight into a shared puzzle
    ///
    /// # Errors
    ///
    /// Returns an error if validation or candidate compilation fails.
    pub fn compile(self) -> Result<Arc<CompiledPuzzle>> {
        let (container, pieces, inventory) = self.into_parts()?;
        CompiledPuzzle::compile(container, pieces, inventory)
    }

    /// Built-in demo puzzle: a 4x2 parallelogram patch of the lattice
    ///
    /// Covers the grid points `a*[1,1,0] + b*[1,-1,0]` for `a` in 0..4 and
    /// `b` in 0..2, fillable either by two rods or by two squares.
    pub fn demo() -> Self {
        let mut cells = Vec::new();
        for a in 0..4i32 {
            for b in 0..2i32 {
                cells.push([a + b, a - b, 0]);
            }
        }
        Self {
            id: Some("demo-parallelogram".to_string()),
            cells,
            pieces: vec![
                PieceFile {
                    name: "rod".to_string(),
                    inventory: 2,
                    orientations: vec![[[0, 0, 0], [1, 1, 0], [2, 2, 0], [3, 3, 0]]],
                },
                PieceFile {
                    name: "square".to_string(),
                    inventory: 2,
                    orientations: vec![[[0, 0, 0], [1, 1, 0], [1, -1, 0], [2, 0, 0]]],
                },
            ],
        }
    }
}
