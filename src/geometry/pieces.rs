//! Piece definitions and the opaque orientation table
//!
//! Orientation data comes from an external, pre-validated provider. The
//! solver treats it as a read-only table: ordered pieces, each with an
//! ordered list of four-offset orientations. Nothing here is validated
//! beyond structural checks; containment is decided during candidate
//! compilation.

use serde::{Deserialize, Serialize};

use crate::geometry::lattice::Orientation;
use crate::io::error::{Result, invalid_parameter};

/// A rigid 4-cell piece with its pre-supplied rotational variants
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Piece {
    /// Display name, unique within the set
    pub name: String,
    /// Ordered orientation table
    pub orientations: Vec<Orientation>,
}

/// The ordered collection of pieces available to a run
///
/// Piece index within the set is the piece id used everywhere downstream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PieceSet {
    pieces: Vec<Piece>,
}

impl PieceSet {
    /// Create a piece set from an ordered piece list
    ///
    /// # Errors
    ///
    /// Returns `SolverError::InvalidParameter` if the list is empty or any
    /// piece carries an empty orientation table.
    pub fn new(pieces: Vec<Piece>) -> Result<Self> {
        if pieces.is_empty() {
            return Err(invalid_parameter(
                "pieces",
                &"[]",
                &"at least one piece is required",
            ));
        }
        for piece in &pieces {
            if piece.orientations.is_empty() {
                return Err(invalid_parameter(
                    "pieces",
                    &piece.name,
                    &"piece has no orientations",
                ));
            }
        }
        Ok(Self { pieces })
    }

    /// Number of pieces in the set
    pub const fn len(&self) -> usize {
        self.pieces.len()
    }

    /// Test whether the set holds no pieces
    pub const fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Piece by index
    pub fn piece(&self, index: usize) -> Option<&Piece> {
        self.pieces.get(index)
    }

    /// Display name of a piece, or a placeholder for unknown indices
    pub fn name_of(&self, index: usize) -> &str {
        self.piece(index).map_or("<unknown>", |piece| &piece.name)
    }

    /// Ordered piece list
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rod() -> Piece {
        Piece {
            name: "rod".to_string(),
            orientations: vec![Orientation {
                id: 0,
                offsets: [[0, 0, 0], [1, 1, 0], [2, 2, 0], [3, 3, 0]],
            }],
        }
    }

    #[test]
    fn test_empty_set_is_rejected() {
        assert!(PieceSet::new(Vec::new()).is_err());
    }

    #[test]
    fn test_piece_without_orientations_is_rejected() {
        let bare = Piece {
            name: "bare".to_string(),
            orientations: Vec::new(),
        };
        assert!(PieceSet::new(vec![bare]).is_err());
    }

    #[test]
    fn test_index_is_piece_id() {
        let set = PieceSet::new(vec![rod()]).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.name_of(0), "rod");
        assert_eq!(set.name_of(7), "<unknown>");
    }
}
