//! Container indexing and flat adjacency arena
//!
//! Binds every container cell to a stable bit index and precomputes the
//! 12-direction neighbor graph as flat index arrays. Adjacency is fixed-once
//! data, so it is stored arena-style (span table plus one contiguous
//! neighbor list) rather than as a pointer graph.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::geometry::lattice::{self, Cell};
use crate::io::error::{Result, invalid_geometry};

/// An ordered set of lattice cells with stable bit indices
///
/// Cell `i` of the input list is bound to bit index `i` for the lifetime of
/// the run. The optional id is used only for logging and snapshot tagging.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Container {
    id: Option<String>,
    cells: Vec<Cell>,
    #[serde(skip)]
    index_of: FxHashMap<Cell, u32>,
    /// Per-cell (start, end) spans into `neighbors`
    neighbor_spans: Vec<(u32, u32)>,
    /// Concatenated neighbor index lists
    neighbors: Vec<u32>,
    /// Number of cells in each parity color class
    color_totals: [u32; 2],
}

impl Container {
    /// Create a container from an ordered cell list
    ///
    /// # Errors
    ///
    /// Returns `SolverError::InvalidGeometry` if the list contains
    /// duplicate cells or is empty.
    pub fn new(cells: Vec<Cell>, id: Option<String>) -> Result<Self> {
        if cells.is_empty() {
            return Err(invalid_geometry(&"container has no cells"));
        }

        let mut index_of = FxHashMap::default();
        for (index, &cell) in cells.iter().enumerate() {
            if index_of.insert(cell, index as u32).is_some() {
                return Err(invalid_geometry(&format!(
                    "duplicate container cell {cell:?}"
                )));
            }
        }

        let mut neighbor_spans = Vec::with_capacity(cells.len());
        let mut neighbors = Vec::new();
        let mut color_totals = [0u32; 2];

        for &cell in &cells {
            let start = neighbors.len() as u32;
            for direction in lattice::FCC_DIRECTIONS {
                let adjacent = lattice::translate(cell, direction);
                if let Some(&index) = index_of.get(&adjacent) {
                    neighbors.push(index);
                }
            }
            neighbor_spans.push((start, neighbors.len() as u32));

            if let Some(total) = color_totals.get_mut(lattice::color_of(cell)) {
                *total += 1;
            }
        }

        Ok(Self {
            id,
            cells,
            index_of,
            neighbor_spans,
            neighbors,
            color_totals,
        })
    }

    /// Number of cells in the container
    pub const fn len(&self) -> usize {
        self.cells.len()
    }

    /// Test whether the container holds no cells
    pub const fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Optional container id for logging and snapshot tagging
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Ordered cell list
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Cell bound to a bit index
    pub fn cell(&self, index: u32) -> Option<Cell> {
        self.cells.get(index as usize).copied()
    }

    /// Bit index of a cell, if it belongs to the container
    pub fn index_of(&self, cell: Cell) -> Option<u32> {
        self.index_of.get(&cell).copied()
    }

    /// Neighbor bit indices of a cell
    pub fn neighbors_of(&self, index: u32) -> &[u32] {
        self.neighbor_spans
            .get(index as usize)
            .and_then(|&(start, end)| self.neighbors.get(start as usize..end as usize))
            .unwrap_or(&[])
    }

    /// Parity color class of an indexed cell
    pub fn color_of(&self, index: u32) -> usize {
        self.cell(index).map_or(0, lattice::color_of)
    }

    /// Number of cells in each parity color class
    pub const fn color_totals(&self) -> [u32; 2] {
        self.color_totals
    }

    /// Rebuild the cell lookup map after deserialization
    ///
    /// The map is derivable from the cell list, so it is skipped during
    /// serialization and restored here.
    pub fn rebuild_index(&mut self) {
        self.index_of = self
            .cells
            .iter()
            .enumerate()
            .map(|(index, &cell)| (cell, index as u32))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(count: i32) -> Vec<Cell> {
        (0..count).map(|k| [k, k, 0]).collect()
    }

    #[test]
    fn test_indices_follow_input_order() {
        let container = Container::new(line(4), None).unwrap();
        assert_eq!(container.len(), 4);
        assert_eq!(container.index_of([2, 2, 0]), Some(2));
        assert_eq!(container.cell(3), Some([3, 3, 0]));
    }

    #[test]
    fn test_duplicate_cells_are_rejected() {
        let mut cells = line(3);
        cells.push([1, 1, 0]);
        assert!(Container::new(cells, None).is_err());
    }

    #[test]
    fn test_line_adjacency() {
        let container = Container::new(line(3), None).unwrap();
        assert_eq!(container.neighbors_of(0), &[1]);
        let mut middle = container.neighbors_of(1).to_vec();
        middle.sort_unstable();
        assert_eq!(middle, vec![0, 2]);
    }

    #[test]
    fn test_non_adjacent_cells_have_no_edge() {
        // [0,0,0] and [2,0,0] differ by a non-lattice offset
        let container = Container::new(vec![[0, 0, 0], [2, 0, 0]], None).unwrap();
        assert!(container.neighbors_of(0).is_empty());
        assert!(container.neighbors_of(1).is_empty());
    }

    #[test]
    fn test_color_totals_cover_container() {
        let container = Container::new(line(5), None).unwrap();
        let totals = container.color_totals();
        assert_eq!(totals[0] + totals[1], 5);
    }
}
