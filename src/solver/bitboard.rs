//! Chunked bit-vector for occupancy and placement masks
//!
//! The hot path of the search works entirely on 64-bit word vectors:
//! collision checks are word-wise AND, placement is word-wise OR, undo is
//! AND-NOT. Word storage also makes snapshots trivially serializable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed-length bit set stored as 64-bit blocks
///
/// Bit `i` corresponds to container cell index `i`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitBoard {
    blocks: Vec<u64>,
    len: u32,
}

impl BitBoard {
    /// Create an empty board over `len` cells
    pub fn new(len: u32) -> Self {
        let block_count = (len as usize).div_ceil(64);
        Self {
            blocks: vec![0; block_count],
            len,
        }
    }

    /// Number of addressable bits
    pub const fn len(&self) -> u32 {
        self.len
    }

    /// Test whether no bit is set
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|&block| block == 0)
    }

    /// Test whether every addressable bit is set
    pub fn is_full(&self) -> bool {
        self.count_ones() == self.len
    }

    /// Number of set bits
    pub fn count_ones(&self) -> u32 {
        self.blocks.iter().map(|block| block.count_ones()).sum()
    }

    /// Set one bit
    pub fn set(&mut self, index: u32) {
        debug_assert!(index < self.len, "bit index out of bounds");
        if let Some(block) = self.blocks.get_mut((index / 64) as usize) {
            *block |= 1 << (index % 64);
        }
    }

    /// Clear one bit
    pub fn unset(&mut self, index: u32) {
        debug_assert!(index < self.len, "bit index out of bounds");
        if let Some(block) = self.blocks.get_mut((index / 64) as usize) {
            *block &= !(1 << (index % 64));
        }
    }

    /// Test one bit
    pub fn get(&self, index: u32) -> bool {
        self.blocks
            .get((index / 64) as usize)
            .is_some_and(|block| block & (1 << (index % 64)) != 0)
    }

    /// Clear every bit
    pub fn clear(&mut self) {
        self.blocks.fill(0);
    }

    /// Test whether any bit is set in both boards
    pub fn intersects(&self, other: &Self) -> bool {
        self.blocks
            .iter()
            .zip(&other.blocks)
            .any(|(a, b)| a & b != 0)
    }

    /// OR every bit of `other` into this board
    pub fn union_with(&mut self, other: &Self) {
        for (block, &mask) in self.blocks.iter_mut().zip(&other.blocks) {
            *block |= mask;
        }
    }

    /// Clear every bit that is set in `other`
    pub fn subtract(&mut self, other: &Self) {
        for (block, &mask) in self.blocks.iter_mut().zip(&other.blocks) {
            *block &= !mask;
        }
    }

    /// Index of the lowest clear bit, if any
    pub fn first_zero(&self) -> Option<u32> {
        for (block_index, &block) in self.blocks.iter().enumerate() {
            if block != u64::MAX {
                let bit = (block_index as u32) * 64 + (!block).trailing_zeros();
                if bit < self.len {
                    return Some(bit);
                }
            }
        }
        None
    }

    /// Iterate over set bit indices in ascending order
    pub fn ones(&self) -> Ones<'_> {
        Ones {
            blocks: &self.blocks,
            block_index: 0,
            current: self.blocks.first().copied().unwrap_or(0),
        }
    }

    /// Raw 64-bit blocks, lowest bits first
    pub fn blocks(&self) -> &[u64] {
        &self.blocks
    }

    /// Rebuild a board from raw blocks
    ///
    /// Returns `None` if the block count does not match `len` or any bit at
    /// or above `len` is set.
    pub fn from_blocks(blocks: Vec<u64>, len: u32) -> Option<Self> {
        if blocks.len() != (len as usize).div_ceil(64) {
            return None;
        }
        let tail_bits = len % 64;
        if tail_bits != 0 && blocks.last().is_some_and(|&block| block >> tail_bits != 0) {
            return None;
        }
        Some(Self { blocks, len })
    }
}

impl fmt::Debug for BitBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitBoard({} of {} set)", self.count_ones(), self.len)
    }
}

/// Iterator over set bit indices of a [`BitBoard`]
pub struct Ones<'a> {
    blocks: &'a [u64],
    block_index: usize,
    current: u64,
}

impl Iterator for Ones<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        while self.current == 0 {
            self.block_index += 1;
            self.current = *self.blocks.get(self.block_index)?;
        }
        let bit = self.current.trailing_zeros();
        // clear the lowest set bit
        self.current &= self.current - 1;
        Some((self.block_index as u32) * 64 + bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_unset() {
        let mut board = BitBoard::new(130);
        board.set(0);
        board.set(64);
        board.set(129);
        assert!(board.get(0) && board.get(64) && board.get(129));
        assert_eq!(board.count_ones(), 3);
        board.unset(64);
        assert!(!board.get(64));
        assert_eq!(board.count_ones(), 2);
    }

    #[test]
    fn test_union_and_subtract_are_inverse() {
        let mut board = BitBoard::new(100);
        board.set(5);

        let mut mask = BitBoard::new(100);
        mask.set(70);
        mask.set(99);

        let before = board.clone();
        board.union_with(&mask);
        assert!(board.get(70) && board.get(99));
        board.subtract(&mask);
        assert_eq!(board, before);
    }

    #[test]
    fn test_intersects() {
        let mut a = BitBoard::new(80);
        let mut b = BitBoard::new(80);
        a.set(79);
        assert!(!a.intersects(&b));
        b.set(79);
        assert!(a.intersects(&b));
    }

    #[test]
    fn test_first_zero_skips_full_blocks() {
        let mut board = BitBoard::new(70);
        for index in 0..66 {
            board.set(index);
        }
        assert_eq!(board.first_zero(), Some(66));
        for index in 66..70 {
            board.set(index);
        }
        assert_eq!(board.first_zero(), None);
        assert!(board.is_full());
    }

    #[test]
    fn test_ones_iterates_in_order() {
        let mut board = BitBoard::new(200);
        for &index in &[3, 64, 65, 199] {
            board.set(index);
        }
        let collected: Vec<u32> = board.ones().collect();
        assert_eq!(collected, vec![3, 64, 65, 199]);
    }

    #[test]
    fn test_from_blocks_rejects_bits_beyond_length() {
        assert!(BitBoard::from_blocks(vec![0b1111], 4).is_some());
        // bit 4 lies outside a 4-cell board
        assert!(BitBoard::from_blocks(vec![0b1_1111], 4).is_none());
        assert!(BitBoard::from_blocks(vec![0b1111], 8).is_some());
        assert!(BitBoard::from_blocks(vec![u64::MAX, 1], 65).is_some());
        assert!(BitBoard::from_blocks(vec![u64::MAX, 2], 65).is_none());
        assert!(BitBoard::from_blocks(vec![0], 128).is_none());
    }

    #[test]
    fn test_full_detection_respects_length() {
        let mut board = BitBoard::new(3);
        board.set(0);
        board.set(1);
        assert!(!board.is_full());
        board.set(2);
        assert!(board.is_full());
    }
}
