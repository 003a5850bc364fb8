//! Incremental Zobrist hashing of search states
//!
//! A state is the pair (open-cell set, remaining inventory). Each open cell
//! contributes one fixed random value; each (piece, remaining-count) level
//! contributes another. Placing a piece XORs out the four covered cell keys
//! and swaps the inventory level key, so place and undo are O(1) hash
//! updates.
//!
//! Collisions are an accepted, documented risk: the transposition table
//! stores no secondary key, so a colliding hash can silently suppress a
//! valid subtree.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::solver::bitboard::BitBoard;

/// Fixed seed for key generation so pooled workers agree on hashes
const KEY_STREAM_SEED: u64 = 0x7e7a_50ce_11ab_cd01;

/// SplitMix64 finalizer used to derive per-count inventory keys
const fn mix(mut value: u64) -> u64 {
    value = value.wrapping_add(0x9e37_79b9_7f4a_7c15);
    value = (value ^ (value >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    value = (value ^ (value >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    value ^ (value >> 31)
}

/// Precomputed random keys for one compiled puzzle
#[derive(Clone, Debug)]
pub struct ZobristKeys {
    cell_keys: Vec<u64>,
    piece_keys: Vec<u64>,
}

impl ZobristKeys {
    /// Generate keys for a container of `cell_count` cells and `piece_count`
    /// pieces
    pub fn generate(cell_count: usize, piece_count: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(KEY_STREAM_SEED);
        let cell_keys = (0..cell_count).map(|_| rng.random::<u64>()).collect();
        let piece_keys = (0..piece_count).map(|_| rng.random::<u64>()).collect();
        Self {
            cell_keys,
            piece_keys,
        }
    }

    /// Key of one open cell
    pub fn cell(&self, index: u32) -> u64 {
        self.cell_keys.get(index as usize).copied().unwrap_or(0)
    }

    /// Key of one (piece, remaining-count) inventory level
    ///
    /// Derived on the fly so arbitrary inventory sizes (including the hint
    /// engine's capped "unlimited" inventories) need no table resizing.
    pub fn piece_count(&self, piece: usize, remaining: u32) -> u64 {
        let base = self.piece_keys.get(piece).copied().unwrap_or(0);
        mix(base ^ u64::from(remaining))
    }

    /// Hash of a full state from scratch
    ///
    /// Used at session construction and in debug assertions; the search
    /// itself maintains the hash incrementally.
    pub fn state_hash(&self, occupancy: &BitBoard, inventory: &[u32]) -> u64 {
        let mut hash = 0u64;
        for index in 0..occupancy.len() {
            if !occupancy.get(index) {
                hash ^= self.cell(index);
            }
        }
        for (piece, &remaining) in inventory.iter().enumerate() {
            hash ^= self.piece_count(piece, remaining);
        }
        hash
    }
}
