//! Bounded transposition table of proven-unsolvable states
//!
//! Keyed purely by Zobrist hash with no secondary disambiguation; a
//! collision can therefore prune a solvable subtree. Capacity is fixed at
//! construction and checked against a hard budget, never truncated
//! silently.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::io::error::{Result, capacity_exceeded};
use crate::io::settings::MAX_TT_CAPACITY;

/// Proven outcome recorded for a state hash
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableFlag {
    /// State was expanded but its outcome is unknown
    Seen,
    /// Every completion of the state was refuted
    Unsolvable,
}

/// Behavior when an insert arrives at a full table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TablePolicy {
    /// Drop new entries, keeping the established ones
    Reject,
    /// Clear the whole table and start over
    ClearWhenFull,
}

/// Hit/miss bookkeeping for status reports
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct TableStats {
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries stored
    pub insertions: u64,
    /// Inserts dropped by the `Reject` policy
    pub rejected: u64,
    /// Full-table clears under the `ClearWhenFull` policy
    pub clears: u64,
}

/// Bounded hash cache of search-state outcomes
#[derive(Debug)]
pub struct TranspositionTable {
    entries: FxHashMap<u64, TableFlag>,
    capacity: usize,
    policy: TablePolicy,
    /// Lookup and insertion statistics
    pub stats: TableStats,
}

impl TranspositionTable {
    /// Create a table with a fixed entry capacity
    ///
    /// # Errors
    ///
    /// Returns `SolverError::CapacityExceeded` if `capacity` is above the
    /// crate-wide budget.
    pub fn with_capacity(capacity: usize, policy: TablePolicy) -> Result<Self> {
        if capacity > MAX_TT_CAPACITY {
            return Err(capacity_exceeded(
                "transposition table",
                capacity,
                MAX_TT_CAPACITY,
            ));
        }
        Ok(Self {
            entries: FxHashMap::default(),
            capacity,
            policy,
            stats: TableStats::default(),
        })
    }

    /// Look up a state hash
    pub fn lookup(&mut self, hash: u64) -> Option<TableFlag> {
        let flag = self.entries.get(&hash).copied();
        if flag.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        flag
    }

    /// Record a state as proven unsolvable
    pub fn mark_unsolvable(&mut self, hash: u64) {
        self.insert(hash, TableFlag::Unsolvable);
    }

    /// Record a state as expanded
    ///
    /// Never downgrades an `Unsolvable` entry.
    pub fn mark_seen(&mut self, hash: u64) {
        if self.entries.get(&hash) != Some(&TableFlag::Unsolvable) {
            self.insert(hash, TableFlag::Seen);
        }
    }

    /// Fraction of capacity currently used
    pub fn occupancy(&self) -> f64 {
        if self.capacity == 0 {
            return 1.0;
        }
        self.entries.len() as f64 / self.capacity as f64
    }

    /// Drop every entry, keeping statistics
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn insert(&mut self, hash: u64, flag: TableFlag) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&hash) {
            match self.policy {
                TablePolicy::Reject => {
                    self.stats.rejected += 1;
                    return;
                }
                TablePolicy::ClearWhenFull => {
                    self.entries.clear();
                    self.stats.clears += 1;
                }
            }
        }
        self.entries.insert(hash, flag);
        self.stats.insertions += 1;
    }
}
