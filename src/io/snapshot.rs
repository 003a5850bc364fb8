//! Versioned, resumable snapshots of a search run
//!
//! A snapshot captures everything needed to continue a run over the same
//! compiled puzzle: board, inventory, decision stack, hash, counters, and
//! the solution signatures already emitted. Two things are deliberately
//! not captured. The transposition table only prunes, so dropping it costs
//! repeated work but never changes the solution stream. The RNG is stored
//! as a freshly drawn reseed value, so a resumed run is stochastically
//! equivalent rather than bit-identical; with tie randomization and piece
//! shuffling disabled it is exactly identical.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::io::error::{Result, SolverError};
use crate::io::settings::SolverSettings;
use crate::solver::pruning::PruneCounters;
use crate::solver::search::{SearchCounters, SearchFrame};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized form of a suspended search session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotV1 {
    /// Format version, checked on restore
    pub version: u32,
    /// Container id the run was started on, for operator sanity checks
    pub container_id: Option<String>,
    /// Container cell count, checked against the puzzle on restore
    pub cell_count: u32,
    /// Compiled candidate count, checked against the puzzle on restore
    pub candidate_count: usize,
    /// Piece count, checked against the puzzle on restore
    pub piece_count: usize,
    /// Settings the run was started with
    pub settings: SolverSettings,
    /// Occupancy the run starts from after a restart
    pub initial_occupancy_blocks: Vec<u64>,
    /// Current occupancy as raw bit blocks
    pub occupancy_blocks: Vec<u64>,
    /// Current remaining inventory per piece
    pub inventory: Vec<u32>,
    /// Inventory the run starts from after a restart
    pub initial_inventory: Vec<u32>,
    /// Suspended decision stack
    pub frames: Vec<SearchFrame>,
    /// Incremental state hash at the suspension point
    pub hash: u64,
    /// Run counters
    pub counters: SearchCounters,
    /// Per-rule prune counters
    pub prunes: PruneCounters,
    /// Signatures of solutions already emitted
    pub seen_solutions: Vec<Vec<(usize, [u32; 4])>>,
    /// Seed for the resumed run's RNG
    pub rng_reseed: u64,
    /// Piece priority permutation at the suspension point
    pub piece_priority: Vec<usize>,
    /// Completed restarts
    pub restarts: u64,
    /// Current placement depth
    pub depth: u32,
    /// Whether the run had fallen below its best depth
    pub below_best: bool,
    /// Whether a leaf unwind was deferred for a just-emitted solution
    pub pending_advance: bool,
    /// Whether the root feasibility checks already ran
    pub root_expanded: bool,
}

impl SnapshotV1 {
    /// Write the snapshot as pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns `SolverError::FileSystem` if the file cannot be written, or
    /// `SolverError::Snapshot` if serialization fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|err| SolverError::Snapshot {
            reason: format!("serialization failed: {err}"),
        })?;
        fs::write(path, json).map_err(|source| SolverError::FileSystem {
            path: path.to_path_buf(),
            operation: "write snapshot",
            source,
        })
    }

    /// Read a snapshot from a JSON file
    ///
    /// # Errors
    ///
    /// Returns `SolverError::FileSystem` if the file cannot be read, or
    /// `SolverError::Snapshot` if the contents do not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|source| SolverError::FileSystem {
            path: path.to_path_buf(),
            operation: "read snapshot",
            source,
        })?;
        Self::from_json(&json)
    }

    /// Parse a snapshot from a JSON string
    ///
    /// # Errors
    ///
    /// Returns `SolverError::Snapshot` if the string does not parse.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| SolverError::Snapshot {
            reason: format!("deserialization failed: {err}"),
        })
    }

    /// Serialize the snapshot to a JSON string
    ///
    /// # Errors
    ///
    /// Returns `SolverError::Snapshot` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|err| SolverError::Snapshot {
            reason: format!("serialization failed: {err}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SnapshotV1 {
        SnapshotV1 {
            version: SNAPSHOT_VERSION,
            container_id: Some("sample".to_string()),
            cell_count: 8,
            candidate_count: 5,
            piece_count: 1,
            settings: SolverSettings::default(),
            initial_occupancy_blocks: vec![0],
            occupancy_blocks: vec![0b1111],
            inventory: vec![1],
            initial_inventory: vec![2],
            frames: vec![SearchFrame {
                target: 0,
                offset: 0,
                scanned: 1,
                placed: Some(0),
            }],
            hash: 0xdead_beef,
            counters: SearchCounters::default(),
            prunes: PruneCounters::default(),
            seen_solutions: vec![vec![(0, [0, 1, 2, 3]), (0, [4, 5, 6, 7])]],
            rng_reseed: 7,
            piece_priority: vec![0],
            restarts: 0,
            depth: 1,
            below_best: false,
            pending_advance: false,
            root_expanded: true,
        }
    }

    #[test]
    fn test_json_round_trip() {
        let snapshot = sample();
        let json = snapshot.to_json().unwrap();
        let restored = SnapshotV1::from_json(&json).unwrap();
        assert_eq!(restored.version, SNAPSHOT_VERSION);
        assert_eq!(restored.occupancy_blocks, snapshot.occupancy_blocks);
        assert_eq!(restored.frames, snapshot.frames);
        assert_eq!(restored.seen_solutions, snapshot.seen_solutions);
    }

    #[test]
    fn test_malformed_json_is_a_snapshot_error() {
        match SnapshotV1::from_json("{ not json") {
            Err(SolverError::Snapshot { .. }) => {}
            other => panic!("expected a snapshot error, got {other:?}"),
        }
    }
}
