//! Seeded stochastic control: tie randomization, piece shuffles, restarts
//!
//! One deterministic RNG drives every stochastic decision of a session, so
//! identical seed and settings replay identically. Tie randomization jumps
//! a frame's initial cursor to a random offset within its candidate list;
//! the scan still wraps through every remaining candidate, so completeness
//! is preserved. Piece-priority shuffles reorder the pre-sorted candidate
//! lists at start and on every restart.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::io::settings::RestartPolicy;

/// Stochastic controller owned by one search session
#[derive(Debug)]
pub struct RestartController {
    rng: StdRng,
    randomize_ties: bool,
    shuffle_pieces: bool,
    policy: RestartPolicy,
    /// Current piece priority permutation; lower sorts earlier
    priority: Vec<usize>,
    /// Completed restarts
    pub restarts: u64,
    nodes_at_restart: u64,
    stalled_backtracks: u64,
}

impl RestartController {
    /// Create a controller for `piece_count` pieces
    pub fn new(
        seed: u64,
        randomize_ties: bool,
        shuffle_pieces: bool,
        policy: RestartPolicy,
        piece_count: usize,
    ) -> Self {
        let mut controller = Self {
            rng: StdRng::seed_from_u64(seed),
            randomize_ties,
            shuffle_pieces,
            policy,
            priority: (0..piece_count).collect(),
            restarts: 0,
            nodes_at_restart: 0,
            stalled_backtracks: 0,
        };
        if shuffle_pieces {
            controller.shuffle_priority();
        }
        controller
    }

    /// Sort key of a piece under the current priority permutation
    pub fn priority_of(&self, piece: usize) -> usize {
        self.priority.get(piece).copied().unwrap_or(piece)
    }

    /// Initial cursor offset for a frame over `candidate_count` candidates
    pub fn entry_offset(&mut self, candidate_count: usize) -> u32 {
        if self.randomize_ties && candidate_count > 1 {
            self.rng.random_range(0..candidate_count) as u32
        } else {
            0
        }
    }

    /// Record a backtrack below the best reached depth
    pub const fn note_stalled_backtrack(&mut self) {
        self.stalled_backtracks += 1;
    }

    /// Record progress past the previous best depth
    pub const fn note_progress(&mut self) {
        self.stalled_backtracks = 0;
    }

    /// Decide whether a restart is due at `nodes` total search nodes
    pub const fn restart_due(&self, nodes: u64) -> bool {
        match self.policy {
            RestartPolicy::None => false,
            RestartPolicy::Periodic { interval_nodes } => {
                nodes - self.nodes_at_restart >= interval_nodes
            }
            RestartPolicy::Adaptive { stall_backtracks } => {
                self.stalled_backtracks >= stall_backtracks
            }
        }
    }

    /// Mark a restart as begun and reshuffle piece priority
    pub fn begin_restart(&mut self, nodes: u64) {
        self.restarts += 1;
        self.nodes_at_restart = nodes;
        self.stalled_backtracks = 0;
        if self.shuffle_pieces {
            self.shuffle_priority();
        }
    }

    /// Draw a reseed value for snapshotting
    ///
    /// The snapshot stores a fresh seed instead of raw RNG internals; a
    /// resumed run is stochastically equivalent rather than bit-identical.
    /// With tie randomization and shuffling disabled the RNG is never
    /// consulted, so resumed runs stay exactly deterministic.
    pub fn reseed_for_snapshot(&mut self) -> u64 {
        self.rng.random::<u64>()
    }

    /// Current piece priority permutation, for snapshotting
    pub fn priority_snapshot(&self) -> Vec<usize> {
        self.priority.clone()
    }

    /// Restore bookkeeping captured in a snapshot
    ///
    /// `nodes_baseline` re-anchors the periodic policy at the snapshot's
    /// node count.
    pub fn restore(&mut self, restarts: u64, nodes_baseline: u64, priority: Vec<usize>) {
        self.restarts = restarts;
        self.nodes_at_restart = nodes_baseline;
        self.stalled_backtracks = 0;
        self.priority = priority;
    }

    fn shuffle_priority(&mut self) {
        let piece_count = self.priority.len();
        let mut permutation: Vec<usize> = (0..piece_count).collect();
        permutation.shuffle(&mut self.rng);
        self.priority = permutation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_priority_without_shuffle() {
        let controller = RestartController::new(7, false, false, RestartPolicy::None, 4);
        for piece in 0..4 {
            assert_eq!(controller.priority_of(piece), piece);
        }
    }

    #[test]
    fn test_offsets_are_zero_without_tie_randomization() {
        let mut controller = RestartController::new(7, false, false, RestartPolicy::None, 4);
        assert_eq!(controller.entry_offset(10), 0);
    }

    #[test]
    fn test_offsets_stay_in_range() {
        let mut controller = RestartController::new(7, true, false, RestartPolicy::None, 4);
        for _ in 0..100 {
            assert!(controller.entry_offset(5) < 5);
        }
        // single-candidate lists never get an offset
        assert_eq!(controller.entry_offset(1), 0);
    }

    #[test]
    fn test_same_seed_replays_identically() {
        let mut a = RestartController::new(99, true, true, RestartPolicy::None, 6);
        let mut b = RestartController::new(99, true, true, RestartPolicy::None, 6);
        for piece in 0..6 {
            assert_eq!(a.priority_of(piece), b.priority_of(piece));
        }
        for _ in 0..20 {
            assert_eq!(a.entry_offset(9), b.entry_offset(9));
        }
    }

    #[test]
    fn test_periodic_restart_due() {
        let mut controller = RestartController::new(
            1,
            false,
            false,
            RestartPolicy::Periodic { interval_nodes: 100 },
            2,
        );
        assert!(!controller.restart_due(99));
        assert!(controller.restart_due(100));
        controller.begin_restart(100);
        assert!(!controller.restart_due(150));
        assert!(controller.restart_due(200));
        assert_eq!(controller.restarts, 1);
    }

    #[test]
    fn test_adaptive_restart_due() {
        let mut controller = RestartController::new(
            1,
            false,
            false,
            RestartPolicy::Adaptive {
                stall_backtracks: 3,
            },
            2,
        );
        controller.note_stalled_backtrack();
        controller.note_stalled_backtrack();
        assert!(!controller.restart_due(0));
        controller.note_stalled_backtrack();
        assert!(controller.restart_due(0));
        controller.note_progress();
        assert!(!controller.restart_due(0));
    }
}
