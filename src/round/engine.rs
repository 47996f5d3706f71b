//! Round aggregation engine.
//!
//! Folds the stream of snapshots into at most one [`RoundRecord`] per
//! logical round. The feed repeats its final snapshot several times and
//! interleaves betting updates, so the engine keeps two pieces of state:
//!
//! - the previously observed [`GameState`], to detect the start of a round
//! - the set of fingerprints already finalized, to drop repeated settlements
//!
//! Nothing else influences [`RoundEngine::ingest`], which makes a recorded
//! snapshot sequence replay to the same records every time.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::identifiers::Fingerprint;

use super::record::RoundRecord;
use super::snapshot::{GameState, RoundSnapshot};

// ============================================================================
// RoundEngine
// ============================================================================

/// Owned aggregation state for one feed session.
#[derive(Debug, Default)]
pub struct RoundEngine {
    /// Incremented on every Settled → Betting edge.
    round_number: u64,
    /// State of the previous snapshot.
    last_state: GameState,
    /// Fingerprints that already produced a record.
    finalized: FxHashSet<Fingerprint>,
}

impl RoundEngine {
    /// Creates an engine with no history.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one snapshot into the engine.
    ///
    /// Returns a record the first time a final snapshot of a round is seen,
    /// `None` otherwise.
    pub fn ingest(&mut self, snapshot: &RoundSnapshot) -> Option<RoundRecord> {
        let fingerprint = snapshot.fingerprint();

        if snapshot.game_state == GameState::Betting && self.last_state == GameState::Settled {
            self.round_number += 1;
            debug!(round = self.round_number, %fingerprint, "New round started");
        }
        self.last_state = snapshot.game_state;

        if !snapshot.is_final() {
            return None;
        }

        if self.is_finalized(&fingerprint) {
            trace!(%fingerprint, "Duplicate settlement ignored");
            return None;
        }
        self.finalized.insert(fingerprint.clone());

        debug!(round = self.round_number, %fingerprint, winner = snapshot.winner_id, "Round finalized");
        Some(RoundRecord::from_snapshot(
            self.round_number,
            fingerprint,
            snapshot,
        ))
    }

    /// Current round counter.
    #[inline]
    #[must_use]
    pub fn round_number(&self) -> u64 {
        self.round_number
    }

    /// State of the most recent snapshot.
    #[inline]
    #[must_use]
    pub fn last_state(&self) -> GameState {
        self.last_state
    }

    /// Number of rounds finalized so far.
    #[inline]
    #[must_use]
    pub fn finalized_count(&self) -> usize {
        self.finalized.len()
    }

    /// `true` if `fingerprint` already produced a record.
    #[inline]
    #[must_use]
    pub fn is_finalized(&self, fingerprint: &Fingerprint) -> bool {
        self.finalized.contains(fingerprint)
    }
}

// ============================================================================
// Tests
// ============================================================================
