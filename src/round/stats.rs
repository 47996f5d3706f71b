//! Running statistics over finalized rounds.

use std::collections::BTreeMap;

use serde::Serialize;

use super::analysis::{StakeRank, percent_of};
use super::record::RoundRecord;

// ============================================================================
// RoundStatistics
// ============================================================================

/// Aggregates of every round observed in a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoundStatistics {
    /// Rounds observed.
    pub rounds: usize,
    /// Wins per winner label.
    pub winners: BTreeMap<String, usize>,
    /// Rounds won by the option with the largest real stake.
    pub winner_highest: usize,
    /// Rounds won by the option with the middle real stake.
    pub winner_medium: usize,
    /// Rounds won by the option with the smallest real stake.
    pub winner_lowest: usize,
    /// Sum of real stakes.
    pub total_staked: i64,
    /// Sum of house edge amounts.
    pub total_house_take: i64,
}

impl RoundStatistics {
    /// Creates empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds statistics over a slice of records.
    #[must_use]
    pub fn from_records(records: &[RoundRecord]) -> Self {
        let mut stats = Self::new();
        for record in records {
            stats.observe(record);
        }
        stats
    }

    /// Adds one record.
    pub fn observe(&mut self, record: &RoundRecord) {
        self.rounds += 1;
        *self.winners.entry(record.winner.label.clone()).or_default() += 1;

        if let Some(option) = record.winner.option() {
            match record.betting_pattern.by_real_stake.rank_of(option) {
                StakeRank::Highest => self.winner_highest += 1,
                StakeRank::Medium => self.winner_medium += 1,
                StakeRank::Lowest => self.winner_lowest += 1,
            }
        }

        self.total_staked = self.total_staked.saturating_add(record.total_staked);
        self.total_house_take = self.total_house_take.saturating_add(record.house_edge.amount);
    }

    /// Total house take as a percentage of total stakes.
    #[must_use]
    pub fn overall_edge_percent(&self) -> f64 {
        percent_of(self.total_house_take, self.total_staked)
    }

    /// Share of rounds, in percent, for a count taken from these statistics.
    #[must_use]
    pub fn share(&self, count: usize) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            count as f64 / self.rounds as f64 * 100.0
        }
    }

    /// Wins recorded for `label`.
    #[must_use]
    pub fn wins_for(&self, label: &str) -> usize {
        self.winners.get(label).copied().unwrap_or(0)
    }
}

// ============================================================================
// Tests
// ============================================================================
