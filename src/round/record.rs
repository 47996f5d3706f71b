//! Finalized round records.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::identifiers::Fingerprint;

use super::analysis::{BettingPattern, HouseEdge, OddsAnalysis};
use super::snapshot::{OptionId, RoundSnapshot, option_label};

// ============================================================================
// Winner
// ============================================================================

/// Winning option of a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    /// Wire id.
    pub id: i64,
    /// Display label (`"A"`, `"B"`, `"C"` or `"Unknown"`).
    pub label: String,
}

impl Winner {
    /// Builds the winner from its wire id.
    #[must_use]
    pub fn from_wire(id: i64) -> Self {
        Self {
            id,
            label: option_label(id).to_string(),
        }
    }

    /// The winning option, if the id names one.
    #[must_use]
    pub fn option(&self) -> Option<OptionId> {
        OptionId::from_wire(self.id)
    }
}

// ============================================================================
// BetTotals
// ============================================================================

/// Real stake per option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetTotals {
    /// Stake on option A.
    #[serde(rename = "A")]
    pub a: i64,
    /// Stake on option B.
    #[serde(rename = "B")]
    pub b: i64,
    /// Stake on option C.
    #[serde(rename = "C")]
    pub c: i64,
}

impl BetTotals {
    /// Stake on `option`.
    #[must_use]
    pub const fn get(&self, option: OptionId) -> i64 {
        match option {
            OptionId::A => self.a,
            OptionId::B => self.b,
            OptionId::C => self.c,
        }
    }

    /// Sum over all options, saturating at the `i64` bounds.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.a.saturating_add(self.b).saturating_add(self.c)
    }
}

// ============================================================================
// RoundRecord
// ============================================================================

/// A completed, deduplicated round.
///
/// Created once per distinct fingerprint and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Process-local round counter at settlement time.
    pub round_number: u64,
    /// Round identity.
    pub fingerprint: Fingerprint,
    /// Receive time of the settling snapshot.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Winning option.
    pub winner: Winner,
    /// Real stake per option.
    pub bets: BetTotals,
    /// Revealed cards, three per option.
    pub cards: [i64; 9],
    /// Hand points per option.
    pub points: [i64; 3],
    /// Sum of real stakes.
    pub total_staked: i64,
    /// Amount paid to the winning side.
    pub payout: i64,
    /// Stake rankings.
    pub betting_pattern: BettingPattern,
    /// House take for the round.
    pub house_edge: HouseEdge,
}

impl RoundRecord {
    /// Builds the record for a final snapshot.
    #[must_use]
    pub fn from_snapshot(
        round_number: u64,
        fingerprint: Fingerprint,
        snapshot: &RoundSnapshot,
    ) -> Self {
        let bets = BetTotals {
            a: snapshot.bet(OptionId::A).real_stake,
            b: snapshot.bet(OptionId::B).real_stake,
            c: snapshot.bet(OptionId::C).real_stake,
        };
        let total_staked = bets.total();

        Self {
            round_number,
            fingerprint,
            timestamp: snapshot.received_at,
            winner: Winner::from_wire(snapshot.winner_id),
            bets,
            cards: snapshot.cards,
            points: snapshot.points,
            total_staked,
            payout: snapshot.award_amount,
            betting_pattern: BettingPattern::analyze(&snapshot.bets),
            house_edge: HouseEdge::compute(total_staked, snapshot.award_amount),
        }
    }

    /// Real stake the winner held, 0 for an unknown winner.
    #[must_use]
    pub fn winner_stake(&self) -> i64 {
        self.winner.option().map_or(0, |option| self.bets.get(option))
    }

    /// Payout compared with the advertised odds.
    #[must_use]
    pub fn odds(&self) -> OddsAnalysis {
        OddsAnalysis::compute(self.winner_stake(), self.payout)
    }

    /// Cards dealt to `option`.
    #[must_use]
    pub fn hand(&self, option: OptionId) -> &[i64] {
        let start = option.index() * 3;
        &self.cards[start..start + 3]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use time::macros::datetime;

    use crate::round::snapshot::{BetOption, GameState};

    fn settled() -> RoundSnapshot {
        let mut snapshot = RoundSnapshot::new(GameState::Settled, datetime!(2025-03-04 05:06:07 UTC));
        snapshot.winner_id = 1;
        snapshot.award_amount = 149;
        snapshot.bets = [BetOption::new(100, 7), BetOption::new(50, 0), BetOption::new(10, 0)];
        snapshot.cards = [1, 2, 3, 4, 5, 6, 7, 8, 9];
        snapshot.points = [8, 5, 3];
        snapshot
    }

    #[test]
    fn test_from_snapshot() {
        let snapshot = settled();
        let record = RoundRecord::from_snapshot(4, snapshot.fingerprint(), &snapshot);

        assert_eq!(record.round_number, 4);
        assert_eq!(record.winner, Winner { id: 1, label: "B".to_string() });
        assert_eq!(record.bets, BetTotals { a: 100, b: 50, c: 10 });
        assert_eq!(record.total_staked, 160);
        assert_eq!(record.payout, 149);
        assert_eq!(record.house_edge.amount, 11);
        assert_eq!(record.winner_stake(), 50);
        assert_eq!(record.hand(OptionId::C), &[7, 8, 9]);
    }

    #[test]
    fn test_unknown_winner() {
        let mut snapshot = settled();
        snapshot.winner_id = 9;
        let record = RoundRecord::from_snapshot(0, snapshot.fingerprint(), &snapshot);
        assert_eq!(record.winner.label, "Unknown");
        assert_eq!(record.winner_stake(), 0);
        assert_eq!(record.odds().house_margin_percent, None);
    }

    #[test]
    fn test_json_shape() {
        let snapshot = settled();
        let record = RoundRecord::from_snapshot(2, snapshot.fingerprint(), &snapshot);
        let json = serde_json::to_value(&record).expect("serialize");

        assert_eq!(json["round_number"], 2);
        assert_eq!(json["timestamp"], "2025-03-04T05:06:07Z");
        assert_eq!(json["winner"]["label"], "B");
        assert_eq!(json["bets"]["A"], 100);
        assert_eq!(json["total_staked"], 160);
        assert_eq!(json["house_edge"]["amount"], 11);
        assert_eq!(json["cards"].as_array().map(Vec::len), Some(9));

        let back: RoundRecord = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, record);
    }
}
