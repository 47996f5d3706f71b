//! Betting-pattern, house-edge and odds analytics.

use serde::{Deserialize, Serialize};

use super::snapshot::{BetOption, OptionId};

// ============================================================================
// Constants
// ============================================================================

/// Fixed payout multiplier advertised for a winning stake.
pub const PAYOUT_ODDS: f64 = 2.98;

// ============================================================================
// Ranking
// ============================================================================

/// Where an option placed in a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeRank {
    /// Largest stake.
    Highest,
    /// Middle stake.
    Medium,
    /// Smallest stake.
    Lowest,
}

/// Options ordered from largest to smallest stake.
///
/// Ties keep wire order (A before B before C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    /// Option with the largest stake.
    pub highest: OptionId,
    /// Option with the middle stake.
    pub medium: OptionId,
    /// Option with the smallest stake.
    pub lowest: OptionId,
}

impl Ranking {
    /// Ranks the options by `key`, returning the ranking and the gap between
    /// the extreme values.
    fn by_key(bets: &[BetOption; 3], key: impl Fn(&BetOption) -> i64) -> (Self, i64) {
        let mut order = OptionId::ALL;
        // Stable sort: equal stakes stay in wire order.
        order.sort_by_key(|option| std::cmp::Reverse(key(&bets[option.index()])));

        let spread = key(&bets[order[0].index()]).saturating_sub(key(&bets[order[2].index()]));
        let ranking = Self {
            highest: order[0],
            medium: order[1],
            lowest: order[2],
        };
        (ranking, spread)
    }

    /// Rank of `option` in this ranking.
    #[must_use]
    pub fn rank_of(&self, option: OptionId) -> StakeRank {
        if option == self.highest {
            StakeRank::Highest
        } else if option == self.medium {
            StakeRank::Medium
        } else {
            StakeRank::Lowest
        }
    }
}

// ============================================================================
// BettingPattern
// ============================================================================

/// Stake rankings of one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BettingPattern {
    /// Ranking by real stake.
    pub by_real_stake: Ranking,
    /// Ranking by real plus soft stake.
    pub by_combined_stake: Ranking,
    /// Highest minus lowest real stake.
    pub real_spread: i64,
    /// Highest minus lowest combined stake.
    pub combined_spread: i64,
}

impl BettingPattern {
    /// Ranks the three options both ways.
    #[must_use]
    pub fn analyze(bets: &[BetOption; 3]) -> Self {
        let (by_real_stake, real_spread) = Ranking::by_key(bets, |bet| bet.real_stake);
        let (by_combined_stake, combined_spread) = Ranking::by_key(bets, BetOption::combined);
        Self {
            by_real_stake,
            by_combined_stake,
            real_spread,
            combined_spread,
        }
    }
}

// ============================================================================
// HouseEdge
// ============================================================================

/// What the house kept from a round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HouseEdge {
    /// Total staked minus payout; negative when players came out ahead.
    pub amount: i64,
    /// `amount` as a percentage of the total staked, 0 when nothing was staked.
    pub percentage: f64,
}

impl HouseEdge {
    /// Computes the edge for one round.
    #[must_use]
    pub fn compute(total_staked: i64, payout: i64) -> Self {
        let amount = total_staked.saturating_sub(payout);
        Self {
            amount,
            percentage: percent_of(amount, total_staked),
        }
    }
}

/// `part / whole * 100`, defined as 0 for a non-positive `whole`.
pub(crate) fn percent_of(part: i64, whole: i64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

// ============================================================================
// OddsAnalysis
// ============================================================================

/// Actual payout compared with the advertised odds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OddsAnalysis {
    /// Real stake on the winning option (0 for an unknown winner).
    pub winner_stake: i64,
    /// `winner_stake * PAYOUT_ODDS`.
    pub expected_payout: f64,
    /// Payout the feed reported.
    pub actual_payout: i64,
    /// Share of the expected payout the house kept back; negative when the
    /// players received more. `None` when nothing was expected.
    pub house_margin_percent: Option<f64>,
}

impl OddsAnalysis {
    /// Compares `payout` against the odds for the winner's stake.
    #[must_use]
    pub fn compute(winner_stake: i64, payout: i64) -> Self {
        let expected_payout = winner_stake as f64 * PAYOUT_ODDS;
        let house_margin_percent = (expected_payout > 0.0)
            .then(|| (expected_payout - payout as f64) / expected_payout * 100.0);
        Self {
            winner_stake,
            expected_payout,
            actual_payout: payout,
            house_margin_percent,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
