//! Typed broadcast snapshots.
//!
//! The feed publishes JSON state updates whose numeric fields live in loosely
//! keyed maps. This module validates that shape once, at the decode
//! boundary, and hands the engine a fixed-layout [`RoundSnapshot`].
//!
//! # Payload Format
//!
//! ```json
//! {
//!   "action": "updateSysInfo",
//!   "sys_info": {
//!     "gameState": 0,
//!     "bet_id": 0,
//!     "award_amount": 298,
//!     "bet_info": { "0": { "pay_amount": 100, "bean_pay_amount": 5 }, "1": { ... }, "2": { ... } },
//!     "result_pk_num1": 1, "...": "...", "result_pk_num9": 0,
//!     "result_point_0": 8, "result_point_1": 5, "result_point_2": 3,
//!     "time": 12
//!   }
//! }
//! ```
//!
//! Missing fields default to neutral values (`-1` for state and winner, `0`
//! for amounts).

// ============================================================================
// Imports
// ============================================================================

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Result;
use crate::identifiers::Fingerprint;

// ============================================================================
// Constants
// ============================================================================

/// Action name of the state updates the engine consumes.
pub const SYS_INFO_ACTION: &str = "updateSysInfo";

/// Winner id before the round is decided.
pub const NO_WINNER: i64 = -1;

/// Label used for winner ids outside `0..=2`.
pub const UNKNOWN_LABEL: &str = "Unknown";

// ============================================================================
// OptionId
// ============================================================================

/// One of the three fixed betting options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptionId {
    /// Wire id 0.
    A,
    /// Wire id 1.
    B,
    /// Wire id 2.
    C,
}

impl OptionId {
    /// All options in wire order.
    pub const ALL: [OptionId; 3] = [OptionId::A, OptionId::B, OptionId::C];

    /// Maps a wire id to an option.
    #[must_use]
    pub fn from_wire(id: i64) -> Option<Self> {
        match id {
            0 => Some(Self::A),
            1 => Some(Self::B),
            2 => Some(Self::C),
            _ => None,
        }
    }

    /// Returns the wire id.
    #[inline]
    #[must_use]
    pub const fn wire_id(self) -> i64 {
        self as i64
    }

    /// Returns the array index for per-option data.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns the display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        }
    }
}

/// Label for a raw winner id, `"Unknown"` when it names no option.
#[must_use]
pub fn option_label(id: i64) -> &'static str {
    OptionId::from_wire(id).map_or(UNKNOWN_LABEL, OptionId::label)
}

// ============================================================================
// GameState
// ============================================================================

/// Phase of the round reported by a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameState {
    /// Stakes are being placed (wire value 1).
    Betting,
    /// Round decided and paid out (wire value 0).
    Settled,
    /// Any other wire value, including the `-1` default.
    Other(i64),
}

impl GameState {
    /// Maps the wire value.
    #[must_use]
    pub const fn from_wire(value: i64) -> Self {
        match value {
            1 => Self::Betting,
            0 => Self::Settled,
            other => Self::Other(other),
        }
    }

    /// Returns the wire value.
    #[must_use]
    pub const fn wire_value(self) -> i64 {
        match self {
            Self::Betting => 1,
            Self::Settled => 0,
            Self::Other(value) => value,
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::Other(-1)
    }
}

// ============================================================================
// BetOption
// ============================================================================

/// Stakes placed on one option in the current snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BetOption {
    /// Real currency units.
    pub real_stake: i64,
    /// Soft currency units.
    pub secondary_stake: i64,
}

impl BetOption {
    /// Creates a stake pair.
    #[inline]
    #[must_use]
    pub const fn new(real_stake: i64, secondary_stake: i64) -> Self {
        Self {
            real_stake,
            secondary_stake,
        }
    }

    /// Real plus soft stake, saturating at the `i64` bounds.
    #[inline]
    #[must_use]
    pub const fn combined(&self) -> i64 {
        self.real_stake.saturating_add(self.secondary_stake)
    }
}

// ============================================================================
// RoundSnapshot
// ============================================================================

/// Decoded content of one broadcast update.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSnapshot {
    /// Round phase.
    pub game_state: GameState,
    /// Winning option wire id, [`NO_WINNER`] until revealed.
    pub winner_id: i64,
    /// Amount paid out to the winning side.
    pub award_amount: i64,
    /// Stakes indexed by [`OptionId::index`].
    pub bets: [BetOption; 3],
    /// Nine card slots, three per option; all zero until revealed.
    pub cards: [i64; 9],
    /// Hand points per option.
    pub points: [i64; 3],
    /// Seconds reported for the current phase.
    pub phase_seconds: i64,
    /// When the update was received.
    pub received_at: OffsetDateTime,
}

impl RoundSnapshot {
    /// Creates an empty snapshot in the given state.
    #[must_use]
    pub fn new(game_state: GameState, received_at: OffsetDateTime) -> Self {
        Self {
            game_state,
            winner_id: NO_WINNER,
            award_amount: 0,
            bets: [BetOption::default(); 3],
            cards: [0; 9],
            points: [0; 3],
            phase_seconds: 0,
            received_at,
        }
    }

    /// Decodes a broadcast payload.
    ///
    /// Returns `Ok(None)` for messages whose action is not
    /// [`SYS_INFO_ACTION`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if the payload is not a JSON object of
    /// the expected shape.
    pub fn from_payload(payload: &[u8], received_at: OffsetDateTime) -> Result<Option<Self>> {
        let envelope: Envelope = serde_json::from_slice(payload)?;
        if envelope.action != SYS_INFO_ACTION {
            return Ok(None);
        }
        Ok(Some(envelope.sys_info.into_snapshot(received_at)))
    }

    /// Stakes for one option.
    #[inline]
    #[must_use]
    pub fn bet(&self, option: OptionId) -> BetOption {
        self.bets[option.index()]
    }

    /// Sum of real stakes across all options.
    #[must_use]
    pub fn total_real_stake(&self) -> i64 {
        self.bets
            .iter()
            .fold(0_i64, |total, bet| total.saturating_add(bet.real_stake))
    }

    /// `true` once any card slot is nonzero.
    #[must_use]
    pub fn cards_revealed(&self) -> bool {
        self.cards.iter().any(|&card| card != 0)
    }

    /// `true` for a settled snapshot with a winner and revealed cards.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.game_state == GameState::Settled
            && self.winner_id != NO_WINNER
            && self.cards_revealed()
    }

    /// Round identity derived from stakes and cards only.
    ///
    /// Winner and award are not part of the key, so two rounds with the
    /// same stakes and the same draw share a fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        let mut key = String::with_capacity(96);
        for option in OptionId::ALL {
            let bet = self.bet(option);
            let _ = write!(
                key,
                "{}:{}:{}|",
                option.wire_id(),
                bet.real_stake,
                bet.secondary_stake
            );
        }
        for card in self.cards {
            let _ = write!(key, "{card}:");
        }
        Fingerprint::digest(&key)
    }
}

// ============================================================================
// Wire Shape
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    action: String,
    #[serde(default)]
    sys_info: SysInfo,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SysInfo {
    #[serde(rename = "gameState")]
    game_state: i64,
    bet_id: i64,
    award_amount: i64,
    bet_info: BetInfo,
    time: i64,
    result_pk_num1: i64,
    result_pk_num2: i64,
    result_pk_num3: i64,
    result_pk_num4: i64,
    result_pk_num5: i64,
    result_pk_num6: i64,
    result_pk_num7: i64,
    result_pk_num8: i64,
    result_pk_num9: i64,
    result_point_0: i64,
    result_point_1: i64,
    result_point_2: i64,
}

impl Default for SysInfo {
    fn default() -> Self {
        Self {
            game_state: -1,
            bet_id: NO_WINNER,
            award_amount: 0,
            bet_info: BetInfo::default(),
            time: 0,
            result_pk_num1: 0,
            result_pk_num2: 0,
            result_pk_num3: 0,
            result_pk_num4: 0,
            result_pk_num5: 0,
            result_pk_num6: 0,
            result_pk_num7: 0,
            result_pk_num8: 0,
            result_pk_num9: 0,
            result_point_0: 0,
            result_point_1: 0,
            result_point_2: 0,
        }
    }
}

impl SysInfo {
    fn into_snapshot(self, received_at: OffsetDateTime) -> RoundSnapshot {
        RoundSnapshot {
            game_state: GameState::from_wire(self.game_state),
            winner_id: self.bet_id,
            award_amount: self.award_amount,
            bets: [
                self.bet_info.a.into(),
                self.bet_info.b.into(),
                self.bet_info.c.into(),
            ],
            cards: [
                self.result_pk_num1,
                self.result_pk_num2,
                self.result_pk_num3,
                self.result_pk_num4,
                self.result_pk_num5,
                self.result_pk_num6,
                self.result_pk_num7,
                self.result_pk_num8,
                self.result_pk_num9,
            ],
            points: [
                self.result_point_0,
                self.result_point_1,
                self.result_point_2,
            ],
            phase_seconds: self.time,
            received_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BetInfo {
    #[serde(rename = "0")]
    a: StakeInfo,
    #[serde(rename = "1")]
    b: StakeInfo,
    #[serde(rename = "2")]
    c: StakeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StakeInfo {
    pay_amount: i64,
    bean_pay_amount: i64,
}

impl From<StakeInfo> for BetOption {
    fn from(info: StakeInfo) -> Self {
        Self::new(info.pay_amount, info.bean_pay_amount)
    }
}

// ============================================================================
// Tests
// ============================================================================
