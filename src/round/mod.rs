//! Round aggregation.
//!
//! Turns decoded broadcast snapshots into deduplicated round records with
//! betting analytics attached.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `snapshot` | Typed broadcast payloads |
//! | `engine` | Round counter and settlement dedup |
//! | `record` | Finalized round records |
//! | `analysis` | Stake rankings, house edge, odds |
//! | `stats` | Running session statistics |

// ============================================================================
// Submodules
// ============================================================================

/// Stake rankings, house edge and odds.
pub mod analysis;

/// Round counter and settlement dedup.
pub mod engine;

/// Finalized round records.
pub mod record;

/// Typed broadcast payloads.
pub mod snapshot;

/// Running statistics.
pub mod stats;

// ============================================================================
// Re-exports
// ============================================================================

pub use analysis::{BettingPattern, HouseEdge, OddsAnalysis, PAYOUT_ODDS, Ranking, StakeRank};
pub use engine::RoundEngine;
pub use record::{BetTotals, RoundRecord, Winner};
pub use snapshot::{BetOption, GameState, OptionId, RoundSnapshot, SYS_INFO_ACTION};
pub use stats::RoundStatistics;
