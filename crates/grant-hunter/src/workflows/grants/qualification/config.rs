use serde::{Deserialize, Serialize};

/// Dials for the qualification policy. Component bounds and decision
/// thresholds are fixed contract constants and intentionally not
/// configurable; these knobs cover the bonus/penalty trigger conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Active, unsubmitted proposals above this count trigger the capacity
    /// penalty.
    pub capacity_ceiling: u32,
    /// Award floor (in dollars) for the large-award bonus condition.
    pub large_award_floor: u64,
    /// Cost-share percentage below which the large-award bonus applies.
    pub low_cost_share_max_pct: u8,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            capacity_ceiling: 3,
            large_award_floor: 5_000_000,
            low_cost_share_max_pct: 25,
        }
    }
}
