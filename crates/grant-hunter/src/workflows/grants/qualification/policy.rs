use super::super::domain::Decision;

// Closed design constants. 70 is priority_b, not conditional; 85 is
// priority_a, not priority_b. Totals above 100 stay in the priority_a band
// (bonuses can push past the nominal component maximum and are not clamped).
pub(crate) const PRIORITY_A_FLOOR: i16 = 85;
pub(crate) const PRIORITY_B_FLOOR: i16 = 70;
pub(crate) const CONDITIONAL_FLOOR: i16 = 55;

/// Classify a recomputed total into its priority bucket.
pub(crate) fn decide(total_score: i16) -> Decision {
    if total_score >= PRIORITY_A_FLOOR {
        Decision::PriorityA
    } else if total_score >= PRIORITY_B_FLOOR {
        Decision::PriorityB
    } else if total_score >= CONDITIONAL_FLOOR {
        Decision::Conditional
    } else {
        Decision::NoGo
    }
}
