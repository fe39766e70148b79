use serde::Serialize;

use super::domain::{Decision, HitlStatus, ScoredOpportunity};

/// Counts surfaced on the dashboard, recomputed on demand from the current
/// record set. `pending` counts the stored status only; snoozed records are
/// excluded even when their horizon has elapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardMetrics {
    pub priority_a: u32,
    pub priority_b: u32,
    pub pending: u32,
    pub approved: u32,
}

/// Pure fold over a user's scored opportunities.
pub fn metrics<'a, I>(records: I) -> DashboardMetrics
where
    I: IntoIterator<Item = &'a ScoredOpportunity>,
{
    records
        .into_iter()
        .fold(DashboardMetrics::default(), |mut acc, record| {
            match record.decision {
                Decision::PriorityA => acc.priority_a += 1,
                Decision::PriorityB => acc.priority_b += 1,
                Decision::Conditional | Decision::NoGo => {}
            }
            match record.hitl_status {
                HitlStatus::Pending => acc.pending += 1,
                HitlStatus::Approved => acc.approved += 1,
                HitlStatus::Rejected | HitlStatus::Snoozed => {}
            }
            acc
        })
}
