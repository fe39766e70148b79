use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{HitlStatus, ScoredOpportunity};

/// Default snooze horizon when the reviewer does not supply one.
pub const DEFAULT_SNOOZE_HOURS: i64 = 24;

/// Reviewer decision over a scored opportunity.
///
/// `Reopen` is the undo path: approved or rejected records return to pending
/// before a different decision can be recorded, so approved and rejected are
/// never directly exchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
    Snooze {
        #[serde(default)]
        snoozed_until: Option<DateTime<Utc>>,
    },
    Reopen,
}

impl ReviewAction {
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            ReviewAction::Approve => "approve",
            ReviewAction::Reject => "reject",
            ReviewAction::Snooze { .. } => "snooze",
            ReviewAction::Reopen => "reopen",
        }
    }
}

/// Invalid reviewer action for the record's current state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TriageError {
    #[error("cannot {} an opportunity in hitl_status '{}'", action, from.label())]
    InvalidTransition {
        from: HitlStatus,
        action: &'static str,
    },
    #[error("snoozed_until {requested} is not in the future")]
    SnoozeInPast { requested: DateTime<Utc> },
}

/// Apply a reviewer action to the record in place.
///
/// Allowed transitions: pending -> approved/rejected/snoozed; snoozed ->
/// approved/rejected/snoozed/pending (a snoozed record may be decided before
/// its horizon elapses); approved/rejected -> pending via reopen. The stored
/// status of an expired snooze stays `snoozed` until a consumer acts on it;
/// expiry itself is the derived `is_actionable` query.
pub(crate) fn apply_action(
    record: &mut ScoredOpportunity,
    action: &ReviewAction,
    now: DateTime<Utc>,
) -> Result<(), TriageError> {
    let from = record.hitl_status;

    match action {
        ReviewAction::Approve | ReviewAction::Reject => {
            if !matches!(from, HitlStatus::Pending | HitlStatus::Snoozed) {
                return Err(TriageError::InvalidTransition {
                    from,
                    action: action.name(),
                });
            }
            record.hitl_status = if matches!(action, ReviewAction::Approve) {
                HitlStatus::Approved
            } else {
                HitlStatus::Rejected
            };
            record.snoozed_until = None;
        }
        ReviewAction::Snooze { snoozed_until } => {
            if !matches!(from, HitlStatus::Pending | HitlStatus::Snoozed) {
                return Err(TriageError::InvalidTransition {
                    from,
                    action: action.name(),
                });
            }
            let until = match snoozed_until {
                Some(requested) => {
                    if *requested <= now {
                        return Err(TriageError::SnoozeInPast {
                            requested: *requested,
                        });
                    }
                    *requested
                }
                None => now + Duration::hours(DEFAULT_SNOOZE_HOURS),
            };
            record.hitl_status = HitlStatus::Snoozed;
            record.snoozed_until = Some(until);
        }
        ReviewAction::Reopen => {
            if from == HitlStatus::Pending {
                return Err(TriageError::InvalidTransition {
                    from,
                    action: action.name(),
                });
            }
            record.hitl_status = HitlStatus::Pending;
            record.snoozed_until = None;
        }
    }

    record.updated_at = now;
    Ok(())
}
