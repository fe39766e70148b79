use chrono::{DateTime, Utc};

use super::domain::{Application, ApplicationStatus, SectionKind};

/// Rejected status movement for an application.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("application status '{}' is terminal", status.label())]
    Terminal { status: ApplicationStatus },
    #[error("cannot move application from '{}' to '{}'", from.label(), to.label())]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
}

/// Outcome of a status advance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusChange {
    Advanced,
    /// The application was already in the requested status; nothing written.
    Unchanged,
}

/// Advance the forward-only status progression in place.
///
/// draft -> in_progress -> submitted -> awarded | rejected. Skipping
/// in_progress is allowed; moving backwards or out of a terminal state is
/// not. Re-requesting the current status is an idempotent no-op, so a second
/// submit never touches `submitted_at`, which is set once on the first
/// transition into submitted and never cleared.
pub(crate) fn advance_status(
    application: &mut Application,
    next: ApplicationStatus,
    now: DateTime<Utc>,
) -> Result<StatusChange, LifecycleError> {
    let from = application.status;

    if from == next {
        return Ok(StatusChange::Unchanged);
    }

    if from.is_terminal() {
        return Err(LifecycleError::Terminal { status: from });
    }

    let allowed = matches!(
        (from, next),
        (ApplicationStatus::Draft, ApplicationStatus::InProgress)
            | (ApplicationStatus::Draft, ApplicationStatus::Submitted)
            | (ApplicationStatus::InProgress, ApplicationStatus::Submitted)
            | (ApplicationStatus::Submitted, ApplicationStatus::Awarded)
            | (ApplicationStatus::Submitted, ApplicationStatus::Rejected)
    );
    if !allowed {
        return Err(LifecycleError::InvalidTransition { from, to: next });
    }

    application.status = next;
    if next == ApplicationStatus::Submitted && application.submitted_at.is_none() {
        application.submitted_at = Some(now);
    }
    application.updated_at = now;

    Ok(StatusChange::Advanced)
}

/// Store section text verbatim, as returned by the draft collaborator or
/// typed by the user.
pub(crate) fn set_section(
    application: &mut Application,
    section: SectionKind,
    text: String,
    now: DateTime<Utc>,
) {
    application.content_sections.insert(section, text);
    application.updated_at = now;
}
