use super::super::domain::{CompanyProfile, ComponentScores};
use super::super::providers::CollaboratorAssessment;
use super::config::ScoringConfig;

pub(crate) const INTERSECTIONAL_BONUS: i16 = 20;
pub(crate) const LARGE_AWARD_BONUS: i16 = 10;
pub(crate) const CAPACITY_PENALTY: i16 = -15;

/// Raised when the scoring collaborator returns a structured object outside
/// the rubric contract. The engine never persists such an object as-is; it
/// falls back to the conservative default qualification instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreValidationError {
    #[error("missing component score '{component}'")]
    MissingComponent { component: &'static str },
    #[error("component score '{component}' = {value} outside 0..={max}")]
    ComponentOutOfRange {
        component: &'static str,
        value: i64,
        max: u8,
    },
    #[error("bonus_points = {value} is not an additive combination of +20/+10")]
    BonusOutOfRange { value: i64 },
    #[error("capacity_penalty = {value} must be 0 or -15")]
    PenaltyOutOfRange { value: i64 },
}

fn component_in_range(
    component: &'static str,
    value: Option<i64>,
    max: u8,
) -> Result<u8, ScoreValidationError> {
    let value = value.ok_or(ScoreValidationError::MissingComponent { component })?;
    if (0..=max as i64).contains(&value) {
        Ok(value as u8)
    } else {
        Err(ScoreValidationError::ComponentOutOfRange {
            component,
            value,
            max,
        })
    }
}

pub(crate) fn validate_components(
    assessment: &CollaboratorAssessment,
) -> Result<ComponentScores, ScoreValidationError> {
    Ok(ComponentScores {
        strategic_fit: component_in_range(
            "strategic_fit_score",
            assessment.strategic_fit_score,
            ComponentScores::STRATEGIC_FIT_MAX,
        )?,
        win_probability: component_in_range(
            "win_probability_score",
            assessment.win_probability_score,
            ComponentScores::WIN_PROBABILITY_MAX,
        )?,
        resource_efficiency: component_in_range(
            "resource_efficiency_score",
            assessment.resource_efficiency_score,
            ComponentScores::RESOURCE_EFFICIENCY_MAX,
        )?,
        strategic_value: component_in_range(
            "strategic_value_score",
            assessment.strategic_value_score,
            ComponentScores::STRATEGIC_VALUE_MAX,
        )?,
    })
}

/// The bonus is additive over the +20 intersectional and +10 large-award
/// components, so only the four subset sums are admissible.
pub(crate) fn validate_bonus(
    assessment: &CollaboratorAssessment,
) -> Result<i16, ScoreValidationError> {
    let value = assessment.bonus_points.unwrap_or(0);
    let admissible = [
        0,
        LARGE_AWARD_BONUS as i64,
        INTERSECTIONAL_BONUS as i64,
        (INTERSECTIONAL_BONUS + LARGE_AWARD_BONUS) as i64,
    ];
    if admissible.contains(&value) {
        Ok(value as i16)
    } else {
        Err(ScoreValidationError::BonusOutOfRange { value })
    }
}

/// Capacity is an organizational-bandwidth signal, not an opportunity
/// signal. When a profile is available the penalty is re-derived from its
/// active proposal count and the collaborator's claim is ignored; without a
/// profile the claim is validated and kept.
pub(crate) fn capacity_penalty(
    assessment: &CollaboratorAssessment,
    profile: Option<&CompanyProfile>,
    config: &ScoringConfig,
) -> Result<i16, ScoreValidationError> {
    if let Some(profile) = profile {
        return Ok(if profile.active_proposal_count > config.capacity_ceiling {
            CAPACITY_PENALTY
        } else {
            0
        });
    }

    let claimed = assessment.capacity_penalty.unwrap_or(0);
    if claimed == 0 || claimed == CAPACITY_PENALTY as i64 {
        Ok(claimed as i16)
    } else {
        Err(ScoreValidationError::PenaltyOutOfRange { value: claimed })
    }
}
