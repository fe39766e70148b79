mod config;
mod policy;
mod rules;

pub use config::ScoringConfig;
pub use rules::ScoreValidationError;

use super::domain::{CompanyProfile, ComponentScores, Decision};
use super::providers::CollaboratorAssessment;
use serde::{Deserialize, Serialize};

/// Stateless policy that turns a collaborator assessment into a validated,
/// deterministically recomputed qualification.
///
/// The upstream assessment may come from a non-deterministic generator; this
/// engine never trusts its `total_score` or `decision`, recomputing both from
/// the validated components, bonus, and penalty. The arithmetic is pure:
/// identical inputs always produce identical outputs.
pub struct QualificationEngine {
    config: ScoringConfig,
}

impl QualificationEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Validate and recompute, falling back to the conservative default
    /// qualification when the assessment violates the rubric contract, so a
    /// malformed AI response still surfaces for manual review instead of
    /// disappearing.
    pub fn qualify(
        &self,
        assessment: &CollaboratorAssessment,
        profile: Option<&CompanyProfile>,
    ) -> Qualification {
        match self.validate(assessment, profile) {
            Ok(qualification) => qualification,
            Err(error) => Self::fallback(error),
        }
    }

    /// Strict variant: surfaces the validation failure instead of the
    /// fallback record.
    pub fn validate(
        &self,
        assessment: &CollaboratorAssessment,
        profile: Option<&CompanyProfile>,
    ) -> Result<Qualification, ScoreValidationError> {
        let scores = rules::validate_components(assessment)?;
        let bonus_points = rules::validate_bonus(assessment)?;
        let capacity_penalty = rules::capacity_penalty(assessment, profile, &self.config)?;

        let total_score = scores.sum() + bonus_points + capacity_penalty;
        let decision = policy::decide(total_score);

        Ok(Qualification {
            scores,
            bonus_points,
            capacity_penalty,
            total_score,
            decision,
            match_reasons: assessment.match_reasons.clone(),
            risks: assessment.risks.clone(),
        })
    }

    pub(crate) fn fallback(error: ScoreValidationError) -> Qualification {
        let scores = ComponentScores {
            strategic_fit: 20,
            win_probability: 15,
            resource_efficiency: 12,
            strategic_value: 8,
        };
        let total_score = scores.sum();

        Qualification {
            scores,
            bonus_points: 0,
            capacity_penalty: 0,
            total_score,
            decision: policy::decide(total_score),
            match_reasons: vec![
                "Unable to fully analyze; manual review recommended".to_string()
            ],
            risks: vec!["AI analysis incomplete".to_string(), error.to_string()],
        }
    }
}

/// Validated scoring result: components, adjustments, recomputed total, and
/// the decision bucket, with the collaborator's human-readable trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qualification {
    pub scores: ComponentScores,
    pub bonus_points: i16,
    pub capacity_penalty: i16,
    pub total_score: i16,
    pub decision: Decision,
    pub match_reasons: Vec<String>,
    pub risks: Vec<String>,
}
