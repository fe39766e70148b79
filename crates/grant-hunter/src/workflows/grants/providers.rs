use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationId, CompanyProfile, DiscoveredGrant, RawOpportunity, SearchFilters, SectionKind,
};

/// Failure reported by an external collaborator (search, scoring, or draft
/// generation). Recoverable from the caller's perspective; the core performs
/// no automatic retries but keeps every write idempotent so manual retries
/// are safe.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("malformed collaborator response: {0}")]
    Malformed(String),
}

/// Result set returned by the search collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub grants: Vec<DiscoveredGrant>,
    #[serde(default)]
    pub citations: Vec<String>,
}

/// External grant discovery (LLM-backed web search in production).
pub trait SearchProvider: Send + Sync {
    fn search(&self, query: &str, filters: &SearchFilters)
        -> Result<SearchOutcome, ProviderError>;
}

/// Structured qualification object returned by the scoring collaborator.
///
/// Every numeric field is optional so that an incomplete payload still
/// deserializes and is rejected by validation rather than by the JSON layer.
/// `total_score` and `decision` are advisory only; the engine recomputes
/// both and never persists the supplied values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollaboratorAssessment {
    #[serde(default)]
    pub strategic_fit_score: Option<i64>,
    #[serde(default)]
    pub win_probability_score: Option<i64>,
    #[serde(default)]
    pub resource_efficiency_score: Option<i64>,
    #[serde(default)]
    pub strategic_value_score: Option<i64>,
    #[serde(default)]
    pub bonus_points: Option<i64>,
    #[serde(default)]
    pub capacity_penalty: Option<i64>,
    #[serde(default)]
    pub total_score: Option<i64>,
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub match_reasons: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
}

/// External qualification scoring (LLM-backed in production).
pub trait ScoringProvider: Send + Sync {
    fn assess(
        &self,
        opportunity: &RawOpportunity,
        profile: Option<&CompanyProfile>,
    ) -> Result<CollaboratorAssessment, ProviderError>;
}

/// Fixed context forwarded to the draft collaborator alongside the section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftContext {
    pub title: String,
    #[serde(default)]
    pub agency: Option<String>,
    #[serde(default)]
    pub amount_text: Option<String>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
}

/// Request for one section draft. The section is validated against the
/// closed set before this request is ever constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRequest {
    pub application_id: ApplicationId,
    pub section: SectionKind,
    pub context: DraftContext,
}

/// External proposal-section text generation; returned text is stored
/// verbatim.
pub trait DraftWriter: Send + Sync {
    fn draft(&self, request: &DraftRequest) -> Result<String, ProviderError>;
}
