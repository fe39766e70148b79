use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    Application, ApplicationId, CompanyProfile, RawOpportunity, RawOpportunityId,
    ScoredOpportunity, ScoredOpportunityId, UserId,
};
use super::qualification::Qualification;

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Insert payload for a raw-opportunity upsert. The id is a candidate: when
/// a record with the same (source, external_id) already exists, the store
/// keeps the existing id and refreshes the discovered fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRawOpportunity {
    pub id: RawOpportunityId,
    pub source: String,
    pub external_id: String,
    pub title: String,
    pub agency: Option<String>,
    pub amount_min: Option<u64>,
    pub amount_max: Option<u64>,
    pub amount_text: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub description: Option<String>,
    pub eligibility: Option<String>,
    pub source_url: Option<String>,
    pub raw_data: serde_json::Value,
}

/// Insert payload for a scored-opportunity upsert, keyed by
/// (user, opportunity_raw_id). Re-scoring overwrites the prior record while
/// keeping its id; hitl review state starts over at pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewScoredOpportunity {
    pub id: ScoredOpportunityId,
    pub user_id: UserId,
    pub opportunity_raw_id: RawOpportunityId,
    pub qualification: Qualification,
    pub scoring_details: serde_json::Value,
}

/// Storage boundary for discovered and scored opportunities. Raw
/// opportunities are shared across users; scored records are row-isolated by
/// their owning user.
pub trait OpportunityRepository: Send + Sync {
    fn upsert_raw(&self, record: NewRawOpportunity) -> Result<RawOpportunity, RepositoryError>;
    fn fetch_raw(&self, id: &RawOpportunityId) -> Result<Option<RawOpportunity>, RepositoryError>;
    fn mark_processed(&self, id: &RawOpportunityId) -> Result<(), RepositoryError>;

    fn upsert_scored(
        &self,
        record: NewScoredOpportunity,
    ) -> Result<ScoredOpportunity, RepositoryError>;
    fn fetch_scored(
        &self,
        user: &UserId,
        id: &ScoredOpportunityId,
    ) -> Result<Option<ScoredOpportunity>, RepositoryError>;
    fn update_scored(&self, record: ScoredOpportunity) -> Result<(), RepositoryError>;
    fn scored_for_user(&self, user: &UserId) -> Result<Vec<ScoredOpportunity>, RepositoryError>;
}

/// Per-user scoring context storage.
pub trait ProfileRepository: Send + Sync {
    fn fetch_profile(&self, user: &UserId) -> Result<Option<CompanyProfile>, RepositoryError>;
    fn store_profile(
        &self,
        user: &UserId,
        profile: CompanyProfile,
    ) -> Result<CompanyProfile, RepositoryError>;
}

/// Storage boundary for drafted applications, row-isolated by owning user.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError>;
    fn fetch(
        &self,
        user: &UserId,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError>;
    fn find_by_scored(
        &self,
        user: &UserId,
        scored: &ScoredOpportunityId,
    ) -> Result<Option<Application>, RepositoryError>;
    fn update(&self, application: Application) -> Result<(), RepositoryError>;
    fn for_user(&self, user: &UserId) -> Result<Vec<Application>, RepositoryError>;
}
