use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use super::dashboard::{self, DashboardMetrics};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, CompanyProfile, DiscoveredGrant, HitlStatus,
    RawOpportunity, RawOpportunityId, ScoredOpportunity, ScoredOpportunityId, SearchFilters,
    SectionKind, UnknownSection, UserId,
};
use super::lifecycle::{self, LifecycleError};
use super::providers::{
    DraftContext, DraftRequest, DraftWriter, ProviderError, ScoringProvider, SearchProvider,
};
use super::qualification::QualificationEngine;
use super::repository::{
    ApplicationRepository, NewRawOpportunity, NewScoredOpportunity, OpportunityRepository,
    ProfileRepository, RepositoryError,
};
use super::triage::{self, ReviewAction, TriageError};

/// Error raised by the grant workflow services.
#[derive(Debug, thiserror::Error)]
pub enum GrantServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Triage(#[from] TriageError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    UnknownSection(#[from] UnknownSection),
    #[error(
        "opportunity {} is approved but its application draft could not be created; retry the approval",
        scored_id.0
    )]
    ApprovalIncomplete {
        scored_id: ScoredOpportunityId,
        #[source]
        source: RepositoryError,
    },
}

static RAW_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static SCORED_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_raw_id() -> RawOpportunityId {
    let id = RAW_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RawOpportunityId(format!("raw-{id:06}"))
}

fn next_scored_id() -> ScoredOpportunityId {
    let id = SCORED_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ScoredOpportunityId(format!("scored-{id:06}"))
}

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

/// One entry of a discovery batch. Failures are isolated per item: a grant
/// that could not be stored or scored reports its error here without
/// aborting the rest of the batch.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryItem {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opportunity_raw_id: Option<RawOpportunityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scored: Option<ScoredOpportunity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one search-and-qualify run.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub query: String,
    pub citations: Vec<String>,
    pub items: Vec<DiscoveryItem>,
}

/// Service running the discovery pipeline: search once, then sequentially
/// upsert and qualify each discovered grant (the scored upsert depends on
/// the id produced by the raw upsert, so per-opportunity ordering is
/// strict).
pub struct DiscoveryService<R, S, Q> {
    repository: Arc<R>,
    search: Arc<S>,
    scoring: Arc<Q>,
    engine: QualificationEngine,
}

impl<R, S, Q> DiscoveryService<R, S, Q>
where
    R: OpportunityRepository + ProfileRepository + 'static,
    S: SearchProvider + 'static,
    Q: ScoringProvider + 'static,
{
    pub fn new(repository: Arc<R>, search: Arc<S>, scoring: Arc<Q>, engine: QualificationEngine) -> Self {
        Self {
            repository,
            search,
            scoring,
            engine,
        }
    }

    /// Run a search and qualify every result for the given user. Search
    /// failure aborts the run (recoverable for the caller); per-item
    /// failures do not.
    pub fn discover(
        &self,
        user: &UserId,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<DiscoveryReport, GrantServiceError> {
        let outcome = self.search.search(query, filters)?;

        let items = outcome
            .grants
            .into_iter()
            .map(|grant| self.ingest_one(user, grant))
            .collect();

        Ok(DiscoveryReport {
            query: query.to_string(),
            citations: outcome.citations,
            items,
        })
    }

    fn ingest_one(&self, user: &UserId, grant: DiscoveredGrant) -> DiscoveryItem {
        let title = grant.title.clone();

        let raw = match self.upsert_raw(grant) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%title, %error, "failed to store discovered opportunity");
                return DiscoveryItem {
                    title,
                    opportunity_raw_id: None,
                    scored: None,
                    error: Some(error.to_string()),
                };
            }
        };

        match self.score_raw(user, &raw) {
            Ok(scored) => DiscoveryItem {
                title,
                opportunity_raw_id: Some(raw.id),
                scored: Some(scored),
                error: None,
            },
            Err(error) => {
                warn!(%title, %error, "failed to qualify discovered opportunity");
                DiscoveryItem {
                    title,
                    opportunity_raw_id: Some(raw.id),
                    scored: None,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    /// Re-run qualification for an already-stored raw opportunity,
    /// overwriting the user's prior scored record.
    pub fn rescore(
        &self,
        user: &UserId,
        raw_id: &RawOpportunityId,
    ) -> Result<ScoredOpportunity, GrantServiceError> {
        let raw = self
            .repository
            .fetch_raw(raw_id)?
            .ok_or(RepositoryError::NotFound)?;
        self.score_raw(user, &raw)
    }

    pub fn profile(&self, user: &UserId) -> Result<Option<CompanyProfile>, GrantServiceError> {
        Ok(self.repository.fetch_profile(user)?)
    }

    pub fn store_profile(
        &self,
        user: &UserId,
        profile: CompanyProfile,
    ) -> Result<CompanyProfile, GrantServiceError> {
        Ok(self.repository.store_profile(user, profile)?)
    }

    fn upsert_raw(&self, grant: DiscoveredGrant) -> Result<RawOpportunity, RepositoryError> {
        let external_id = grant.derived_external_id();
        let raw_data = json!({ "deadline_text": grant.deadline_text });

        self.repository.upsert_raw(NewRawOpportunity {
            id: next_raw_id(),
            source: "perplexity".to_string(),
            external_id,
            title: grant.title,
            agency: grant.agency,
            amount_min: grant.amount_min,
            amount_max: grant.amount_max,
            amount_text: grant.amount_text,
            deadline: grant.deadline,
            description: grant.description,
            eligibility: grant.eligibility,
            source_url: grant.source_url,
            raw_data,
        })
    }

    fn score_raw(
        &self,
        user: &UserId,
        raw: &RawOpportunity,
    ) -> Result<ScoredOpportunity, GrantServiceError> {
        let profile = self.repository.fetch_profile(user)?;
        let assessment = self.scoring.assess(raw, profile.as_ref())?;

        let qualification = match self.engine.validate(&assessment, profile.as_ref()) {
            Ok(qualification) => qualification,
            Err(error) => {
                warn!(raw_id = %raw.id.0, %error, "scoring output rejected, storing conservative fallback");
                QualificationEngine::fallback(error)
            }
        };

        let scoring_details = json!({
            "assessment": assessment,
            "recomputed": qualification,
        });

        let scored = self.repository.upsert_scored(NewScoredOpportunity {
            id: next_scored_id(),
            user_id: user.clone(),
            opportunity_raw_id: raw.id.clone(),
            qualification,
            scoring_details,
        })?;

        self.repository.mark_processed(&raw.id)?;
        Ok(scored)
    }
}

/// One review-queue entry joined with its discovered opportunity.
#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    pub opportunity: ScoredOpportunity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawOpportunity>,
}

/// Result of a reviewer action. `application` is populated on approval.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutcome {
    pub opportunity: ScoredOpportunity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<Application>,
}

/// Service applying reviewer decisions over scored opportunities and
/// owning the approval -> application-draft unit of work.
pub struct TriageService<R, A> {
    repository: Arc<R>,
    applications: Arc<A>,
}

impl<R, A> TriageService<R, A>
where
    R: OpportunityRepository + 'static,
    A: ApplicationRepository + 'static,
{
    pub fn new(repository: Arc<R>, applications: Arc<A>) -> Self {
        Self {
            repository,
            applications,
        }
    }

    /// All scored records for the user, highest total first.
    pub fn list(&self, user: &UserId) -> Result<Vec<ScoredOpportunity>, GrantServiceError> {
        let mut records = self.repository.scored_for_user(user)?;
        records.sort_by(|a, b| b.total_score.cmp(&a.total_score));
        Ok(records)
    }

    /// Actionable records only (pending, or snoozed past their horizon),
    /// joined with the underlying raw opportunity, highest total first.
    pub fn inbox(&self, user: &UserId) -> Result<Vec<InboxEntry>, GrantServiceError> {
        let now = Utc::now();
        let mut records: Vec<ScoredOpportunity> = self
            .repository
            .scored_for_user(user)?
            .into_iter()
            .filter(|record| record.is_actionable(now))
            .collect();
        records.sort_by(|a, b| b.total_score.cmp(&a.total_score));

        let mut entries = Vec::with_capacity(records.len());
        for opportunity in records {
            let raw = self.repository.fetch_raw(&opportunity.opportunity_raw_id)?;
            entries.push(InboxEntry { opportunity, raw });
        }
        Ok(entries)
    }

    /// Apply a reviewer action. Approval and draft creation form one unit of
    /// work: when the draft insert fails after the status flip, the caller
    /// receives a retryable `ApprovalIncomplete` and a repeated approval
    /// repairs the missing draft instead of duplicating anything.
    pub fn review(
        &self,
        user: &UserId,
        id: &ScoredOpportunityId,
        action: &ReviewAction,
    ) -> Result<ReviewOutcome, GrantServiceError> {
        let mut record = self
            .repository
            .fetch_scored(user, id)?
            .ok_or(RepositoryError::NotFound)?;

        let already_approved =
            record.hitl_status == HitlStatus::Approved && matches!(action, ReviewAction::Approve);

        if !already_approved {
            triage::apply_action(&mut record, action, Utc::now())?;
            self.repository.update_scored(record.clone())?;
        }

        let application = if matches!(action, ReviewAction::Approve) {
            Some(self.ensure_application(user, &record.id)?)
        } else {
            None
        };

        Ok(ReviewOutcome {
            opportunity: record,
            application,
        })
    }

    pub fn metrics(&self, user: &UserId) -> Result<DashboardMetrics, GrantServiceError> {
        let records = self.repository.scored_for_user(user)?;
        Ok(dashboard::metrics(records.iter()))
    }

    fn ensure_application(
        &self,
        user: &UserId,
        scored_id: &ScoredOpportunityId,
    ) -> Result<Application, GrantServiceError> {
        if let Some(existing) = self.applications.find_by_scored(user, scored_id)? {
            return Ok(existing);
        }

        let now = Utc::now();
        let draft = Application {
            id: next_application_id(),
            user_id: user.clone(),
            opportunity_scored_id: scored_id.clone(),
            status: ApplicationStatus::Draft,
            content_sections: Application::empty_sections(),
            team_members: Vec::new(),
            notes: None,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        };

        match self.applications.insert(draft) {
            Ok(application) => Ok(application),
            Err(RepositoryError::Conflict) => self
                .applications
                .find_by_scored(user, scored_id)?
                .ok_or_else(|| GrantServiceError::ApprovalIncomplete {
                    scored_id: scored_id.clone(),
                    source: RepositoryError::Conflict,
                }),
            Err(source) => Err(GrantServiceError::ApprovalIncomplete {
                scored_id: scored_id.clone(),
                source,
            }),
        }
    }
}

/// Service advancing drafted applications and routing section drafts to the
/// writing collaborator.
pub struct ApplicationService<A, W> {
    applications: Arc<A>,
    writer: Arc<W>,
}

impl<A, W> ApplicationService<A, W>
where
    A: ApplicationRepository + 'static,
    W: DraftWriter + 'static,
{
    pub fn new(applications: Arc<A>, writer: Arc<W>) -> Self {
        Self {
            applications,
            writer,
        }
    }

    pub fn get(&self, user: &UserId, id: &ApplicationId) -> Result<Application, GrantServiceError> {
        Ok(self
            .applications
            .fetch(user, id)?
            .ok_or(RepositoryError::NotFound)?)
    }

    /// All of a user's applications, most recently touched first.
    pub fn list(&self, user: &UserId) -> Result<Vec<Application>, GrantServiceError> {
        let mut applications = self.applications.for_user(user)?;
        applications.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(applications)
    }

    pub fn advance(
        &self,
        user: &UserId,
        id: &ApplicationId,
        next: ApplicationStatus,
    ) -> Result<Application, GrantServiceError> {
        let mut application = self.get(user, id)?;
        match lifecycle::advance_status(&mut application, next, Utc::now())? {
            lifecycle::StatusChange::Advanced => {
                self.applications.update(application.clone())?;
            }
            lifecycle::StatusChange::Unchanged => {}
        }
        Ok(application)
    }

    /// Overwrite the supplied sections verbatim; keys outside the closed
    /// section set never reach this point (rejected at deserialization).
    pub fn update_sections(
        &self,
        user: &UserId,
        id: &ApplicationId,
        sections: std::collections::BTreeMap<SectionKind, String>,
    ) -> Result<Application, GrantServiceError> {
        let mut application = self.get(user, id)?;
        let now = Utc::now();
        for (section, text) in sections {
            lifecycle::set_section(&mut application, section, text, now);
        }
        self.applications.update(application.clone())?;
        Ok(application)
    }

    /// Request a section draft from the writing collaborator and store the
    /// returned text verbatim. The section identifier has already been
    /// validated against the closed set before this call.
    pub fn draft_section(
        &self,
        user: &UserId,
        id: &ApplicationId,
        section: SectionKind,
        context: DraftContext,
    ) -> Result<Application, GrantServiceError> {
        let mut application = self.get(user, id)?;

        let text = self.writer.draft(&DraftRequest {
            application_id: application.id.clone(),
            section,
            context,
        })?;

        lifecycle::set_section(&mut application, section, text, Utc::now());
        self.applications.update(application.clone())?;
        Ok(application)
    }
}
