use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Value;

use crate::workflows::grants::domain::{
    Application, ApplicationId, ApplicationStatus, CompanyProfile, ComponentScores, Decision,
    DiscoveredGrant, HitlStatus, RawOpportunity, RawOpportunityId, ScoredOpportunity,
    ScoredOpportunityId, SearchFilters, UserId,
};
use crate::workflows::grants::providers::{
    CollaboratorAssessment, DraftRequest, DraftWriter, ProviderError, ScoringProvider,
    SearchOutcome, SearchProvider,
};
use crate::workflows::grants::qualification::{QualificationEngine, ScoringConfig};
use crate::workflows::grants::repository::{
    ApplicationRepository, NewRawOpportunity, NewScoredOpportunity, OpportunityRepository,
    ProfileRepository, RepositoryError,
};
use crate::workflows::grants::router::{grants_router, GrantServices};
use crate::workflows::grants::service::{ApplicationService, DiscoveryService, TriageService};

pub(super) fn user() -> UserId {
    UserId("user-001".to_string())
}

pub(super) fn engine() -> QualificationEngine {
    QualificationEngine::new(ScoringConfig::default())
}

/// Assessment with explicit component scores and no adjustments.
pub(super) fn assessment(fit: i64, win: i64, efficiency: i64, value: i64) -> CollaboratorAssessment {
    CollaboratorAssessment {
        strategic_fit_score: Some(fit),
        win_probability_score: Some(win),
        resource_efficiency_score: Some(efficiency),
        strategic_value_score: Some(value),
        bonus_points: Some(0),
        capacity_penalty: Some(0),
        total_score: None,
        decision: None,
        match_reasons: vec!["strong technical alignment".to_string()],
        risks: vec!["cost-share required".to_string()],
    }
}

pub(super) fn profile_with_proposals(active_proposal_count: u32) -> CompanyProfile {
    CompanyProfile {
        name: "Crystalline Recovery Labs".to_string(),
        sectors: vec![
            "lithium recycling".to_string(),
            "critical minerals".to_string(),
        ],
        keywords: vec![
            "autism employment".to_string(),
            "clean water".to_string(),
        ],
        cost_share_capacity: Some(250_000),
        geographic_priorities: vec!["USA".to_string(), "EU".to_string()],
        active_proposal_count,
        team_credentials: Value::Null,
    }
}

pub(super) fn grant(title: &str, agency: &str) -> DiscoveredGrant {
    DiscoveredGrant {
        title: title.to_string(),
        agency: Some(agency.to_string()),
        amount_text: Some("$1M - $5M".to_string()),
        amount_min: Some(1_000_000),
        amount_max: Some(5_000_000),
        deadline: None,
        deadline_text: Some("Rolling".to_string()),
        description: Some("Battery materials recovery pilot".to_string()),
        eligibility: Some("US small businesses".to_string()),
        source_url: Some("https://grants.example.gov/123".to_string()),
        external_id: None,
    }
}

pub(super) fn scored_record(
    id: &str,
    total_score: i16,
    decision: Decision,
    hitl_status: HitlStatus,
) -> ScoredOpportunity {
    let now = Utc::now();
    ScoredOpportunity {
        id: ScoredOpportunityId(id.to_string()),
        user_id: user(),
        opportunity_raw_id: RawOpportunityId(format!("{id}-raw")),
        scores: ComponentScores {
            strategic_fit: 30,
            win_probability: 20,
            resource_efficiency: 15,
            strategic_value: 8,
        },
        bonus_points: 0,
        capacity_penalty: 0,
        total_score,
        decision,
        hitl_status,
        match_reasons: Vec::new(),
        risks: Vec::new(),
        scoring_details: Value::Null,
        snoozed_until: None,
        created_at: now,
        updated_at: now,
    }
}

pub(super) fn draft_application(id: &str) -> Application {
    let now = Utc::now();
    Application {
        id: ApplicationId(id.to_string()),
        user_id: user(),
        opportunity_scored_id: ScoredOpportunityId(format!("{id}-scored")),
        status: ApplicationStatus::Draft,
        content_sections: Application::empty_sections(),
        team_members: Vec::new(),
        notes: None,
        submitted_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// In-memory store backing all three repository traits, with the same
/// unique-key upsert semantics the production adapter provides.
#[derive(Default)]
pub(super) struct MemoryStore {
    raw: Mutex<Vec<RawOpportunity>>,
    scored: Mutex<Vec<ScoredOpportunity>>,
    profiles: Mutex<HashMap<UserId, CompanyProfile>>,
    applications: Mutex<Vec<Application>>,
}

impl MemoryStore {
    pub(super) fn raw_count(&self) -> usize {
        self.raw.lock().expect("store mutex poisoned").len()
    }

    pub(super) fn scored_count(&self) -> usize {
        self.scored.lock().expect("store mutex poisoned").len()
    }

    pub(super) fn application_count(&self) -> usize {
        self.applications.lock().expect("store mutex poisoned").len()
    }

    pub(super) fn seed_scored(&self, record: ScoredOpportunity) {
        self.scored.lock().expect("store mutex poisoned").push(record);
    }

    pub(super) fn seed_application(&self, application: Application) {
        self.applications
            .lock()
            .expect("store mutex poisoned")
            .push(application);
    }
}

impl OpportunityRepository for MemoryStore {
    fn upsert_raw(&self, record: NewRawOpportunity) -> Result<RawOpportunity, RepositoryError> {
        let mut guard = self.raw.lock().expect("store mutex poisoned");
        if let Some(existing) = guard
            .iter_mut()
            .find(|raw| raw.source == record.source && raw.external_id == record.external_id)
        {
            existing.title = record.title;
            existing.agency = record.agency;
            existing.amount_min = record.amount_min;
            existing.amount_max = record.amount_max;
            existing.amount_text = record.amount_text;
            existing.deadline = record.deadline;
            existing.description = record.description;
            existing.eligibility = record.eligibility;
            existing.source_url = record.source_url;
            existing.raw_data = record.raw_data;
            return Ok(existing.clone());
        }

        let stored = RawOpportunity {
            id: record.id,
            source: record.source,
            external_id: record.external_id,
            title: record.title,
            agency: record.agency,
            amount_min: record.amount_min,
            amount_max: record.amount_max,
            amount_text: record.amount_text,
            deadline: record.deadline,
            description: record.description,
            eligibility: record.eligibility,
            source_url: record.source_url,
            raw_data: record.raw_data,
            is_processed: false,
            created_at: Utc::now(),
        };
        guard.push(stored.clone());
        Ok(stored)
    }

    fn fetch_raw(&self, id: &RawOpportunityId) -> Result<Option<RawOpportunity>, RepositoryError> {
        let guard = self.raw.lock().expect("store mutex poisoned");
        Ok(guard.iter().find(|raw| &raw.id == id).cloned())
    }

    fn mark_processed(&self, id: &RawOpportunityId) -> Result<(), RepositoryError> {
        let mut guard = self.raw.lock().expect("store mutex poisoned");
        let raw = guard
            .iter_mut()
            .find(|raw| &raw.id == id)
            .ok_or(RepositoryError::NotFound)?;
        raw.is_processed = true;
        Ok(())
    }

    fn upsert_scored(
        &self,
        record: NewScoredOpportunity,
    ) -> Result<ScoredOpportunity, RepositoryError> {
        let mut guard = self.scored.lock().expect("store mutex poisoned");
        let now = Utc::now();

        if let Some(existing) = guard.iter_mut().find(|scored| {
            scored.user_id == record.user_id
                && scored.opportunity_raw_id == record.opportunity_raw_id
        }) {
            existing.scores = record.qualification.scores;
            existing.bonus_points = record.qualification.bonus_points;
            existing.capacity_penalty = record.qualification.capacity_penalty;
            existing.total_score = record.qualification.total_score;
            existing.decision = record.qualification.decision;
            existing.hitl_status = HitlStatus::Pending;
            existing.match_reasons = record.qualification.match_reasons;
            existing.risks = record.qualification.risks;
            existing.scoring_details = record.scoring_details;
            existing.snoozed_until = None;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let stored = ScoredOpportunity {
            id: record.id,
            user_id: record.user_id,
            opportunity_raw_id: record.opportunity_raw_id,
            scores: record.qualification.scores,
            bonus_points: record.qualification.bonus_points,
            capacity_penalty: record.qualification.capacity_penalty,
            total_score: record.qualification.total_score,
            decision: record.qualification.decision,
            hitl_status: HitlStatus::Pending,
            match_reasons: record.qualification.match_reasons,
            risks: record.qualification.risks,
            scoring_details: record.scoring_details,
            snoozed_until: None,
            created_at: now,
            updated_at: now,
        };
        guard.push(stored.clone());
        Ok(stored)
    }

    fn fetch_scored(
        &self,
        user: &UserId,
        id: &ScoredOpportunityId,
    ) -> Result<Option<ScoredOpportunity>, RepositoryError> {
        let guard = self.scored.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .find(|scored| &scored.user_id == user && &scored.id == id)
            .cloned())
    }

    fn update_scored(&self, record: ScoredOpportunity) -> Result<(), RepositoryError> {
        let mut guard = self.scored.lock().expect("store mutex poisoned");
        let existing = guard
            .iter_mut()
            .find(|scored| scored.user_id == record.user_id && scored.id == record.id)
            .ok_or(RepositoryError::NotFound)?;
        *existing = record;
        Ok(())
    }

    fn scored_for_user(&self, user: &UserId) -> Result<Vec<ScoredOpportunity>, RepositoryError> {
        let guard = self.scored.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .filter(|scored| &scored.user_id == user)
            .cloned()
            .collect())
    }
}

impl ProfileRepository for MemoryStore {
    fn fetch_profile(&self, user: &UserId) -> Result<Option<CompanyProfile>, RepositoryError> {
        let guard = self.profiles.lock().expect("store mutex poisoned");
        Ok(guard.get(user).cloned())
    }

    fn store_profile(
        &self,
        user: &UserId,
        profile: CompanyProfile,
    ) -> Result<CompanyProfile, RepositoryError> {
        let mut guard = self.profiles.lock().expect("store mutex poisoned");
        guard.insert(user.clone(), profile.clone());
        Ok(profile)
    }
}

impl ApplicationRepository for MemoryStore {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        let mut guard = self.applications.lock().expect("store mutex poisoned");
        let duplicate = guard.iter().any(|existing| {
            existing.id == application.id
                || (existing.user_id == application.user_id
                    && existing.opportunity_scored_id == application.opportunity_scored_id)
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        guard.push(application.clone());
        Ok(application)
    }

    fn fetch(
        &self,
        user: &UserId,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        let guard = self.applications.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .find(|app| &app.user_id == user && &app.id == id)
            .cloned())
    }

    fn find_by_scored(
        &self,
        user: &UserId,
        scored: &ScoredOpportunityId,
    ) -> Result<Option<Application>, RepositoryError> {
        let guard = self.applications.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .find(|app| &app.user_id == user && &app.opportunity_scored_id == scored)
            .cloned())
    }

    fn update(&self, application: Application) -> Result<(), RepositoryError> {
        let mut guard = self.applications.lock().expect("store mutex poisoned");
        let existing = guard
            .iter_mut()
            .find(|app| app.user_id == application.user_id && app.id == application.id)
            .ok_or(RepositoryError::NotFound)?;
        *existing = application;
        Ok(())
    }

    fn for_user(&self, user: &UserId) -> Result<Vec<Application>, RepositoryError> {
        let guard = self.applications.lock().expect("store mutex poisoned");
        Ok(guard
            .iter()
            .filter(|app| &app.user_id == user)
            .cloned()
            .collect())
    }
}

/// Application store whose inserts always fail, for exercising the
/// approval-incomplete path.
#[derive(Default)]
pub(super) struct RefusingApplications {
    inner: MemoryStore,
}

impl ApplicationRepository for RefusingApplications {
    fn insert(&self, _application: Application) -> Result<Application, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(
        &self,
        user: &UserId,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        self.inner.fetch(user, id)
    }

    fn find_by_scored(
        &self,
        user: &UserId,
        scored: &ScoredOpportunityId,
    ) -> Result<Option<Application>, RepositoryError> {
        self.inner.find_by_scored(user, scored)
    }

    fn update(&self, application: Application) -> Result<(), RepositoryError> {
        self.inner.update(application)
    }

    fn for_user(&self, user: &UserId) -> Result<Vec<Application>, RepositoryError> {
        self.inner.for_user(user)
    }
}

/// Search collaborator returning a fixed result set.
pub(super) struct StaticSearch {
    pub(super) outcome: SearchOutcome,
}

impl SearchProvider for StaticSearch {
    fn search(
        &self,
        _query: &str,
        _filters: &SearchFilters,
    ) -> Result<SearchOutcome, ProviderError> {
        Ok(self.outcome.clone())
    }
}

/// Search collaborator that is unreachable.
pub(super) struct UnavailableSearch;

impl SearchProvider for UnavailableSearch {
    fn search(
        &self,
        _query: &str,
        _filters: &SearchFilters,
    ) -> Result<SearchOutcome, ProviderError> {
        Err(ProviderError::Unavailable("search gateway timed out".to_string()))
    }
}

/// Scoring collaborator replaying per-title assessments, with an optional
/// title whose call fails outright.
#[derive(Default)]
pub(super) struct ScriptedScorer {
    pub(super) by_title: HashMap<String, CollaboratorAssessment>,
    pub(super) default: CollaboratorAssessment,
    pub(super) fail_title: Option<String>,
}

impl ScoringProvider for ScriptedScorer {
    fn assess(
        &self,
        opportunity: &RawOpportunity,
        _profile: Option<&CompanyProfile>,
    ) -> Result<CollaboratorAssessment, ProviderError> {
        if self.fail_title.as_deref() == Some(opportunity.title.as_str()) {
            return Err(ProviderError::Unavailable(
                "scoring gateway timed out".to_string(),
            ));
        }
        Ok(self
            .by_title
            .get(&opportunity.title)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}

/// Draft collaborator echoing a deterministic body per request.
#[derive(Default)]
pub(super) struct RecordingWriter {
    pub(super) requests: Mutex<Vec<DraftRequest>>,
}

impl DraftWriter for RecordingWriter {
    fn draft(&self, request: &DraftRequest) -> Result<String, ProviderError> {
        self.requests
            .lock()
            .expect("writer mutex poisoned")
            .push(request.clone());
        Ok(format!(
            "Draft {} for {}",
            request.section.label(),
            request.context.title
        ))
    }
}

pub(super) type TestDiscovery = DiscoveryService<MemoryStore, StaticSearch, ScriptedScorer>;
pub(super) type TestTriage = TriageService<MemoryStore, MemoryStore>;
pub(super) type TestApplications = ApplicationService<MemoryStore, RecordingWriter>;

pub(super) struct TestHarness {
    pub(super) store: Arc<MemoryStore>,
    pub(super) writer: Arc<RecordingWriter>,
    pub(super) discovery: Arc<TestDiscovery>,
    pub(super) triage: Arc<TestTriage>,
    pub(super) applications: Arc<TestApplications>,
}

pub(super) fn harness(search: StaticSearch, scorer: ScriptedScorer) -> TestHarness {
    let store = Arc::new(MemoryStore::default());
    let writer = Arc::new(RecordingWriter::default());

    let discovery = Arc::new(DiscoveryService::new(
        store.clone(),
        Arc::new(search),
        Arc::new(scorer),
        engine(),
    ));
    let triage = Arc::new(TriageService::new(store.clone(), store.clone()));
    let applications = Arc::new(ApplicationService::new(store.clone(), writer.clone()));

    TestHarness {
        store,
        writer,
        discovery,
        triage,
        applications,
    }
}

pub(super) fn default_harness() -> TestHarness {
    harness(
        StaticSearch {
            outcome: SearchOutcome {
                grants: vec![grant(
                    "Lithium Battery Recycling Prize",
                    "Department of Energy",
                )],
                citations: vec!["https://grants.example.gov/123".to_string()],
            },
        },
        ScriptedScorer {
            default: assessment(30, 20, 15, 8),
            ..ScriptedScorer::default()
        },
    )
}

pub(super) fn router_for(harness: &TestHarness) -> axum::Router {
    grants_router(GrantServices {
        discovery: harness.discovery.clone(),
        triage: harness.triage.clone(),
        applications: harness.applications.clone(),
    })
}

pub(super) async fn read_json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
