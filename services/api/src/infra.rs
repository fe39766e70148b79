use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;

use grant_hunter::workflows::grants::{
    Application, ApplicationId, ApplicationRepository, CollaboratorAssessment, CompanyProfile,
    DiscoveredGrant, DraftRequest, DraftWriter, HitlStatus, NewRawOpportunity,
    NewScoredOpportunity, OpportunityRepository, ProfileRepository, ProviderError, RawOpportunity,
    RawOpportunityId, RepositoryError, ScoredOpportunity, ScoredOpportunityId, ScoringConfig,
    ScoringProvider, SearchFilters, SearchOutcome, SearchProvider, SectionKind, UserId,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn default_scoring_config() -> ScoringConfig {
    ScoringConfig::default()
}

/// In-memory persistence adapter backing all three repository boundaries.
/// Upserts enforce the same unique keys a relational deployment would:
/// (source, external_id) for raw records and (user, opportunity_raw_id) for
/// scored records.
#[derive(Default)]
pub(crate) struct InMemoryGrantStore {
    raw: Mutex<Vec<RawOpportunity>>,
    scored: Mutex<Vec<ScoredOpportunity>>,
    profiles: Mutex<HashMap<UserId, CompanyProfile>>,
    applications: Mutex<Vec<Application>>,
}

impl OpportunityRepository for InMemoryGrantStore {
    fn upsert_raw(&self, record: NewRawOpportunity) -> Result<RawOpportunity, RepositoryError> {
        let mut guard = self.raw.lock().expect("raw mutex poisoned");
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
        let guard = self.raw.lock().expect("raw mutex poisoned");
        Ok(guard.iter().find(|raw| &raw.id == id).cloned())
    }

    fn mark_processed(&self, id: &RawOpportunityId) -> Result<(), RepositoryError> {
        let mut guard = self.raw.lock().expect("raw mutex poisoned");
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
        let mut guard = self.scored.lock().expect("scored mutex poisoned");
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
        let guard = self.scored.lock().expect("scored mutex poisoned");
        Ok(guard
            .iter()
            .find(|scored| &scored.user_id == user && &scored.id == id)
            .cloned())
    }

    fn update_scored(&self, record: ScoredOpportunity) -> Result<(), RepositoryError> {
        let mut guard = self.scored.lock().expect("scored mutex poisoned");
        let existing = guard
            .iter_mut()
            .find(|scored| scored.user_id == record.user_id && scored.id == record.id)
            .ok_or(RepositoryError::NotFound)?;
        *existing = record;
        Ok(())
    }

    fn scored_for_user(&self, user: &UserId) -> Result<Vec<ScoredOpportunity>, RepositoryError> {
        let guard = self.scored.lock().expect("scored mutex poisoned");
        Ok(guard
            .iter()
            .filter(|scored| &scored.user_id == user)
            .cloned()
            .collect())
    }
}

impl ProfileRepository for InMemoryGrantStore {
    fn fetch_profile(&self, user: &UserId) -> Result<Option<CompanyProfile>, RepositoryError> {
        let guard = self.profiles.lock().expect("profile mutex poisoned");
        Ok(guard.get(user).cloned())
    }

    fn store_profile(
        &self,
        user: &UserId,
        profile: CompanyProfile,
    ) -> Result<CompanyProfile, RepositoryError> {
        let mut guard = self.profiles.lock().expect("profile mutex poisoned");
        guard.insert(user.clone(), profile.clone());
        Ok(profile)
    }
}

impl ApplicationRepository for InMemoryGrantStore {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        let mut guard = self.applications.lock().expect("application mutex poisoned");
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
        let guard = self.applications.lock().expect("application mutex poisoned");
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
        let guard = self.applications.lock().expect("application mutex poisoned");
        Ok(guard
            .iter()
            .find(|app| &app.user_id == user && &app.opportunity_scored_id == scored)
            .cloned())
    }

    fn update(&self, application: Application) -> Result<(), RepositoryError> {
        let mut guard = self.applications.lock().expect("application mutex poisoned");
        let existing = guard
            .iter_mut()
            .find(|app| app.user_id == application.user_id && app.id == application.id)
            .ok_or(RepositoryError::NotFound)?;
        *existing = application;
        Ok(())
    }

    fn for_user(&self, user: &UserId) -> Result<Vec<Application>, RepositoryError> {
        let guard = self.applications.lock().expect("application mutex poisoned");
        Ok(guard
            .iter()
            .filter(|app| &app.user_id == user)
            .cloned()
            .collect())
    }
}

/// Search adapter serving a fixed result set. Stands in for the LLM-backed
/// search gateway, whose transport is outside the core's scope; the record
/// shapes are identical.
pub(crate) struct CannedSearchProvider;

impl SearchProvider for CannedSearchProvider {
    fn search(
        &self,
        _query: &str,
        _filters: &SearchFilters,
    ) -> Result<SearchOutcome, ProviderError> {
        Ok(SearchOutcome {
            grants: demo_grants(),
            citations: vec![
                "https://www.grants.gov/search-results-detail/359421".to_string(),
                "https://www.energy.gov/eere/ammto/funding-opportunities".to_string(),
            ],
        })
    }
}

pub(crate) fn demo_grants() -> Vec<DiscoveredGrant> {
    vec![
        DiscoveredGrant {
            title: "Battery Materials Circular Economy Demonstration".to_string(),
            agency: Some("Department of Energy".to_string()),
            amount_text: Some("$2M - $8M".to_string()),
            amount_min: Some(2_000_000),
            amount_max: Some(8_000_000),
            deadline: None,
            deadline_text: Some("2026-11-15".to_string()),
            description: Some(
                "Closed-loop lithium recycling pilots that recover critical minerals from \
                 end-of-life batteries, with workforce partnerships favored."
                    .to_string(),
            ),
            eligibility: Some("US small businesses and research consortia".to_string()),
            source_url: Some("https://www.grants.gov/search-results-detail/359421".to_string()),
            external_id: None,
        },
        DiscoveredGrant {
            title: "Inclusive STEM Workforce Pathways".to_string(),
            agency: Some("Department of Labor".to_string()),
            amount_text: Some("$500K - $1.5M".to_string()),
            amount_min: Some(500_000),
            amount_max: Some(1_500_000),
            deadline: None,
            deadline_text: Some("Rolling".to_string()),
            description: Some(
                "Employment programs for neurodiverse and autistic adults in advanced \
                 manufacturing and laboratory roles."
                    .to_string(),
            ),
            eligibility: Some("Nonprofits and employers with training partners".to_string()),
            source_url: Some("https://www.dol.gov/agencies/eta/grants".to_string()),
            external_id: None,
        },
        DiscoveredGrant {
            title: "Rural Clean Water Infrastructure Phase 1".to_string(),
            agency: Some("Environmental Protection Agency".to_string()),
            amount_text: Some("$250K".to_string()),
            amount_min: Some(250_000),
            amount_max: Some(250_000),
            deadline: None,
            deadline_text: Some("2026-09-30".to_string()),
            description: Some(
                "Phase 1 planning grants for drinking water treatment in underserved \
                 communities; full cost share matching required."
                    .to_string(),
            ),
            eligibility: Some("Municipalities and utility districts".to_string()),
            source_url: Some("https://www.epa.gov/dwsrf".to_string()),
            external_id: None,
        },
    ]
}

/// Deterministic keyword-tier scorer producing assessments in the shape the
/// rubric expects. Stands in for the LLM-backed qualification gateway; the
/// engine still validates and recomputes everything it returns.
pub(crate) struct HeuristicScoringProvider {
    config: ScoringConfig,
}

impl HeuristicScoringProvider {
    pub(crate) fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    fn haystack(opportunity: &RawOpportunity) -> String {
        let mut text = opportunity.title.to_lowercase();
        for field in [&opportunity.description, &opportunity.eligibility] {
            if let Some(value) = field {
                text.push(' ');
                text.push_str(&value.to_lowercase());
            }
        }
        text
    }

    fn tier(haystack: &str, terms: &[String], primary: i64, secondary: i64) -> i64 {
        let mut matched = terms
            .iter()
            .enumerate()
            .filter(|(_, term)| !term.is_empty() && haystack.contains(term.to_lowercase().as_str()));
        match matched.next() {
            Some((0, _)) => primary,
            Some(_) => secondary,
            None => 0,
        }
    }
}

impl ScoringProvider for HeuristicScoringProvider {
    fn assess(
        &self,
        opportunity: &RawOpportunity,
        profile: Option<&CompanyProfile>,
    ) -> Result<CollaboratorAssessment, ProviderError> {
        let haystack = Self::haystack(opportunity);

        let (sectors, keywords, geographies) = match profile {
            Some(profile) => (
                profile.sectors.clone(),
                profile.keywords.clone(),
                profile.geographic_priorities.clone(),
            ),
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        let technical = Self::tier(&haystack, &sectors, 15, 10);
        let social = Self::tier(&haystack, &keywords, 15, 10);
        let geographic = if geographies
            .iter()
            .any(|term| haystack.contains(term.to_lowercase().as_str()))
        {
            10
        } else {
            5
        };

        let mut match_reasons = Vec::new();
        if technical > 0 {
            match_reasons.push("aligned with primary technical focus".to_string());
        }
        if social > 0 {
            match_reasons.push("advances social impact focus areas".to_string());
        }

        let mut risks = Vec::new();
        let cost_share_required =
            haystack.contains("cost share") || haystack.contains("matching required");
        if cost_share_required {
            risks.push("cost-share required".to_string());
        }

        let niche = haystack.contains("pilot") || haystack.contains("demonstration");
        let competition = if niche { 8 } else { 5 };
        if !niche {
            risks.push("high competition".to_string());
        }

        let focus_hits = [technical >= 10, social >= 10]
            .iter()
            .filter(|hit| **hit)
            .count();
        let differentiation = match focus_hits {
            2 => 10,
            1 => 5,
            _ => 0,
        };
        let track_record = if technical >= 10 { 7 } else { 3 };

        let award = opportunity.amount_max.unwrap_or(0);
        let cost_benefit = if award >= self.config.large_award_floor {
            8
        } else {
            6
        };
        let cost_share_leverage = if cost_share_required { 2 } else { 8 };

        let partnership = if haystack.contains("partner") { 5 } else { 3 };
        let pipeline = if haystack.contains("phase") { 5 } else { 2 };

        let mut bonus = 0;
        if focus_hits == 2 {
            bonus += 20;
            match_reasons.push("intersectional social-tech fit".to_string());
        }
        if award >= self.config.large_award_floor && !cost_share_required {
            bonus += 10;
            match_reasons.push("large award with low cost share".to_string());
        }

        Ok(CollaboratorAssessment {
            strategic_fit_score: Some(technical + social + geographic),
            win_probability_score: Some(competition + differentiation + track_record),
            resource_efficiency_score: Some(cost_benefit + cost_share_leverage),
            strategic_value_score: Some(partnership + pipeline),
            bonus_points: Some(bonus),
            capacity_penalty: Some(0),
            total_score: None,
            decision: None,
            match_reasons,
            risks,
        })
    }
}

/// Draft adapter rendering deterministic section scaffolds. Stands in for
/// the LLM-backed writing gateway; output is stored verbatim either way.
pub(crate) struct TemplateDraftWriter;

impl DraftWriter for TemplateDraftWriter {
    fn draft(&self, request: &DraftRequest) -> Result<String, ProviderError> {
        let context = &request.context;
        let agency = context.agency.as_deref().unwrap_or("the funder");
        let amount = context.amount_text.as_deref().unwrap_or("the requested amount");
        let deadline = context
            .deadline
            .map(|date| date.to_string())
            .unwrap_or_else(|| "the published deadline".to_string());

        let body = match request.section {
            SectionKind::SpecificAims => format!(
                "Specific Aims — {title}\n\n\
                 Aim 1: Establish the core capability described in \"{title}\" with \
                 measurable milestones aligned to {agency}'s priorities.\n\
                 Aim 2: Validate outcomes at pilot scale and quantify impact.\n\
                 Aim 3: Package results for follow-on deployment before {deadline}.",
                title = context.title,
            ),
            SectionKind::BudgetJustification => format!(
                "Budget Justification — {title}\n\n\
                 Personnel effort, equipment, and materials are scoped against {amount}. \
                 Each line maps to a named project activity, and indirect costs follow \
                 federal cost principles.",
                title = context.title,
            ),
            SectionKind::LogicModel => format!(
                "Logic Model — {title}\n\n\
                 Inputs: award funding, staff, and partner commitments. Activities: the \
                 work plan submitted to {agency}. Outputs: prototypes, data, and trained \
                 personnel. Outcomes: measurable community and industry gains.",
                title = context.title,
            ),
            SectionKind::Narrative => format!(
                "Project Narrative — {title}\n\n\
                 Significance, innovation, and approach are presented with a timeline that \
                 closes before {deadline}, a team qualified for the scope, and broader \
                 impacts beyond the award period.",
                title = context.title,
            ),
        };

        Ok(body)
    }
}
