use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for an authenticated owner of scored records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for discovered (raw) opportunities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawOpportunityId(pub String);

/// Identifier wrapper for qualified opportunities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoredOpportunityId(pub String);

/// Identifier wrapper for drafted grant applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// One funding opportunity as returned by the search collaborator, before
/// it has been persisted or scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredGrant {
    pub title: String,
    #[serde(default)]
    pub agency: Option<String>,
    #[serde(default)]
    pub amount_text: Option<String>,
    #[serde(default)]
    pub amount_min: Option<u64>,
    #[serde(default)]
    pub amount_max: Option<u64>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub deadline_text: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub eligibility: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    /// Dedup key within the source; derived from title+agency when absent.
    #[serde(default)]
    pub external_id: Option<String>,
}

const EXTERNAL_ID_MAX_LEN: usize = 100;

impl DiscoveredGrant {
    /// Dedup key used for the (source, external_id) upsert when the source
    /// did not supply one: `"{title}-{agency}"` truncated to 100 characters.
    pub fn derived_external_id(&self) -> String {
        if let Some(id) = &self.external_id {
            return id.clone();
        }

        let agency = self.agency.as_deref().unwrap_or("unknown");
        let mut key = format!("{}-{}", self.title, agency);
        if key.len() > EXTERNAL_ID_MAX_LEN {
            let cut = key
                .char_indices()
                .map(|(index, _)| index)
                .take_while(|index| *index <= EXTERNAL_ID_MAX_LEN)
                .last()
                .unwrap_or(0);
            key.truncate(cut);
        }
        key
    }
}

/// Optional narrowing criteria forwarded to the search collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub funding_range: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
}

/// Persisted record of an externally-discovered funding opportunity.
///
/// Unique per (source, external_id); re-discovery updates the stored fields
/// rather than duplicating the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOpportunity {
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
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
}

/// The four weighted rubric components. Bounds are part of the scoring
/// contract; anything outside them is rejected at the validation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub strategic_fit: u8,
    pub win_probability: u8,
    pub resource_efficiency: u8,
    pub strategic_value: u8,
}

impl ComponentScores {
    pub const STRATEGIC_FIT_MAX: u8 = 40;
    pub const WIN_PROBABILITY_MAX: u8 = 30;
    pub const RESOURCE_EFFICIENCY_MAX: u8 = 20;
    pub const STRATEGIC_VALUE_MAX: u8 = 10;

    pub fn sum(&self) -> i16 {
        self.strategic_fit as i16
            + self.win_probability as i16
            + self.resource_efficiency as i16
            + self.strategic_value as i16
    }
}

/// Priority bucket derived from the total score by fixed thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    PriorityA,
    PriorityB,
    Conditional,
    NoGo,
}

impl Decision {
    pub const fn label(self) -> &'static str {
        match self {
            Decision::PriorityA => "priority_a",
            Decision::PriorityB => "priority_b",
            Decision::Conditional => "conditional",
            Decision::NoGo => "no_go",
        }
    }
}

/// Reviewer-facing workflow state over a scored opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlStatus {
    Pending,
    Approved,
    Rejected,
    Snoozed,
}

impl HitlStatus {
    pub const fn label(self) -> &'static str {
        match self {
            HitlStatus::Pending => "pending",
            HitlStatus::Approved => "approved",
            HitlStatus::Rejected => "rejected",
            HitlStatus::Snoozed => "snoozed",
        }
    }
}

/// One organization's qualification of a raw opportunity.
///
/// Unique per (user, opportunity_raw_id); re-scoring overwrites. The score
/// fields are immutable once written; only `hitl_status`/`snoozed_until`
/// change afterwards, through reviewer actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredOpportunity {
    pub id: ScoredOpportunityId,
    pub user_id: UserId,
    pub opportunity_raw_id: RawOpportunityId,
    pub scores: ComponentScores,
    pub bonus_points: i16,
    pub capacity_penalty: i16,
    pub total_score: i16,
    pub decision: Decision,
    pub hitl_status: HitlStatus,
    pub match_reasons: Vec<String>,
    pub risks: Vec<String>,
    pub scoring_details: serde_json::Value,
    pub snoozed_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScoredOpportunity {
    /// Whether the record should surface in the review queue: pending work,
    /// or a snooze whose horizon has elapsed. The stored status is never
    /// flipped back by a timer; expiry is a derived query.
    pub fn is_actionable(&self, now: DateTime<Utc>) -> bool {
        match self.hitl_status {
            HitlStatus::Pending => true,
            HitlStatus::Snoozed => self
                .snoozed_until
                .map(|until| until <= now)
                .unwrap_or(true),
            HitlStatus::Approved | HitlStatus::Rejected => false,
        }
    }
}

/// Drafting progression for an application; awarded/rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    InProgress,
    Submitted,
    Awarded,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::InProgress => "in_progress",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Awarded => "awarded",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Awarded | ApplicationStatus::Rejected)
    }
}

/// The closed set of application content sections.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    SpecificAims,
    BudgetJustification,
    LogicModel,
    Narrative,
}

impl SectionKind {
    pub const ALL: [SectionKind; 4] = [
        SectionKind::SpecificAims,
        SectionKind::BudgetJustification,
        SectionKind::LogicModel,
        SectionKind::Narrative,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            SectionKind::SpecificAims => "specific_aims",
            SectionKind::BudgetJustification => "budget_justification",
            SectionKind::LogicModel => "logic_model",
            SectionKind::Narrative => "narrative",
        }
    }
}

/// Raised when a caller names a section outside the closed set. Rejected
/// before any draft collaborator call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown application section '{0}'")]
pub struct UnknownSection(pub String);

impl FromStr for SectionKind {
    type Err = UnknownSection;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SectionKind::ALL
            .into_iter()
            .find(|kind| kind.label() == value)
            .ok_or_else(|| UnknownSection(value.to_string()))
    }
}

/// A drafted submission tied to one approved scored opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub user_id: UserId,
    pub opportunity_scored_id: ScoredOpportunityId,
    pub status: ApplicationStatus,
    pub content_sections: BTreeMap<SectionKind, String>,
    pub team_members: Vec<String>,
    pub notes: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// All four sections, initialized empty, as approval creates them.
    pub fn empty_sections() -> BTreeMap<SectionKind, String> {
        SectionKind::ALL
            .into_iter()
            .map(|kind| (kind, String::new()))
            .collect()
    }
}

/// Scoring context describing the organization. Read-only input to the
/// qualification policy; maintained independently through the profile
/// endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    #[serde(default)]
    pub sectors: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub cost_share_capacity: Option<u64>,
    #[serde(default)]
    pub geographic_priorities: Vec<String>,
    #[serde(default)]
    pub active_proposal_count: u32,
    #[serde(default)]
    pub team_credentials: serde_json::Value,
}
