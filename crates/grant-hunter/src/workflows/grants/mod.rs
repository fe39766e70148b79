//! Grant opportunity qualification and triage workflow.
//!
//! Discovery results from the search collaborator are persisted, qualified
//! through a deterministic scoring policy, reviewed through a
//! human-in-the-loop status machine, and carried into a drafted application
//! lifecycle. The scoring arithmetic, decision thresholds, and both state
//! machines live here; persistence and the AI-backed collaborators sit
//! behind the trait boundaries in `repository` and `providers`.

pub mod dashboard;
pub mod domain;
pub(crate) mod lifecycle;
pub mod providers;
pub mod qualification;
pub mod repository;
pub mod router;
pub mod service;
pub mod triage;

#[cfg(test)]
mod tests;

pub use dashboard::{metrics, DashboardMetrics};
pub use domain::{
    Application, ApplicationId, ApplicationStatus, CompanyProfile, ComponentScores, Decision,
    DiscoveredGrant, HitlStatus, RawOpportunity, RawOpportunityId, ScoredOpportunity,
    ScoredOpportunityId, SearchFilters, SectionKind, UnknownSection, UserId,
};
pub use lifecycle::LifecycleError;
pub use providers::{
    CollaboratorAssessment, DraftContext, DraftRequest, DraftWriter, ProviderError,
    ScoringProvider, SearchOutcome, SearchProvider,
};
pub use qualification::{Qualification, QualificationEngine, ScoreValidationError, ScoringConfig};
pub use repository::{
    ApplicationRepository, NewRawOpportunity, NewScoredOpportunity, OpportunityRepository,
    ProfileRepository, RepositoryError,
};
pub use router::{grants_router, GrantServices};
pub use service::{
    ApplicationService, DiscoveryItem, DiscoveryReport, DiscoveryService, GrantServiceError,
    InboxEntry, ReviewOutcome, TriageService,
};
pub use triage::{ReviewAction, TriageError, DEFAULT_SNOOZE_HOURS};
