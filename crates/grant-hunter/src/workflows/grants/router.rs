use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    ApplicationId, ApplicationStatus, CompanyProfile, ScoredOpportunityId, SearchFilters,
    SectionKind, UserId,
};
use super::lifecycle::LifecycleError;
use super::providers::{DraftContext, DraftWriter, ProviderError, ScoringProvider, SearchProvider};
use super::repository::{
    ApplicationRepository, OpportunityRepository, ProfileRepository, RepositoryError,
};
use super::service::{ApplicationService, DiscoveryService, GrantServiceError, TriageService};
use super::triage::{ReviewAction, TriageError};

/// Shared handler state bundling the three workflow services.
pub struct GrantServices<R, A, S, Q, W> {
    pub discovery: Arc<DiscoveryService<R, S, Q>>,
    pub triage: Arc<TriageService<R, A>>,
    pub applications: Arc<ApplicationService<A, W>>,
}

impl<R, A, S, Q, W> Clone for GrantServices<R, A, S, Q, W> {
    fn clone(&self) -> Self {
        Self {
            discovery: Arc::clone(&self.discovery),
            triage: Arc::clone(&self.triage),
            applications: Arc::clone(&self.applications),
        }
    }
}

/// Router builder exposing the discovery, triage, and application endpoints.
pub fn grants_router<R, A, S, Q, W>(services: GrantServices<R, A, S, Q, W>) -> Router
where
    R: OpportunityRepository + ProfileRepository + 'static,
    A: ApplicationRepository + 'static,
    S: SearchProvider + 'static,
    Q: ScoringProvider + 'static,
    W: DraftWriter + 'static,
{
    Router::new()
        .route("/api/v1/grants/search", post(search_handler::<R, A, S, Q, W>))
        .route(
            "/api/v1/opportunities",
            get(list_opportunities_handler::<R, A, S, Q, W>),
        )
        .route(
            "/api/v1/opportunities/inbox",
            get(inbox_handler::<R, A, S, Q, W>),
        )
        .route(
            "/api/v1/opportunities/:id/review",
            post(review_handler::<R, A, S, Q, W>),
        )
        .route(
            "/api/v1/opportunities/:id/rescore",
            post(rescore_handler::<R, A, S, Q, W>),
        )
        .route(
            "/api/v1/dashboard/metrics",
            get(metrics_handler::<R, A, S, Q, W>),
        )
        .route(
            "/api/v1/profile",
            get(get_profile_handler::<R, A, S, Q, W>)
                .put(put_profile_handler::<R, A, S, Q, W>),
        )
        .route(
            "/api/v1/applications",
            get(list_applications_handler::<R, A, S, Q, W>),
        )
        .route(
            "/api/v1/applications/:id",
            get(get_application_handler::<R, A, S, Q, W>),
        )
        .route(
            "/api/v1/applications/:id/status",
            post(application_status_handler::<R, A, S, Q, W>),
        )
        .route(
            "/api/v1/applications/:id/sections",
            put(update_sections_handler::<R, A, S, Q, W>),
        )
        .route(
            "/api/v1/applications/:id/sections/:section/draft",
            post(draft_section_handler::<R, A, S, Q, W>),
        )
        .with_state(services)
}

/// Every mutating or record-reading operation requires a resolved owning
/// user; absence is a fatal precondition for the request.
fn require_user(headers: &HeaderMap) -> Result<UserId, Response> {
    match headers.get("x-user-id").and_then(|value| value.to_str().ok()) {
        Some(value) if !value.trim().is_empty() => Ok(UserId(value.trim().to_string())),
        _ => {
            let payload = json!({ "error": "authentication required" });
            Err((StatusCode::UNAUTHORIZED, Json(payload)).into_response())
        }
    }
}

fn error_response(error: GrantServiceError) -> Response {
    let status = match &error {
        GrantServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        GrantServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        GrantServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        GrantServiceError::Provider(ProviderError::Unavailable(_))
        | GrantServiceError::Provider(ProviderError::Malformed(_)) => StatusCode::BAD_GATEWAY,
        GrantServiceError::Triage(TriageError::InvalidTransition { .. }) => StatusCode::CONFLICT,
        GrantServiceError::Triage(TriageError::SnoozeInPast { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        GrantServiceError::Lifecycle(LifecycleError::Terminal { .. })
        | GrantServiceError::Lifecycle(LifecycleError::InvalidTransition { .. }) => {
            StatusCode::CONFLICT
        }
        GrantServiceError::UnknownSection(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GrantServiceError::ApprovalIncomplete { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchRequest {
    pub(crate) query: String,
    #[serde(default)]
    pub(crate) filters: SearchFilters,
}

pub(crate) async fn search_handler<R, A, S, Q, W>(
    State(services): State<GrantServices<R, A, S, Q, W>>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> Response
where
    R: OpportunityRepository + ProfileRepository + 'static,
    A: ApplicationRepository + 'static,
    S: SearchProvider + 'static,
    Q: ScoringProvider + 'static,
    W: DraftWriter + 'static,
{
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match services
        .discovery
        .discover(&user, &request.query, &request.filters)
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_opportunities_handler<R, A, S, Q, W>(
    State(services): State<GrantServices<R, A, S, Q, W>>,
    headers: HeaderMap,
) -> Response
where
    R: OpportunityRepository + ProfileRepository + 'static,
    A: ApplicationRepository + 'static,
    S: SearchProvider + 'static,
    Q: ScoringProvider + 'static,
    W: DraftWriter + 'static,
{
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match services.triage.list(&user) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn inbox_handler<R, A, S, Q, W>(
    State(services): State<GrantServices<R, A, S, Q, W>>,
    headers: HeaderMap,
) -> Response
where
    R: OpportunityRepository + ProfileRepository + 'static,
    A: ApplicationRepository + 'static,
    S: SearchProvider + 'static,
    Q: ScoringProvider + 'static,
    W: DraftWriter + 'static,
{
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match services.triage.inbox(&user) {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn review_handler<R, A, S, Q, W>(
    State(services): State<GrantServices<R, A, S, Q, W>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(action): Json<ReviewAction>,
) -> Response
where
    R: OpportunityRepository + ProfileRepository + 'static,
    A: ApplicationRepository + 'static,
    S: SearchProvider + 'static,
    Q: ScoringProvider + 'static,
    W: DraftWriter + 'static,
{
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let id = ScoredOpportunityId(id);
    match services.triage.review(&user, &id, &action) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn rescore_handler<R, A, S, Q, W>(
    State(services): State<GrantServices<R, A, S, Q, W>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response
where
    R: OpportunityRepository + ProfileRepository + 'static,
    A: ApplicationRepository + 'static,
    S: SearchProvider + 'static,
    Q: ScoringProvider + 'static,
    W: DraftWriter + 'static,
{
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let raw_id = super::domain::RawOpportunityId(id);
    match services.discovery.rescore(&user, &raw_id) {
        Ok(scored) => (StatusCode::OK, Json(scored)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn metrics_handler<R, A, S, Q, W>(
    State(services): State<GrantServices<R, A, S, Q, W>>,
    headers: HeaderMap,
) -> Response
where
    R: OpportunityRepository + ProfileRepository + 'static,
    A: ApplicationRepository + 'static,
    S: SearchProvider + 'static,
    Q: ScoringProvider + 'static,
    W: DraftWriter + 'static,
{
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match services.triage.metrics(&user) {
        Ok(metrics) => (StatusCode::OK, Json(metrics)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_profile_handler<R, A, S, Q, W>(
    State(services): State<GrantServices<R, A, S, Q, W>>,
    headers: HeaderMap,
) -> Response
where
    R: OpportunityRepository + ProfileRepository + 'static,
    A: ApplicationRepository + 'static,
    S: SearchProvider + 'static,
    Q: ScoringProvider + 'static,
    W: DraftWriter + 'static,
{
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match services.discovery.profile(&user) {
        Ok(Some(profile)) => (StatusCode::OK, Json(profile)).into_response(),
        Ok(None) => {
            let payload = json!({ "error": "no company profile stored" });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn put_profile_handler<R, A, S, Q, W>(
    State(services): State<GrantServices<R, A, S, Q, W>>,
    headers: HeaderMap,
    Json(profile): Json<CompanyProfile>,
) -> Response
where
    R: OpportunityRepository + ProfileRepository + 'static,
    A: ApplicationRepository + 'static,
    S: SearchProvider + 'static,
    Q: ScoringProvider + 'static,
    W: DraftWriter + 'static,
{
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match services.discovery.store_profile(&user, profile) {
        Ok(stored) => (StatusCode::OK, Json(stored)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_applications_handler<R, A, S, Q, W>(
    State(services): State<GrantServices<R, A, S, Q, W>>,
    headers: HeaderMap,
) -> Response
where
    R: OpportunityRepository + ProfileRepository + 'static,
    A: ApplicationRepository + 'static,
    S: SearchProvider + 'static,
    Q: ScoringProvider + 'static,
    W: DraftWriter + 'static,
{
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    match services.applications.list(&user) {
        Ok(applications) => (StatusCode::OK, Json(applications)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_application_handler<R, A, S, Q, W>(
    State(services): State<GrantServices<R, A, S, Q, W>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response
where
    R: OpportunityRepository + ProfileRepository + 'static,
    A: ApplicationRepository + 'static,
    S: SearchProvider + 'static,
    Q: ScoringProvider + 'static,
    W: DraftWriter + 'static,
{
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let id = ApplicationId(id);
    match services.applications.get(&user, &id) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    pub(crate) status: ApplicationStatus,
}

pub(crate) async fn application_status_handler<R, A, S, Q, W>(
    State(services): State<GrantServices<R, A, S, Q, W>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Response
where
    R: OpportunityRepository + ProfileRepository + 'static,
    A: ApplicationRepository + 'static,
    S: SearchProvider + 'static,
    Q: ScoringProvider + 'static,
    W: DraftWriter + 'static,
{
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let id = ApplicationId(id);
    match services.applications.advance(&user, &id, request.status) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SectionsRequest {
    pub(crate) sections: BTreeMap<SectionKind, String>,
}

pub(crate) async fn update_sections_handler<R, A, S, Q, W>(
    State(services): State<GrantServices<R, A, S, Q, W>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<SectionsRequest>,
) -> Response
where
    R: OpportunityRepository + ProfileRepository + 'static,
    A: ApplicationRepository + 'static,
    S: SearchProvider + 'static,
    Q: ScoringProvider + 'static,
    W: DraftWriter + 'static,
{
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    let id = ApplicationId(id);
    match services
        .applications
        .update_sections(&user, &id, request.sections)
    {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DraftSectionRequest {
    pub(crate) context: DraftContext,
}

pub(crate) async fn draft_section_handler<R, A, S, Q, W>(
    State(services): State<GrantServices<R, A, S, Q, W>>,
    headers: HeaderMap,
    Path((id, section)): Path<(String, String)>,
    Json(request): Json<DraftSectionRequest>,
) -> Response
where
    R: OpportunityRepository + ProfileRepository + 'static,
    A: ApplicationRepository + 'static,
    S: SearchProvider + 'static,
    Q: ScoringProvider + 'static,
    W: DraftWriter + 'static,
{
    let user = match require_user(&headers) {
        Ok(user) => user,
        Err(response) => return response,
    };

    // Unknown section identifiers are rejected here, before any collaborator
    // call is made.
    let section: SectionKind = match section.parse() {
        Ok(section) => section,
        Err(unknown) => return error_response(GrantServiceError::UnknownSection(unknown)),
    };

    let id = ApplicationId(id);
    match services
        .applications
        .draft_section(&user, &id, section, request.context)
    {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}
