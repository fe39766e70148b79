use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::common::*;
use crate::workflows::grants::domain::{
    ApplicationStatus, Decision, HitlStatus, SectionKind,
};
use crate::workflows::grants::providers::{DraftContext, SearchOutcome};
use crate::workflows::grants::repository::OpportunityRepository;
use crate::workflows::grants::service::{
    ApplicationService, GrantServiceError, TriageService,
};
use crate::workflows::grants::triage::ReviewAction;

#[test]
fn discover_stores_and_scores_each_grant() {
    let harness = default_harness();

    let report = harness
        .discovery
        .discover(&user(), "lithium recycling", &Default::default())
        .expect("discovery succeeds");

    assert_eq!(report.items.len(), 1);
    let item = &report.items[0];
    assert!(item.error.is_none());
    let scored = item.scored.as_ref().expect("scored record");
    assert_eq!(scored.total_score, 73);
    assert_eq!(scored.decision, Decision::PriorityB);
    assert_eq!(scored.hitl_status, HitlStatus::Pending);

    let raw_id = item.opportunity_raw_id.as_ref().expect("raw id");
    let raw = harness
        .store
        .fetch_raw(raw_id)
        .expect("fetch raw")
        .expect("raw stored");
    assert!(raw.is_processed);
    assert_eq!(raw.raw_data["deadline_text"], "Rolling");
}

#[test]
fn rediscovery_updates_rather_than_duplicates() {
    let harness = default_harness();
    let user = user();

    harness
        .discovery
        .discover(&user, "lithium recycling", &Default::default())
        .expect("first run");
    harness
        .discovery
        .discover(&user, "lithium recycling", &Default::default())
        .expect("second run");

    assert_eq!(harness.store.raw_count(), 1);
    assert_eq!(harness.store.scored_count(), 1);
}

#[test]
fn rescore_overwrites_the_prior_record() {
    let harness = default_harness();
    let user = user();

    let report = harness
        .discovery
        .discover(&user, "lithium recycling", &Default::default())
        .expect("discovery succeeds");
    let first = report.items[0].scored.clone().expect("scored");
    let raw_id = report.items[0].opportunity_raw_id.clone().expect("raw id");

    let second = harness
        .discovery
        .rescore(&user, &raw_id)
        .expect("rescore succeeds");

    assert_eq!(second.id, first.id);
    assert_eq!(harness.store.scored_count(), 1);
}

#[test]
fn one_failing_item_does_not_abort_the_batch() {
    let harness = harness(
        StaticSearch {
            outcome: SearchOutcome {
                grants: vec![
                    grant("Lithium Battery Recycling Prize", "Department of Energy"),
                    grant("Inclusive Workforce Pilot", "Department of Labor"),
                ],
                citations: Vec::new(),
            },
        },
        ScriptedScorer {
            by_title: HashMap::new(),
            default: assessment(30, 20, 15, 8),
            fail_title: Some("Inclusive Workforce Pilot".to_string()),
        },
    );

    let report = harness
        .discovery
        .discover(&user(), "workforce", &Default::default())
        .expect("discovery succeeds");

    assert_eq!(report.items.len(), 2);
    assert!(report.items[0].scored.is_some());
    assert!(report.items[0].error.is_none());
    assert!(report.items[1].scored.is_none());
    let error = report.items[1].error.as_ref().expect("per-item error");
    assert!(error.contains("unavailable"));

    // The raw record for the failed item survives for a later rescore.
    assert_eq!(harness.store.raw_count(), 2);
    assert_eq!(harness.store.scored_count(), 1);
}

#[test]
fn malformed_scoring_output_is_stored_as_conservative_fallback() {
    let mut by_title = HashMap::new();
    by_title.insert(
        "Lithium Battery Recycling Prize".to_string(),
        assessment(99, 20, 15, 8),
    );
    let harness = harness(
        StaticSearch {
            outcome: SearchOutcome {
                grants: vec![grant(
                    "Lithium Battery Recycling Prize",
                    "Department of Energy",
                )],
                citations: Vec::new(),
            },
        },
        ScriptedScorer {
            by_title,
            default: assessment(30, 20, 15, 8),
            fail_title: None,
        },
    );

    let report = harness
        .discovery
        .discover(&user(), "lithium", &Default::default())
        .expect("discovery succeeds");

    let scored = report.items[0].scored.as_ref().expect("fallback stored");
    assert_eq!(scored.total_score, 55);
    assert_eq!(scored.decision, Decision::Conditional);
    assert!(scored
        .risks
        .iter()
        .any(|risk| risk == "AI analysis incomplete"));
}

#[test]
fn unreachable_search_is_a_recoverable_error() {
    let store = Arc::new(MemoryStore::default());
    let discovery = crate::workflows::grants::service::DiscoveryService::new(
        store,
        Arc::new(UnavailableSearch),
        Arc::new(ScriptedScorer {
            default: assessment(30, 20, 15, 8),
            ..ScriptedScorer::default()
        }),
        engine(),
    );

    let result = discovery.discover(&user(), "anything", &Default::default());

    assert!(matches!(result, Err(GrantServiceError::Provider(_))));
}

#[test]
fn approval_creates_exactly_one_draft_application() {
    let harness = default_harness();
    let user = user();
    harness
        .store
        .seed_scored(scored_record("scored-1", 88, Decision::PriorityA, HitlStatus::Pending));

    let outcome = harness
        .triage
        .review(
            &user,
            &crate::workflows::grants::domain::ScoredOpportunityId("scored-1".to_string()),
            &ReviewAction::Approve,
        )
        .expect("approval succeeds");

    assert_eq!(outcome.opportunity.hitl_status, HitlStatus::Approved);
    let application = outcome.application.expect("draft created");
    assert_eq!(application.status, ApplicationStatus::Draft);
    assert_eq!(application.opportunity_scored_id.0, "scored-1");
    assert_eq!(application.content_sections.len(), 4);
    assert!(application
        .content_sections
        .values()
        .all(|text| text.is_empty()));
    assert_eq!(harness.store.application_count(), 1);
}

#[test]
fn repeated_approval_returns_the_existing_draft() {
    let harness = default_harness();
    let user = user();
    let id = crate::workflows::grants::domain::ScoredOpportunityId("scored-1".to_string());
    harness
        .store
        .seed_scored(scored_record("scored-1", 88, Decision::PriorityA, HitlStatus::Pending));

    let first = harness
        .triage
        .review(&user, &id, &ReviewAction::Approve)
        .expect("first approval");
    let second = harness
        .triage
        .review(&user, &id, &ReviewAction::Approve)
        .expect("second approval is a repair/no-op");

    assert_eq!(
        first.application.expect("first draft").id,
        second.application.expect("second draft").id
    );
    assert_eq!(harness.store.application_count(), 1);
}

#[test]
fn failed_draft_insert_surfaces_retryable_approval_error() {
    let store = Arc::new(MemoryStore::default());
    let refusing = Arc::new(RefusingApplications::default());
    let triage = TriageService::new(store.clone(), refusing);
    let user = user();
    store.seed_scored(scored_record(
        "scored-1",
        88,
        Decision::PriorityA,
        HitlStatus::Pending,
    ));

    let result = triage.review(
        &user,
        &crate::workflows::grants::domain::ScoredOpportunityId("scored-1".to_string()),
        &ReviewAction::Approve,
    );

    assert!(matches!(
        result,
        Err(GrantServiceError::ApprovalIncomplete { .. })
    ));

    // The status flip is left in place; the caller retries the approval.
    let stored = store
        .fetch_scored(
            &user,
            &crate::workflows::grants::domain::ScoredOpportunityId("scored-1".to_string()),
        )
        .expect("fetch")
        .expect("record");
    assert_eq!(stored.hitl_status, HitlStatus::Approved);
}

#[test]
fn inbox_surfaces_pending_and_expired_snoozes_highest_first() {
    let harness = default_harness();
    let now = chrono::Utc::now();

    harness
        .store
        .seed_scored(scored_record("scored-1", 72, Decision::PriorityB, HitlStatus::Pending));
    harness
        .store
        .seed_scored(scored_record("scored-2", 90, Decision::PriorityA, HitlStatus::Pending));

    let mut expired = scored_record("scored-3", 60, Decision::Conditional, HitlStatus::Snoozed);
    expired.snoozed_until = Some(now - chrono::Duration::hours(1));
    harness.store.seed_scored(expired);

    let mut sleeping = scored_record("scored-4", 95, Decision::PriorityA, HitlStatus::Snoozed);
    sleeping.snoozed_until = Some(now + chrono::Duration::hours(12));
    harness.store.seed_scored(sleeping);

    harness
        .store
        .seed_scored(scored_record("scored-5", 88, Decision::PriorityA, HitlStatus::Approved));

    let inbox = harness.triage.inbox(&user()).expect("inbox loads");
    let ids: Vec<&str> = inbox
        .iter()
        .map(|entry| entry.opportunity.id.0.as_str())
        .collect();

    assert_eq!(ids, vec!["scored-2", "scored-1", "scored-3"]);
}

#[test]
fn metrics_fold_matches_stored_records() {
    let harness = default_harness();
    harness
        .store
        .seed_scored(scored_record("scored-1", 90, Decision::PriorityA, HitlStatus::Pending));
    harness
        .store
        .seed_scored(scored_record("scored-2", 87, Decision::PriorityA, HitlStatus::Approved));
    harness
        .store
        .seed_scored(scored_record("scored-3", 72, Decision::PriorityB, HitlStatus::Pending));

    let metrics = harness.triage.metrics(&user()).expect("metrics");

    assert_eq!(metrics.priority_a, 2);
    assert_eq!(metrics.priority_b, 1);
    assert_eq!(metrics.pending, 2);
    assert_eq!(metrics.approved, 1);
}

#[test]
fn draft_section_stores_collaborator_text_verbatim() {
    let harness = default_harness();
    let user = user();
    harness.store.seed_application(draft_application("app-1"));

    let updated = harness
        .applications
        .draft_section(
            &user,
            &crate::workflows::grants::domain::ApplicationId("app-1".to_string()),
            SectionKind::Narrative,
            DraftContext {
                title: "Lithium Battery Recycling Prize".to_string(),
                agency: Some("Department of Energy".to_string()),
                amount_text: Some("$1M - $5M".to_string()),
                deadline: None,
            },
        )
        .expect("draft succeeds");

    assert_eq!(
        updated.content_sections.get(&SectionKind::Narrative).map(String::as_str),
        Some("Draft narrative for Lithium Battery Recycling Prize")
    );

    let requests = harness.writer.requests.lock().expect("writer requests");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].section, SectionKind::Narrative);
}

#[test]
fn update_sections_overwrites_only_supplied_keys() {
    let harness = default_harness();
    let user = user();
    harness.store.seed_application(draft_application("app-2"));

    let mut sections = BTreeMap::new();
    sections.insert(SectionKind::SpecificAims, "Aim 1".to_string());

    let updated = harness
        .applications
        .update_sections(
            &user,
            &crate::workflows::grants::domain::ApplicationId("app-2".to_string()),
            sections,
        )
        .expect("update succeeds");

    assert_eq!(
        updated.content_sections.get(&SectionKind::SpecificAims).map(String::as_str),
        Some("Aim 1")
    );
    assert_eq!(
        updated.content_sections.get(&SectionKind::Narrative).map(String::as_str),
        Some("")
    );
}

#[test]
fn users_cannot_reach_each_others_records() {
    let harness = default_harness();
    harness
        .store
        .seed_scored(scored_record("scored-1", 88, Decision::PriorityA, HitlStatus::Pending));

    let stranger = crate::workflows::grants::domain::UserId("someone-else".to_string());
    let result = harness.triage.review(
        &stranger,
        &crate::workflows::grants::domain::ScoredOpportunityId("scored-1".to_string()),
        &ReviewAction::Approve,
    );

    assert!(matches!(
        result,
        Err(GrantServiceError::Repository(
            crate::workflows::grants::repository::RepositoryError::NotFound
        ))
    ));
}

#[test]
fn advancing_applications_persists_the_new_status() {
    let harness = default_harness();
    let user = user();
    harness.store.seed_application(draft_application("app-3"));
    let id = crate::workflows::grants::domain::ApplicationId("app-3".to_string());

    let submitted = harness
        .applications
        .advance(&user, &id, ApplicationStatus::Submitted)
        .expect("submit succeeds");
    assert!(submitted.submitted_at.is_some());

    let stored = harness
        .applications
        .get(&user, &id)
        .expect("application readable");
    assert_eq!(stored.status, ApplicationStatus::Submitted);
    assert_eq!(stored.submitted_at, submitted.submitted_at);
}

#[test]
fn application_service_is_untouched_by_unrelated_triage() {
    let harness = default_harness();
    let user = user();
    harness.store.seed_application(draft_application("app-4"));

    let listed = harness.applications.list(&user).expect("list");
    assert_eq!(listed.len(), 1);

    let service: &ApplicationService<_, _> = &harness.applications;
    let missing = service.get(
        &user,
        &crate::workflows::grants::domain::ApplicationId("app-missing".to_string()),
    );
    assert!(matches!(
        missing,
        Err(GrantServiceError::Repository(
            crate::workflows::grants::repository::RepositoryError::NotFound
        ))
    ));
}
