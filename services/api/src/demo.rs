use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use crate::infra::{
    default_scoring_config, CannedSearchProvider, HeuristicScoringProvider, InMemoryGrantStore,
    TemplateDraftWriter,
};
use grant_hunter::error::AppError;
use grant_hunter::workflows::grants::{
    ApplicationService, ApplicationStatus, CollaboratorAssessment, CompanyProfile, DiscoveryService,
    DraftContext, QualificationEngine, ReviewAction, SearchFilters, SectionKind, TriageService,
    UserId,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Owning user identity for the demo records
    #[arg(long, default_value = "demo-user")]
    pub(crate) user: String,
    /// Search query passed to the discovery pipeline
    #[arg(long, default_value = "lithium recycling critical minerals")]
    pub(crate) query: String,
    /// Skip the triage and application drafting portion of the demo
    #[arg(long)]
    pub(crate) skip_applications: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// JSON file holding {"assessment": {...}, "profile": {...}?}
    #[arg(long)]
    pub(crate) file: PathBuf,
}

#[derive(Debug, serde::Deserialize)]
struct ScoreInput {
    assessment: CollaboratorAssessment,
    #[serde(default)]
    profile: Option<CompanyProfile>,
}

fn demo_profile() -> CompanyProfile {
    CompanyProfile {
        name: "Crystalline Recovery Labs".to_string(),
        sectors: vec![
            "lithium recycling".to_string(),
            "critical minerals".to_string(),
        ],
        keywords: vec![
            "autism".to_string(),
            "neurodiverse".to_string(),
            "clean water".to_string(),
        ],
        cost_share_capacity: Some(250_000),
        geographic_priorities: vec!["US".to_string(), "EU".to_string()],
        active_proposal_count: 1,
        team_credentials: serde_json::Value::Null,
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        user,
        query,
        skip_applications,
    } = args;
    let user = UserId(user);

    let store = Arc::new(InMemoryGrantStore::default());
    let scoring_config = default_scoring_config();
    let discovery = DiscoveryService::new(
        store.clone(),
        Arc::new(CannedSearchProvider),
        Arc::new(HeuristicScoringProvider::new(scoring_config.clone())),
        QualificationEngine::new(scoring_config),
    );
    let triage = TriageService::new(store.clone(), store.clone());
    let applications = ApplicationService::new(store.clone(), Arc::new(TemplateDraftWriter));

    println!("Grant qualification demo");
    discovery.store_profile(&user, demo_profile())?;
    println!("Profile: {} (1 active proposal)", demo_profile().name);

    let report = discovery.discover(&user, &query, &SearchFilters::default())?;
    println!("\nDiscovery results for \"{}\"", report.query);
    for item in &report.items {
        match (&item.scored, &item.error) {
            (Some(scored), _) => {
                println!(
                    "- {} -> {} ({} points, bonus {}, penalty {})",
                    item.title,
                    scored.decision.label(),
                    scored.total_score,
                    scored.bonus_points,
                    scored.capacity_penalty
                );
                for reason in &scored.match_reasons {
                    println!("    + {reason}");
                }
                for risk in &scored.risks {
                    println!("    ! {risk}");
                }
            }
            (None, Some(error)) => println!("- {} -> failed: {error}", item.title),
            (None, None) => println!("- {} -> no outcome recorded", item.title),
        }
    }

    if !report.citations.is_empty() {
        println!("\nSources");
        for citation in &report.citations {
            println!("- {citation}");
        }
    }

    let metrics = triage.metrics(&user)?;
    println!(
        "\nDashboard: {} priority A | {} priority B | {} pending | {} approved",
        metrics.priority_a, metrics.priority_b, metrics.pending, metrics.approved
    );

    if skip_applications {
        return Ok(());
    }

    let inbox = triage.inbox(&user)?;
    let Some(top) = inbox.first() else {
        println!("\nInbox empty; nothing to approve");
        return Ok(());
    };
    println!(
        "\nApproving top inbox item: {} ({} points)",
        top.raw
            .as_ref()
            .map(|raw| raw.title.as_str())
            .unwrap_or(top.opportunity.id.0.as_str()),
        top.opportunity.total_score
    );

    let outcome = triage.review(&user, &top.opportunity.id, &ReviewAction::Approve)?;
    let Some(application) = outcome.application else {
        println!("Approval recorded but no draft application was returned");
        return Ok(());
    };
    println!(
        "Created application {} with {} empty sections",
        application.id.0,
        application.content_sections.len()
    );

    let context = match &top.raw {
        Some(raw) => DraftContext {
            title: raw.title.clone(),
            agency: raw.agency.clone(),
            amount_text: raw.amount_text.clone(),
            deadline: raw.deadline,
        },
        None => DraftContext::default(),
    };

    let drafted = applications.draft_section(
        &user,
        &application.id,
        SectionKind::SpecificAims,
        context,
    )?;
    println!("\nDrafted specific_aims:");
    for line in drafted.content_sections[&SectionKind::SpecificAims].lines().take(3) {
        println!("  {line}");
    }

    let submitted = applications.advance(&user, &application.id, ApplicationStatus::Submitted)?;
    println!(
        "\nSubmitted application {} at {}",
        submitted.id.0,
        submitted
            .submitted_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string())
    );

    let metrics = triage.metrics(&user)?;
    println!(
        "Dashboard after triage: {} priority A | {} priority B | {} pending | {} approved",
        metrics.priority_a, metrics.priority_b, metrics.pending, metrics.approved
    );

    Ok(())
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(&args.file)?;
    let input: ScoreInput = serde_json::from_str(&raw)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;

    let engine = QualificationEngine::new(default_scoring_config());
    let qualification = engine.qualify(&input.assessment, input.profile.as_ref());

    match serde_json::to_string_pretty(&qualification) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("unable to render qualification: {err}"),
    }

    Ok(())
}
