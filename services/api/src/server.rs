use crate::cli::ServeArgs;
use crate::infra::{
    default_scoring_config, AppState, CannedSearchProvider, HeuristicScoringProvider,
    InMemoryGrantStore, TemplateDraftWriter,
};
use crate::routes::with_grant_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

use grant_hunter::config::AppConfig;
use grant_hunter::error::AppError;
use grant_hunter::telemetry;
use grant_hunter::workflows::grants::{
    ApplicationService, DiscoveryService, GrantServices, QualificationEngine, TriageService,
};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryGrantStore::default());
    let scoring_config = default_scoring_config();
    let services = GrantServices {
        discovery: Arc::new(DiscoveryService::new(
            store.clone(),
            Arc::new(CannedSearchProvider),
            Arc::new(HeuristicScoringProvider::new(scoring_config.clone())),
            QualificationEngine::new(scoring_config),
        )),
        triage: Arc::new(TriageService::new(store.clone(), store.clone())),
        applications: Arc::new(ApplicationService::new(
            store.clone(),
            Arc::new(TemplateDraftWriter),
        )),
    };

    let app = with_grant_routes(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "grant qualification service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
