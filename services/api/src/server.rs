use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use applicant_ai::config::AppConfig;
use applicant_ai::error::AppError;
use applicant_ai::telemetry;
use applicant_ai::workflows::jobsearch::{
    ApplicationRegistry, LifecycleController, Orchestrator,
};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Local;
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::ServeArgs;
use crate::infra::{
    seeded_postings, AppState, InMemoryCalendarGateway, InMemoryMailGateway,
    RequiredFieldExtractor, SeededJobSource,
};
use crate::routes::with_pipeline_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    // Startup is the only place a configuration problem is allowed to be
    // fatal; the pipeline never begins without a sender identity.
    config.require_outreach_identity()?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let today = Local::now().date_naive();
    let source = Arc::new(SeededJobSource::new(seeded_postings(today)));
    let extractor = Arc::new(RequiredFieldExtractor {
        today,
        max_age_days: config.search.posted_within_days,
    });
    let mail = Arc::new(InMemoryMailGateway::default());
    let calendar = Arc::new(InMemoryCalendarGateway::default());

    let registry = Arc::new(ApplicationRegistry::new(config.policy.max_follow_ups));
    let controller = Arc::new(LifecycleController::new(
        registry,
        mail.clone(),
        calendar,
        config.policy,
        config.scheduling.clone(),
        config.outreach.clone(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        source,
        extractor,
        mail,
        controller.clone(),
        config.search.clone(),
        config.outreach.clone(),
        config.poll,
    ));

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    let pipeline = orchestrator.clone();
    tokio::spawn(async move {
        pipeline.run(shutdown_rx).await;
    });

    let app = with_pipeline_routes(controller)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "job search orchestrator ready");

    axum::serve(listener, app).await?;
    drop(shutdown_tx);
    Ok(())
}
