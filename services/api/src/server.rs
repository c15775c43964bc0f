use crate::cli::ServeArgs;
use crate::infra::{build_orchestrator, AppState, InMemoryWorkflowRepository};
use crate::routes::with_recall_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use rider_recall::config::AppConfig;
use rider_recall::error::AppError;
use rider_recall::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryWorkflowRepository::default());
    let orchestrator = Arc::new(build_orchestrator(config.recall.clone(), None, repository)?);

    let app = with_recall_routes(orchestrator)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        approval_policy = config.recall.approval_policy.label(),
        "rider recall service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
