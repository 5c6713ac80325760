use crate::cli::ServeArgs;
use crate::infra::{
    asset_store, AppState, InMemoryAlertPublisher, InMemoryQualityStore, LocalCollaborators,
    SERVE_RETENTION,
};
use crate::routes::with_workflow_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use pod_quality::config::AppConfig;
use pod_quality::error::AppError;
use pod_quality::telemetry;
use pod_quality::workflows::privacy::{FaceRedactor, RedactionService};
use pod_quality::workflows::quality::DeliveryQualityService;
use std::sync::atomic::Ordering;
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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    // Cascade parsing is CPU-bound and the reasoning client is blocking.
    let workflow = config.workflow.clone();
    let (collaborators, redactor) = tokio::task::spawn_blocking(move || {
        let collaborators = LocalCollaborators::from_settings(&workflow)?;
        let redactor =
            FaceRedactor::for_policy(&workflow.face_cascade_path, workflow.privacy.clone())?;
        Ok::<_, AppError>((collaborators, redactor))
    })
    .await
    .map_err(|err| AppError::Io(std::io::Error::other(err)))??;

    let workflow = &config.workflow;
    let quality_service = Arc::new(DeliveryQualityService::new(
        Arc::new(collaborators),
        workflow.aggregator.clone(),
        Arc::new(InMemoryQualityStore::bounded(
            workflow.persistence.quality_table.clone(),
            SERVE_RETENTION,
        )),
        Arc::new(InMemoryAlertPublisher::bounded(
            workflow.persistence.notification_topic_id.clone(),
            SERVE_RETENTION,
        )),
    ));
    let redaction_service = Arc::new(RedactionService::new(
        Arc::new(asset_store(workflow)),
        redactor,
        workflow.redaction_target(),
    ));

    let app = with_workflow_routes(quality_service, redaction_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        damage_mode = ?workflow.aggregator.damage_scorer().mode(),
        face_blurring = workflow.privacy.enable_face_blurring(),
        reasoning_endpoint = workflow.reasoning.endpoint.as_deref().unwrap_or("offline"),
        "delivery quality service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
