use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json};
use pod_quality::workflows::privacy::{privacy_router, RedactionService};
use pod_quality::workflows::quality::{
    quality_router, DeliveryCollaborators, DeliveryQualityService, QualityEventStore,
    ReviewAlertPublisher,
};
use pod_quality::workflows::storage::ObjectStore;
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_workflow_routes<C, S, A, O>(
    quality: Arc<DeliveryQualityService<C, S, A>>,
    redaction: Arc<RedactionService<O>>,
) -> axum::Router
where
    C: DeliveryCollaborators + ?Sized + 'static,
    S: QualityEventStore + 'static,
    A: ReviewAlertPublisher + 'static,
    O: ObjectStore + 'static,
{
    quality_router(quality)
        .merge(privacy_router(redaction))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
