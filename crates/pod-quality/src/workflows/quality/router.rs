use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tracing::error;

use super::ports::{DeliveryCollaborators, QualityEventStore, ReviewAlertPublisher};
use super::service::DeliveryQualityService;
use crate::error::{error_response, AppError, ErrorPayload};

/// Router exposing the delivery event intake endpoint.
pub fn quality_router<C, S, A>(service: Arc<DeliveryQualityService<C, S, A>>) -> Router
where
    C: DeliveryCollaborators + ?Sized + 'static,
    S: QualityEventStore + 'static,
    A: ReviewAlertPublisher + 'static,
{
    Router::new()
        .route("/api/v1/deliveries/events", post(event_handler::<C, S, A>))
        .with_state(service)
}

pub(crate) async fn event_handler<C, S, A>(
    State(service): State<Arc<DeliveryQualityService<C, S, A>>>,
    body: Bytes,
) -> Response
where
    C: DeliveryCollaborators + ?Sized + 'static,
    S: QualityEventStore + 'static,
    A: ReviewAlertPublisher + 'static,
{
    let outcome = tokio::task::spawn_blocking(move || service.handle_event(&body)).await;

    match outcome {
        Ok(Ok(record)) => (StatusCode::OK, axum::Json(record)).into_response(),
        Ok(Err(err)) => {
            error!(kind = err.kind(), error = %err, "delivery event failed");
            AppError::from(err).into_response()
        }
        Err(join_error) => {
            error!(error = %join_error, "quality worker terminated");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorPayload::internal(join_error.to_string()),
            )
        }
    }
}
