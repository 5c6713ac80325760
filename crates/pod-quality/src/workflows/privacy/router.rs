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

use super::service::{RedactionRequest, RedactionService};
use crate::error::{error_response, AppError, ErrorPayload};
use crate::workflows::storage::ObjectStore;

/// Router exposing on-demand face redaction of stored photos.
pub fn privacy_router<S>(service: Arc<RedactionService<S>>) -> Router
where
    S: ObjectStore + 'static,
{
    Router::new()
        .route("/api/v1/privacy/redactions", post(redaction_handler::<S>))
        .with_state(service)
}

pub(crate) async fn redaction_handler<S>(
    State(service): State<Arc<RedactionService<S>>>,
    body: Bytes,
) -> Response
where
    S: ObjectStore + 'static,
{
    let request: RedactionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RedactionRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(err) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    ErrorPayload {
                        kind: "invalid_request".to_string(),
                        message: format!("Invalid JSON input: {err}"),
                    },
                )
            }
        }
    };

    let outcome = tokio::task::spawn_blocking(move || service.handle_request(&request)).await;

    match outcome {
        Ok(Ok(summary)) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Ok(Err(err)) => {
            error!(kind = err.kind(), error = %err, "redaction request failed");
            AppError::from(err).into_response()
        }
        Err(join_error) => {
            error!(error = %join_error, "redaction worker terminated");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorPayload::internal(join_error.to_string()),
            )
        }
    }
}
