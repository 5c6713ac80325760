use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::privacy::{DetectorError, RedactionServiceError};
use crate::workflows::quality::QualityServiceError;
use crate::workflows::storage::CollaboratorError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Machine-readable error body returned by the workflow endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: "internal".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Detector(DetectorError),
    Collaborator(CollaboratorError),
    Quality(QualityServiceError),
    Redaction(RedactionServiceError),
}

impl AppError {
    fn payload(&self) -> ErrorPayload {
        match self {
            AppError::Quality(err) => err.payload(),
            AppError::Redaction(err) => err.payload(),
            other => ErrorPayload::internal(other.to_string()),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Detector(err) => write!(f, "face detector error: {}", err),
            AppError::Collaborator(err) => write!(f, "collaborator setup error: {}", err),
            AppError::Quality(err) => write!(f, "quality workflow error: {}", err),
            AppError::Redaction(err) => write!(f, "redaction workflow error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Detector(err) => Some(err),
            AppError::Collaborator(err) => Some(err),
            AppError::Quality(err) => Some(err),
            AppError::Redaction(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Quality(QualityServiceError::Event(_))
            | AppError::Redaction(RedactionServiceError::MissingObjectName)
            | AppError::Redaction(RedactionServiceError::Fetch(
                CollaboratorError::InvalidObjectName(_),
            )) => StatusCode::BAD_REQUEST,
            AppError::Quality(QualityServiceError::Pipeline(_))
            | AppError::Redaction(RedactionServiceError::Fetch(_))
            | AppError::Redaction(RedactionServiceError::Store(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        error_response(status, self.payload())
    }
}

/// `{"error": {"kind", "message"}}` with the given status.
pub(crate) fn error_response(status: StatusCode, payload: ErrorPayload) -> Response {
    (status, Json(json!({ "error": payload }))).into_response()
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<DetectorError> for AppError {
    fn from(value: DetectorError) -> Self {
        Self::Detector(value)
    }
}

impl From<CollaboratorError> for AppError {
    fn from(value: CollaboratorError) -> Self {
        Self::Collaborator(value)
    }
}

impl From<QualityServiceError> for AppError {
    fn from(value: QualityServiceError) -> Self {
        Self::Quality(value)
    }
}

impl From<RedactionServiceError> for AppError {
    fn from(value: RedactionServiceError) -> Self {
        Self::Redaction(value)
    }
}
