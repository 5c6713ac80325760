use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use super::redaction::{FaceRedactor, RedactionError};
use crate::error::ErrorPayload;
use crate::workflows::storage::{CollaboratorError, ObjectStore};

pub const DEFAULT_BLUR_PREFIX: &str = "blurred/";
pub const STATUS_REDACTED: &str = "success";
/// Face blurring is switched off and the stored copy is the original image.
pub const STATUS_SKIPPED: &str = "skipped";

/// Where redacted copies are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionTarget {
    pub namespace: String,
    pub bucket: String,
    pub blur_prefix: String,
}

impl Default for RedactionTarget {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            bucket: String::new(),
            blur_prefix: DEFAULT_BLUR_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedactionRequest {
    #[serde(rename = "objectName", default)]
    pub object_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionSummary {
    pub status: String,
    pub blurred_image_path: String,
    pub faces_detected: usize,
    pub original_object: String,
    pub blurred_object: String,
    pub namespace: String,
    pub bucket: String,
}

/// Fetches a stored photo, blurs faces and stores the redacted copy.
pub struct RedactionService<S> {
    store: Arc<S>,
    redactor: FaceRedactor,
    target: RedactionTarget,
}

impl<S> RedactionService<S>
where
    S: ObjectStore + 'static,
{
    pub fn new(store: Arc<S>, redactor: FaceRedactor, target: RedactionTarget) -> Self {
        Self {
            store,
            redactor,
            target,
        }
    }

    pub fn handle_request(
        &self,
        request: &RedactionRequest,
    ) -> Result<RedactionSummary, RedactionServiceError> {
        let object_name = request
            .object_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(RedactionServiceError::MissingObjectName)?;
        self.redact_object(object_name)
    }

    pub fn redact_object(
        &self,
        object_name: &str,
    ) -> Result<RedactionSummary, RedactionServiceError> {
        let span = info_span!("face_redaction", object = object_name);
        let _entered = span.enter();

        let original = self
            .store
            .get_object(object_name)
            .map_err(RedactionServiceError::Fetch)?;
        let outcome = self.redactor.redact(&original.bytes)?;

        // Disabled blurring hands back the original bytes, so its type is kept.
        let (status, content_type) = if self.redactor.policy().enable_face_blurring() {
            (STATUS_REDACTED, mime::IMAGE_JPEG.essence_str())
        } else {
            (STATUS_SKIPPED, original.metadata.content_type.as_str())
        };

        let blurred_object = format!("{}{}", self.target.blur_prefix, object_name);
        let location = self
            .store
            .put_object(&blurred_object, &outcome.bytes, content_type)
            .map_err(RedactionServiceError::Store)?;
        info!(
            status,
            faces = outcome.face_count(),
            blurred_object = %blurred_object,
            "redacted copy stored"
        );

        Ok(RedactionSummary {
            status: status.to_string(),
            blurred_image_path: location,
            faces_detected: outcome.face_count(),
            original_object: object_name.to_string(),
            blurred_object,
            namespace: self.target.namespace.clone(),
            bucket: self.target.bucket.clone(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RedactionServiceError {
    #[error("objectName is required")]
    MissingObjectName,
    #[error("failed to retrieve object: {0}")]
    Fetch(#[source] CollaboratorError),
    #[error(transparent)]
    Redaction(#[from] RedactionError),
    #[error("failed to store blurred image: {0}")]
    Store(#[source] CollaboratorError),
}

impl RedactionServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            RedactionServiceError::MissingObjectName
            | RedactionServiceError::Fetch(CollaboratorError::InvalidObjectName(_)) => {
                "invalid_request"
            }
            RedactionServiceError::Fetch(_) | RedactionServiceError::Store(_) => {
                "storage_unavailable"
            }
            RedactionServiceError::Redaction(_) => "redaction_failed",
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}
