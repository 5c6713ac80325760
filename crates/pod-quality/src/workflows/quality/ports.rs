use serde::{Deserialize, Serialize};

use super::domain::{DamagePredictions, ExifRecord};
use super::metadata;
use super::pipeline::QualityRecord;
use crate::workflows::storage::{CollaboratorError, FetchedObject};

/// External capabilities the quality pipeline depends on.
///
/// Implementations are injected by the hosting service; tests supply fakes.
pub trait DeliveryCollaborators: Send + Sync {
    fn fetch_object(&self, object_name: &str) -> Result<FetchedObject, CollaboratorError>;

    fn extract_exif(&self, image: &[u8]) -> Result<ExifRecord, CollaboratorError> {
        metadata::extract_exif(image)
    }

    /// Short natural-language description of the photo.
    fn caption(&self, image: &[u8]) -> Result<String, CollaboratorError>;

    /// Label probabilities from the damage model.
    fn detect_damage(&self, image: &[u8]) -> Result<DamagePredictions, CollaboratorError>;

    /// Free-text completion for a prompt.
    fn reason(&self, prompt: &str) -> Result<String, CollaboratorError>;
}

/// Sink for every completed quality record.
pub trait QualityEventStore: Send + Sync {
    fn store(&self, record: &QualityRecord) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("quality store unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification hook for deliveries that need a human look.
pub trait ReviewAlertPublisher: Send + Sync {
    fn publish(&self, alert: ReviewAlert) -> Result<(), AlertError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewAlert {
    pub object_name: String,
    pub quality_index: f64,
    pub issues: Vec<String>,
    pub insights: String,
}

impl ReviewAlert {
    pub fn from_record(record: &QualityRecord) -> Self {
        Self {
            object_name: record.metadata.object_name.clone(),
            quality_index: record.quality_metrics.quality_index,
            issues: record.assessment.issues.clone(),
            insights: record.assessment.insights.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("alert transport unavailable: {0}")]
    Transport(String),
}
