//! Proof-of-delivery photo quality assessment.
//!
//! A delivery event names a photo in object storage. The pipeline fetches it,
//! reads EXIF, captions it, runs damage inference, scores location,
//! timeliness and condition, then asks a reasoning capability for an
//! `OK`/`Review` verdict. Every record is persisted and review verdicts raise
//! an alert.

pub mod assessment;
pub mod domain;
pub mod metadata;
pub mod pipeline;
pub mod ports;
pub mod router;
pub mod scoring;
pub mod service;

pub use assessment::{AssessmentResult, AssessmentStatus, NON_JSON_ISSUE};
pub use domain::{
    parse_timestamp, DamagePredictions, DeliveryContext, DmsCoordinate, EventError, ExifRecord,
    GpsInfo, QualityMetrics, Rational,
};
pub use pipeline::{run_quality_pipeline, PipelineError, PipelineStage, QualityRecord};
pub use ports::{
    AlertError, DeliveryCollaborators, QualityEventStore, ReviewAlert, ReviewAlertPublisher,
    StoreError,
};
pub use router::quality_router;
pub use scoring::{
    compute_quality_index, DamageScorer, DamageScoringMode, QualityIndexAggregator,
    QualityWeights, ScoringError,
};
pub use service::{DeliveryQualityService, QualityServiceError};

#[cfg(test)]
mod tests;
