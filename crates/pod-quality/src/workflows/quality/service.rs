use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{DeliveryContext, EventError};
use super::pipeline::{run_quality_pipeline, PipelineError, QualityRecord};
use super::ports::{
    AlertError, DeliveryCollaborators, QualityEventStore, ReviewAlert, ReviewAlertPublisher,
    StoreError,
};
use super::scoring::QualityIndexAggregator;
use crate::error::ErrorPayload;

/// Service composing the collaborators, scoring configuration, record store
/// and review alerts.
pub struct DeliveryQualityService<C: ?Sized, S, A> {
    collaborators: Arc<C>,
    aggregator: Arc<QualityIndexAggregator>,
    store: Arc<S>,
    alerts: Arc<A>,
}

impl<C, S, A> DeliveryQualityService<C, S, A>
where
    C: DeliveryCollaborators + ?Sized + 'static,
    S: QualityEventStore + 'static,
    A: ReviewAlertPublisher + 'static,
{
    pub fn new(
        collaborators: Arc<C>,
        aggregator: QualityIndexAggregator,
        store: Arc<S>,
        alerts: Arc<A>,
    ) -> Self {
        Self {
            collaborators,
            aggregator: Arc::new(aggregator),
            store,
            alerts,
        }
    }

    pub fn aggregator(&self) -> &QualityIndexAggregator {
        &self.aggregator
    }

    /// Parse a raw delivery event and assess it.
    pub fn handle_event(&self, payload: &[u8]) -> Result<QualityRecord, QualityServiceError> {
        let context = DeliveryContext::from_event_json(payload)?;
        self.assess(&context)
    }

    /// Assess a delivery, persist the record and raise an alert for review
    /// verdicts.
    pub fn assess(&self, context: &DeliveryContext) -> Result<QualityRecord, QualityServiceError> {
        let record = run_quality_pipeline(self.collaborators.as_ref(), &self.aggregator, context)?;

        self.store.store(&record)?;

        if record.assessment.status.requires_review() {
            warn!(
                object = context.object_name(),
                quality_index = record.quality_metrics.quality_index,
                "delivery flagged for human review"
            );
            self.alerts.publish(ReviewAlert::from_record(&record))?;
        } else {
            info!(object = context.object_name(), status = %record.assessment.status, "delivery accepted");
        }

        Ok(record)
    }
}

/// Error raised by the delivery quality service.
#[derive(Debug, thiserror::Error)]
pub enum QualityServiceError {
    #[error(transparent)]
    Event(#[from] EventError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Alert(#[from] AlertError),
}

impl QualityServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            QualityServiceError::Event(_) => "invalid_event",
            QualityServiceError::Pipeline(_) => "collaborator_unavailable",
            QualityServiceError::Store(_) => "persistence_failed",
            QualityServiceError::Alert(_) => "alert_failed",
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}
