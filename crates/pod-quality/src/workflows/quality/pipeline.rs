use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use super::assessment::{self, AssessmentResult};
use super::domain::{DamagePredictions, DeliveryContext, ExifRecord, QualityMetrics};
use super::ports::DeliveryCollaborators;
use super::scoring::QualityIndexAggregator;
use crate::workflows::storage::{CollaboratorError, ObjectMetadata};

/// Pipeline step that talks to a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Fetch,
    Exif,
    Caption,
    CaptionSummary,
    Damage,
    Decision,
}

impl PipelineStage {
    pub fn label(self) -> &'static str {
        match self {
            PipelineStage::Fetch => "fetch",
            PipelineStage::Exif => "exif",
            PipelineStage::Caption => "caption",
            PipelineStage::CaptionSummary => "caption_summary",
            PipelineStage::Damage => "damage",
            PipelineStage::Decision => "decision",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} stage failed: {source}")]
    Collaborator {
        stage: PipelineStage,
        #[source]
        source: CollaboratorError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Collaborator { stage, .. } => *stage,
        }
    }
}

trait StageResult<T> {
    fn at(self, stage: PipelineStage) -> Result<T, PipelineError>;
}

impl<T> StageResult<T> for Result<T, CollaboratorError> {
    fn at(self, stage: PipelineStage) -> Result<T, PipelineError> {
        self.map_err(|source| PipelineError::Collaborator { stage, source })
    }
}

/// Output record for one delivery event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRecord {
    pub metadata: ObjectMetadata,
    pub exif: ExifRecord,
    pub caption_summary: String,
    pub damage_predictions: DamagePredictions,
    pub quality_metrics: QualityMetrics,
    pub assessment: AssessmentResult,
}

/// Runs fetch, EXIF, captioning, damage inference, scoring and the decision
/// step for one delivery.
pub fn run_quality_pipeline<C>(
    collaborators: &C,
    aggregator: &QualityIndexAggregator,
    context: &DeliveryContext,
) -> Result<QualityRecord, PipelineError>
where
    C: DeliveryCollaborators + ?Sized,
{
    let span = info_span!("quality_pipeline", object = context.object_name());
    let _entered = span.enter();

    let object = collaborators
        .fetch_object(context.object_name())
        .at(PipelineStage::Fetch)?;
    debug!(size = object.metadata.size, content_type = %object.metadata.content_type, "fetched delivery photo");

    let exif = collaborators
        .extract_exif(&object.bytes)
        .at(PipelineStage::Exif)?;
    let caption = collaborators
        .caption(&object.bytes)
        .at(PipelineStage::Caption)?;
    let caption_summary = collaborators
        .reason(&assessment::caption_summary_prompt(&object.metadata, &caption))
        .at(PipelineStage::CaptionSummary)?
        .trim()
        .to_string();
    let damage_predictions = collaborators
        .detect_damage(&object.bytes)
        .at(PipelineStage::Damage)?;

    let quality_metrics = aggregator.aggregate(context, &exif, &damage_predictions);
    let assessment = assessment::decide(
        &object.metadata,
        &caption_summary,
        &quality_metrics,
        |prompt| collaborators.reason(prompt),
    )
    .at(PipelineStage::Decision)?;

    info!(
        quality_index = quality_metrics.quality_index,
        location_accuracy = quality_metrics.location_accuracy,
        timeliness = quality_metrics.timeliness,
        damage = quality_metrics.damage,
        status = %assessment.status,
        "delivery assessed"
    );

    Ok(QualityRecord {
        metadata: object.metadata,
        exif,
        caption_summary,
        damage_predictions,
        quality_metrics,
        assessment,
    })
}
