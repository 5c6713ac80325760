pub mod damage;
pub mod geolocation;
pub mod timeliness;
mod weights;

pub use damage::{
    DamageScorer, DamageScoringError, DamageScoringMode, DamageTypeWeights, Severity,
    SeverityScores, SeverityThresholds, WeightedDamageScoring,
};
pub use weights::{NormalizedWeights, QualityWeights, WeightsError};

use super::domain::{DamagePredictions, DeliveryContext, ExifRecord, QualityMetrics};

pub const DEFAULT_MAX_DISTANCE_METERS: f64 = 50.0;

/// Validated scoring configuration applied identically to every event.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityIndexAggregator {
    weights: NormalizedWeights,
    max_distance_meters: f64,
    damage: DamageScorer,
}

impl QualityIndexAggregator {
    pub fn new(
        weights: &QualityWeights,
        max_distance_meters: f64,
        damage: DamageScorer,
    ) -> Result<Self, ScoringError> {
        if !max_distance_meters.is_finite() || max_distance_meters <= 0.0 {
            return Err(ScoringError::InvalidMaxDistance(max_distance_meters));
        }

        Ok(Self {
            weights: weights.normalized()?,
            max_distance_meters,
            damage,
        })
    }

    pub fn weights(&self) -> &NormalizedWeights {
        &self.weights
    }

    pub fn max_distance_meters(&self) -> f64 {
        self.max_distance_meters
    }

    pub fn damage_scorer(&self) -> &DamageScorer {
        &self.damage
    }

    pub fn aggregate(
        &self,
        context: &DeliveryContext,
        exif: &ExifRecord,
        damage_predictions: &DamagePredictions,
    ) -> QualityMetrics {
        let location_accuracy = geolocation::score(exif, context, self.max_distance_meters);
        let timeliness = timeliness::score(context);
        let damage = self.damage.score(damage_predictions);

        let quality_index = self.weights.location_accuracy() * location_accuracy
            + self.weights.timeliness() * timeliness
            + self.weights.damage_score() * damage;

        QualityMetrics {
            location_accuracy,
            timeliness,
            damage,
            quality_index: quality_index.clamp(0.0, 1.0),
        }
    }
}

/// One-shot aggregation with simple damage scoring.
pub fn compute_quality_index(
    context: &DeliveryContext,
    exif: &ExifRecord,
    damage_predictions: &DamagePredictions,
    weights: &QualityWeights,
    max_distance_meters: f64,
) -> Result<QualityMetrics, ScoringError> {
    let aggregator = QualityIndexAggregator::new(weights, max_distance_meters, DamageScorer::Simple)?;
    Ok(aggregator.aggregate(context, exif, damage_predictions))
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error(transparent)]
    Weights(#[from] WeightsError),
    #[error(transparent)]
    Damage(#[from] DamageScoringError),
    #[error("max distance must be a positive number of meters (got {0})")]
    InvalidMaxDistance(f64),
}
