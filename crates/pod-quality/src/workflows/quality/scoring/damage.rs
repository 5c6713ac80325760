//! Package condition scoring from damage-model output.
//!
//! Two strategies share the [`DamageScorer`] interface: the simple scorer
//! inverts the model's `damage` probability, while the weighted scorer
//! buckets per-damage-type probabilities into severity levels and combines
//! their severity scores with normalized type weights.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::super::domain::DamagePredictions;

pub const DAMAGE_LABEL: &str = "damage";
pub const LEAKAGE_LABEL: &str = "leakage";
pub const BOX_DEFORMATION_LABEL: &str = "boxDeformation";
pub const PACKAGING_INTEGRITY_LABEL: &str = "packagingIntegrity";
pub const CORNER_DAMAGE_LABEL: &str = "cornerDamage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageScoringMode {
    #[default]
    Simple,
    Weighted,
}

impl FromStr for DamageScoringMode {
    type Err = DamageScoringError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "weighted" => Ok(Self::Weighted),
            other => Err(DamageScoringError::UnknownMode(other.to_string())),
        }
    }
}

/// Converts damage-model output into a condition score in [0, 1].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DamageScorer {
    #[default]
    Simple,
    Weighted(WeightedDamageScoring),
}

impl DamageScorer {
    pub fn mode(&self) -> DamageScoringMode {
        match self {
            DamageScorer::Simple => DamageScoringMode::Simple,
            DamageScorer::Weighted(_) => DamageScoringMode::Weighted,
        }
    }

    pub fn score(&self, predictions: &DamagePredictions) -> f64 {
        match self {
            DamageScorer::Simple => simple_score(predictions),
            DamageScorer::Weighted(weighted) => match weighted.damage_probability(predictions) {
                Some(probability) => invert(probability),
                None => simple_score(predictions),
            },
        }
    }
}

/// `1 - p(damage)`, with a missing label treated as no damage.
pub fn simple_score(predictions: &DamagePredictions) -> f64 {
    invert(predictions.get(DAMAGE_LABEL).copied().unwrap_or(0.0))
}

fn invert(probability: f64) -> f64 {
    if probability.is_nan() {
        return 0.0;
    }
    (1.0 - probability).clamp(0.0, 1.0)
}

/// Relative importance of each damage type before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageTypeWeights {
    pub leakage: f64,
    pub box_deformation: f64,
    pub packaging_integrity: f64,
    pub corner_damage: f64,
}

impl Default for DamageTypeWeights {
    fn default() -> Self {
        Self {
            leakage: 0.4,
            box_deformation: 0.3,
            packaging_integrity: 0.2,
            corner_damage: 0.1,
        }
    }
}

impl DamageTypeWeights {
    fn entries(&self) -> [(&'static str, f64); 4] {
        [
            (LEAKAGE_LABEL, self.leakage),
            (BOX_DEFORMATION_LABEL, self.box_deformation),
            (PACKAGING_INTEGRITY_LABEL, self.packaging_integrity),
            (CORNER_DAMAGE_LABEL, self.corner_damage),
        ]
    }

    pub fn normalized(&self) -> Result<Vec<(&'static str, f64)>, DamageScoringError> {
        let entries = self.entries();
        for (label, weight) in entries {
            if !weight.is_finite() || weight < 0.0 {
                return Err(DamageScoringError::InvalidTypeWeight { label, weight });
            }
        }

        let total: f64 = entries.iter().map(|(_, weight)| weight).sum();
        if total <= 0.0 {
            return Err(DamageScoringError::AllTypeWeightsZero);
        }

        Ok(entries
            .into_iter()
            .map(|(label, weight)| (label, weight / total))
            .collect())
    }
}

/// Damage probability assigned to each severity level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityScores {
    pub none: f64,
    pub minor: f64,
    pub moderate: f64,
    pub severe: f64,
}

impl Default for SeverityScores {
    fn default() -> Self {
        Self {
            none: 0.05,
            minor: 0.35,
            moderate: 0.65,
            severe: 0.9,
        }
    }
}

impl SeverityScores {
    pub fn for_severity(&self, severity: Severity) -> f64 {
        match severity {
            Severity::None => self.none,
            Severity::Minor => self.minor,
            Severity::Moderate => self.moderate,
            Severity::Severe => self.severe,
        }
    }

    fn validate(&self) -> Result<(), DamageScoringError> {
        for severity in [
            Severity::None,
            Severity::Minor,
            Severity::Moderate,
            Severity::Severe,
        ] {
            let score = self.for_severity(severity);
            if !(0.0..=1.0).contains(&score) {
                return Err(DamageScoringError::InvalidSeverityScore { severity, score });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Minor,
    Moderate,
    Severe,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::None => "none",
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        };
        f.write_str(label)
    }
}

/// Bucket boundaries for mapping a probability onto a [`Severity`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    none_max: f64,
    minor_min: f64,
    minor_max: f64,
    moderate_min: f64,
    moderate_max: f64,
    severe_min: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            none_max: 0.1,
            minor_min: 0.3,
            minor_max: 0.4,
            moderate_min: 0.6,
            moderate_max: 0.7,
            severe_min: 0.9,
        }
    }
}

impl SeverityThresholds {
    /// Requires `0 <= none_max < minor_min < minor_max <= moderate_min <
    /// moderate_max <= severe_min <= 1`.
    pub fn new(
        none_max: f64,
        minor_min: f64,
        minor_max: f64,
        moderate_min: f64,
        moderate_max: f64,
        severe_min: f64,
    ) -> Result<Self, DamageScoringError> {
        let ordered = 0.0 <= none_max
            && none_max < minor_min
            && minor_min < minor_max
            && minor_max <= moderate_min
            && moderate_min < moderate_max
            && moderate_max <= severe_min
            && severe_min <= 1.0;
        if !ordered {
            return Err(DamageScoringError::UnorderedThresholds);
        }

        Ok(Self {
            none_max,
            minor_min,
            minor_max,
            moderate_min,
            moderate_max,
            severe_min,
        })
    }

    pub fn none_max(&self) -> f64 {
        self.none_max
    }

    pub fn minor_min(&self) -> f64 {
        self.minor_min
    }

    pub fn minor_max(&self) -> f64 {
        self.minor_max
    }

    pub fn moderate_min(&self) -> f64 {
        self.moderate_min
    }

    pub fn moderate_max(&self) -> f64 {
        self.moderate_max
    }

    pub fn severe_min(&self) -> f64 {
        self.severe_min
    }

    /// Probabilities between two buckets land in the more severe one.
    pub fn classify(&self, probability: f64) -> Severity {
        if probability <= self.none_max {
            Severity::None
        } else if probability <= self.minor_max {
            Severity::Minor
        } else if probability <= self.moderate_max {
            Severity::Moderate
        } else {
            Severity::Severe
        }
    }
}

/// Severity-bucket scoring over the four tracked damage types.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedDamageScoring {
    weights: Vec<(&'static str, f64)>,
    thresholds: SeverityThresholds,
    severity_scores: SeverityScores,
}

impl WeightedDamageScoring {
    pub fn new(
        type_weights: DamageTypeWeights,
        thresholds: SeverityThresholds,
        severity_scores: SeverityScores,
    ) -> Result<Self, DamageScoringError> {
        severity_scores.validate()?;
        Ok(Self {
            weights: type_weights.normalized()?,
            thresholds,
            severity_scores,
        })
    }

    pub fn thresholds(&self) -> &SeverityThresholds {
        &self.thresholds
    }

    /// Per-type severity for every tracked label; absent labels read as 0.
    pub fn severities(&self, predictions: &DamagePredictions) -> Vec<(&'static str, Severity)> {
        self.weights
            .iter()
            .map(|(label, _)| {
                let probability = predictions.get(*label).copied().unwrap_or(0.0);
                (*label, self.thresholds.classify(probability))
            })
            .collect()
    }

    /// Combined damage probability, or `None` when the model reported none
    /// of the tracked damage types.
    pub fn damage_probability(&self, predictions: &DamagePredictions) -> Option<f64> {
        let reported = self
            .weights
            .iter()
            .any(|(label, _)| predictions.contains_key(*label));
        if !reported {
            return None;
        }

        let probability = self
            .severities(predictions)
            .into_iter()
            .zip(self.weights.iter())
            .map(|((_, severity), (_, weight))| {
                weight * self.severity_scores.for_severity(severity)
            })
            .sum();
        Some(probability)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DamageScoringError {
    #[error("at least one damage type weight must be positive")]
    AllTypeWeightsZero,
    #[error("damage type weight '{label}' must be a finite, non-negative number (got {weight})")]
    InvalidTypeWeight { label: &'static str, weight: f64 },
    #[error(
        "damage score thresholds must be ordered: 0.0 <= none_max < minor_min < minor_max \
         <= moderate_min < moderate_max <= severe_min <= 1.0"
    )]
    UnorderedThresholds,
    #[error("severity score for '{severity}' must be within [0, 1] (got {score})")]
    InvalidSeverityScore { severity: Severity, score: f64 },
    #[error("unknown damage scoring mode '{0}' (expected 'simple' or 'weighted')")]
    UnknownMode(String),
}
