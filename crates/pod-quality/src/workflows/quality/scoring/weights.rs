use serde::{Deserialize, Serialize};

/// Relative importance of each component in the quality index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    pub timeliness: f64,
    pub location_accuracy: f64,
    pub damage_score: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            timeliness: 0.3,
            location_accuracy: 0.3,
            damage_score: 0.4,
        }
    }
}

impl QualityWeights {
    /// Rescales the weights so they sum to one.
    pub fn normalized(&self) -> Result<NormalizedWeights, WeightsError> {
        for (name, value) in [
            ("timeliness", self.timeliness),
            ("location_accuracy", self.location_accuracy),
            ("damage_score", self.damage_score),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(WeightsError::Invalid { name, value });
            }
        }

        let total = self.timeliness + self.location_accuracy + self.damage_score;
        if total <= 0.0 {
            return Err(WeightsError::AllZero);
        }

        Ok(NormalizedWeights {
            timeliness: self.timeliness / total,
            location_accuracy: self.location_accuracy / total,
            damage_score: self.damage_score / total,
        })
    }
}

/// Weights that are guaranteed to be non-negative and sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedWeights {
    timeliness: f64,
    location_accuracy: f64,
    damage_score: f64,
}

impl NormalizedWeights {
    pub fn timeliness(&self) -> f64 {
        self.timeliness
    }

    pub fn location_accuracy(&self) -> f64 {
        self.location_accuracy
    }

    pub fn damage_score(&self) -> f64 {
        self.damage_score
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeightsError {
    #[error("at least one quality index weight must be positive")]
    AllZero,
    #[error("quality index weight '{name}' must be a finite, non-negative number (got {value})")]
    Invalid { name: &'static str, value: f64 },
}
