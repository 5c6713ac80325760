use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::ConfigError;
use crate::workflows::privacy::policy::{
    DEFAULT_BLUR_INTENSITY, DEFAULT_MIN_FACE_SIZE, DEFAULT_MIN_NEIGHBORS, DEFAULT_SCALE_FACTOR,
};
use crate::workflows::privacy::service::DEFAULT_BLUR_PREFIX;
use crate::workflows::privacy::{PrivacyPolicy, RedactionTarget};
use crate::workflows::quality::scoring::{
    DamageScorer, DamageScoringMode, DamageTypeWeights, QualityIndexAggregator, QualityWeights,
    SeverityScores, SeverityThresholds, WeightedDamageScoring, DEFAULT_MAX_DISTANCE_METERS,
};

pub const DEFAULT_DELIVERY_PREFIX: &str = "deliveries/";
pub const DEFAULT_FACE_CASCADE_PATH: &str = "haarcascade_frontalface_default.xml";
pub const DEFAULT_QUALITY_TABLE: &str = "delivery_quality_events";
pub const DEFAULT_REASONING_TIMEOUT_SECS: u64 = 30;

/// Validated settings for the quality and privacy workflows.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub storage: StorageSettings,
    pub aggregator: QualityIndexAggregator,
    pub privacy: PrivacyPolicy,
    pub blur_prefix: String,
    pub face_cascade_path: PathBuf,
    pub reasoning: ReasoningSettings,
    pub persistence: PersistenceSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub namespace: String,
    pub bucket: String,
    pub delivery_prefix: String,
    pub local_asset_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningSettings {
    /// Text-generation endpoint; `None` selects the offline reasoner.
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceSettings {
    pub quality_table: String,
    pub notification_topic_id: Option<String>,
}

impl WorkflowSettings {
    /// Builds settings from a key lookup (the process environment in
    /// production).
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = Source(lookup);

        let storage = StorageSettings {
            namespace: source.string("OCI_OS_NAMESPACE", ""),
            bucket: source.string("OCI_OS_BUCKET", ""),
            delivery_prefix: source.string("DELIVERY_PREFIX", DEFAULT_DELIVERY_PREFIX),
            local_asset_root: PathBuf::from(source.string("LOCAL_ASSET_ROOT", ".")),
        };

        let weights = QualityWeights {
            timeliness: source.parse("WEIGHT_TIMELINESS", 0.3, "a number")?,
            location_accuracy: source.parse("WEIGHT_LOCATION", 0.3, "a number")?,
            damage_score: source.parse("WEIGHT_DAMAGE", 0.4, "a number")?,
        };
        let max_distance_meters =
            source.parse("MAX_DISTANCE_METERS", DEFAULT_MAX_DISTANCE_METERS, "a number")?;
        let aggregator =
            QualityIndexAggregator::new(&weights, max_distance_meters, damage_scorer(&source)?)?;

        let (min_width, min_height) = source.face_size("BLUR_MIN_FACE_SIZE")?;
        let privacy = PrivacyPolicy::builder()
            .blur_intensity(source.parse("BLUR_INTENSITY", DEFAULT_BLUR_INTENSITY, "an integer")?)
            .scale_factor(source.parse("BLUR_SCALE_FACTOR", DEFAULT_SCALE_FACTOR, "a number")?)
            .min_neighbors(source.parse("BLUR_MIN_NEIGHBORS", DEFAULT_MIN_NEIGHBORS, "an integer")?)
            .min_face_size(min_width, min_height)
            .strict_mode(source.flag("STRICT_PRIVACY_MODE", true)?)
            .enable_face_blurring(source.flag("ENABLE_FACE_BLURRING", true)?)
            .build()?;

        let reasoning = ReasoningSettings {
            endpoint: source.optional("REASONING_ENDPOINT"),
            timeout: Duration::from_secs(source.parse(
                "REASONING_TIMEOUT_SECS",
                DEFAULT_REASONING_TIMEOUT_SECS,
                "a whole number of seconds",
            )?),
        };

        let persistence = PersistenceSettings {
            quality_table: source.string("QUALITY_TABLE", DEFAULT_QUALITY_TABLE),
            notification_topic_id: source.optional("NOTIFICATION_TOPIC_ID"),
        };

        Ok(Self {
            storage,
            aggregator,
            privacy,
            blur_prefix: source.string("BLUR_PREFIX", DEFAULT_BLUR_PREFIX),
            face_cascade_path: PathBuf::from(
                source.string("FACE_CASCADE_PATH", DEFAULT_FACE_CASCADE_PATH),
            ),
            reasoning,
            persistence,
        })
    }

    pub fn redaction_target(&self) -> RedactionTarget {
        RedactionTarget {
            namespace: self.storage.namespace.clone(),
            bucket: self.storage.bucket.clone(),
            blur_prefix: self.blur_prefix.clone(),
        }
    }
}

fn damage_scorer<F>(source: &Source<F>) -> Result<DamageScorer, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mode: DamageScoringMode = source
        .optional("DAMAGE_SCORING_MODE")
        .map(|raw| raw.parse::<DamageScoringMode>())
        .transpose()?
        .unwrap_or_default();

    // Thresholds and weights are validated in either mode.
    let defaults = SeverityThresholds::default();
    let thresholds = SeverityThresholds::new(
        source.parse("DAMAGE_NONE_MAX", defaults.none_max(), "a number")?,
        source.parse("DAMAGE_MINOR_MIN", defaults.minor_min(), "a number")?,
        source.parse("DAMAGE_MINOR_MAX", defaults.minor_max(), "a number")?,
        source.parse("DAMAGE_MODERATE_MIN", defaults.moderate_min(), "a number")?,
        source.parse("DAMAGE_MODERATE_MAX", defaults.moderate_max(), "a number")?,
        source.parse("DAMAGE_SEVERE_MIN", defaults.severe_min(), "a number")?,
    )?;

    let type_defaults = DamageTypeWeights::default();
    let type_weights = DamageTypeWeights {
        leakage: source.parse("DAMAGE_WEIGHT_LEAKAGE", type_defaults.leakage, "a number")?,
        box_deformation: source.parse(
            "DAMAGE_WEIGHT_BOX_DEFORMATION",
            type_defaults.box_deformation,
            "a number",
        )?,
        packaging_integrity: source.parse(
            "DAMAGE_WEIGHT_PACKAGING_INTEGRITY",
            type_defaults.packaging_integrity,
            "a number",
        )?,
        corner_damage: source.parse(
            "DAMAGE_WEIGHT_CORNER_DAMAGE",
            type_defaults.corner_damage,
            "a number",
        )?,
    };

    let weighted = WeightedDamageScoring::new(type_weights, thresholds, SeverityScores::default())?;
    Ok(match mode {
        DamageScoringMode::Simple => DamageScorer::Simple,
        DamageScoringMode::Weighted => DamageScorer::Weighted(weighted),
    })
}

struct Source<F>(F);

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: FromStr>(
        &self,
        key: &'static str,
        default: T,
        expected: &'static str,
    ) -> Result<T, ConfigError> {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key,
                value: raw,
                expected,
            }),
        }
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    key,
                    value: raw,
                    expected: "a boolean",
                }),
            },
        }
    }

    /// `WIDTH,HEIGHT` in pixels.
    fn face_size(&self, key: &'static str) -> Result<(u32, u32), ConfigError> {
        let Some(raw) = self.optional(key) else {
            return Ok(DEFAULT_MIN_FACE_SIZE);
        };
        let invalid = || ConfigError::InvalidValue {
            key,
            value: raw.clone(),
            expected: "two comma-separated integers",
        };

        let mut parts = raw.split(',').map(|part| part.trim().parse::<u32>());
        match (parts.next(), parts.next(), parts.next()) {
            (Some(Ok(width)), Some(Ok(height)), None) => Ok((width, height)),
            _ => Err(invalid()),
        }
    }
}
