use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use super::domain::QualityMetrics;
use crate::workflows::storage::ObjectMetadata;

/// Issue recorded when the reasoning reply cannot be parsed as JSON.
pub const NON_JSON_ISSUE: &str = "LLM returned non-JSON response";

/// Verdict label. Labels other than `OK` and `Review` are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssessmentStatus {
    Ok,
    Review,
    Other(String),
}

impl AssessmentStatus {
    pub fn label(&self) -> &str {
        match self {
            AssessmentStatus::Ok => "OK",
            AssessmentStatus::Review => "Review",
            AssessmentStatus::Other(label) => label,
        }
    }

    pub fn requires_review(&self) -> bool {
        matches!(self, AssessmentStatus::Review)
    }
}

impl From<&str> for AssessmentStatus {
    fn from(label: &str) -> Self {
        match label {
            "OK" => AssessmentStatus::Ok,
            "Review" => AssessmentStatus::Review,
            other => AssessmentStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for AssessmentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for AssessmentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatusVisitor;

        impl Visitor<'_> for StatusVisitor {
            type Value = AssessmentStatus;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a status label")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                Ok(AssessmentStatus::from(value))
            }
        }

        deserializer.deserialize_str(StatusVisitor)
    }
}

/// Structured verdict produced by the decision step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub status: AssessmentStatus,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub insights: String,
    /// Any further keys the reasoning reply carried.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AssessmentResult {
    fn review(issue: impl Into<String>, insights: &str) -> Self {
        Self {
            status: AssessmentStatus::Review,
            issues: vec![issue.into()],
            insights: insights.to_string(),
            extra: BTreeMap::new(),
        }
    }
}

pub fn caption_summary_prompt(metadata: &ObjectMetadata, caption: &str) -> String {
    format!(
        "You are validating proof-of-delivery photos. Given the delivery metadata\n\
         {}\nand the automated caption {caption}, summarize the scene in 2 sentences \
         highlighting delivery location cues.",
        metadata_json(metadata)
    )
}

pub fn decision_prompt(
    metadata: &ObjectMetadata,
    caption_summary: &str,
    metrics: &QualityMetrics,
) -> String {
    let metrics = serde_json::to_string(metrics).unwrap_or_default();
    format!(
        "Review the delivery metadata: {}.\n\
         Caption summary: {caption_summary}.\n\
         Quality metrics: {metrics}.\n\
         Respond with a JSON object containing keys 'status' (OK or Review),\n\
         'issues' (list of strings), and 'insights' (string).",
        metadata_json(metadata)
    )
}

fn metadata_json(metadata: &ObjectMetadata) -> String {
    serde_json::to_string(metadata).unwrap_or_default()
}

/// Parses a reasoning reply. Unusable replies are routed to human review.
pub fn interpret(raw: &str) -> AssessmentResult {
    let trimmed = raw.trim();
    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(_) => {
            warn!("reasoning reply was not JSON; routing delivery to review");
            return AssessmentResult::review(NON_JSON_ISSUE, raw);
        }
    };

    match serde_json::from_value::<AssessmentResult>(value) {
        Ok(result) => result,
        Err(err) => {
            warn!(error = %err, "reasoning reply lacked the assessment shape");
            AssessmentResult::review(format!("LLM response missing assessment fields: {err}"), raw)
        }
    }
}

/// Asks the reasoning capability for a verdict on the computed metrics.
///
/// Parsing never fails; only the reasoning call itself can.
pub fn decide<F, E>(
    metadata: &ObjectMetadata,
    caption_summary: &str,
    metrics: &QualityMetrics,
    reasoning: F,
) -> Result<AssessmentResult, E>
where
    F: FnOnce(&str) -> Result<String, E>,
{
    let prompt = decision_prompt(metadata, caption_summary, metrics);
    let reply = reasoning(&prompt)?;
    Ok(interpret(&reply))
}
