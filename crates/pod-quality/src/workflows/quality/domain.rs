use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Label probabilities returned by the damage model, keyed by label.
pub type DamagePredictions = BTreeMap<String, f64>;

/// Per-event facts the photo is checked against.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryContext {
    object_name: String,
    expected_latitude: f64,
    expected_longitude: f64,
    promised_time: DateTime<Utc>,
    delivered_time: DateTime<Utc>,
}

impl DeliveryContext {
    pub fn new(
        object_name: impl Into<String>,
        expected_latitude: f64,
        expected_longitude: f64,
        promised_time: DateTime<Utc>,
        delivered_time: DateTime<Utc>,
    ) -> Result<Self, EventError> {
        let object_name = object_name.into();
        if object_name.trim().is_empty() {
            return Err(EventError::MissingResourceName);
        }
        if !expected_latitude.is_finite() || !(-90.0..=90.0).contains(&expected_latitude) {
            return Err(EventError::CoordinateOutOfRange {
                field: "expectedLatitude",
                value: expected_latitude,
            });
        }
        if !expected_longitude.is_finite() || !(-180.0..=180.0).contains(&expected_longitude) {
            return Err(EventError::CoordinateOutOfRange {
                field: "expectedLongitude",
                value: expected_longitude,
            });
        }

        Ok(Self {
            object_name,
            expected_latitude,
            expected_longitude,
            promised_time,
            delivered_time,
        })
    }

    /// Builds a context from an object-storage delivery event payload.
    pub fn from_event_json(payload: &[u8]) -> Result<Self, EventError> {
        let event: DeliveryEvent = serde_json::from_slice(payload).map_err(EventError::Malformed)?;

        let expected_latitude = event
            .additional_details
            .expected_latitude
            .resolve("expectedLatitude")?;
        let expected_longitude = event
            .additional_details
            .expected_longitude
            .resolve("expectedLongitude")?;
        let promised_time = parse_timestamp(&event.additional_details.promised_time).ok_or_else(
            || EventError::InvalidTimestamp {
                field: "promisedTime",
                value: event.additional_details.promised_time.clone(),
            },
        )?;
        let delivered_time =
            parse_timestamp(&event.event_time).ok_or_else(|| EventError::InvalidTimestamp {
                field: "eventTime",
                value: event.event_time.clone(),
            })?;

        Self::new(
            event.data.resource_name,
            expected_latitude,
            expected_longitude,
            promised_time,
            delivered_time,
        )
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn expected_latitude(&self) -> f64 {
        self.expected_latitude
    }

    pub fn expected_longitude(&self) -> f64 {
        self.expected_longitude
    }

    pub fn promised_time(&self) -> DateTime<Utc> {
        self.promised_time
    }

    pub fn delivered_time(&self) -> DateTime<Utc> {
        self.delivered_time
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryEvent {
    data: EventData,
    event_time: String,
    additional_details: AdditionalDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventData {
    #[serde(default)]
    resource_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdditionalDetails {
    expected_latitude: RawCoordinate,
    expected_longitude: RawCoordinate,
    promised_time: String,
}

/// Upstream emitters send coordinates either as numbers or numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCoordinate {
    Number(f64),
    Text(String),
}

impl RawCoordinate {
    fn resolve(&self, field: &'static str) -> Result<f64, EventError> {
        match self {
            RawCoordinate::Number(value) => Ok(*value),
            RawCoordinate::Text(raw) => {
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| EventError::InvalidCoordinate {
                        field,
                        value: raw.clone(),
                    })
            }
        }
    }
}

/// Parses an ISO-8601 timestamp; values without an offset are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event payload is malformed: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("event is missing data.resourceName")]
    MissingResourceName,
    #[error("{field} must be an ISO-8601 timestamp (got '{value}')")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("{field} must be numeric (got '{value}')")]
    InvalidCoordinate { field: &'static str, value: String },
    #[error("{field} is out of range (got {value})")]
    CoordinateOutOfRange { field: &'static str, value: f64 },
}

/// Unsigned EXIF rational serialized as `[numerator, denominator]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational(pub u32, pub u32);

impl Rational {
    pub fn to_f64(self) -> Option<f64> {
        if self.1 == 0 {
            None
        } else {
            Some(f64::from(self.0) / f64::from(self.1))
        }
    }
}

/// Degrees, minutes and seconds as stored in the GPS IFD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmsCoordinate(pub [Rational; 3]);

/// GPS sub-mapping of an EXIF record, using the standard tag names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsInfo {
    #[serde(rename = "GPSLatitude", default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<DmsCoordinate>,
    #[serde(rename = "GPSLatitudeRef", default, skip_serializing_if = "Option::is_none")]
    pub latitude_ref: Option<String>,
    #[serde(rename = "GPSLongitude", default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<DmsCoordinate>,
    #[serde(rename = "GPSLongitudeRef", default, skip_serializing_if = "Option::is_none")]
    pub longitude_ref: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Tag name to value mapping extracted from a delivery photo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExifRecord {
    #[serde(rename = "GPSInfo", default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsInfo>,
    #[serde(flatten)]
    pub tags: BTreeMap<String, Value>,
}

impl ExifRecord {
    pub fn is_empty(&self) -> bool {
        self.gps.is_none() && self.tags.is_empty()
    }
}

/// Normalized component scores and the weighted index, each within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub location_accuracy: f64,
    pub timeliness: f64,
    pub damage: f64,
    pub quality_index: f64,
}
