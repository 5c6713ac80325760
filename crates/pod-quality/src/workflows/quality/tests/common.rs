use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::workflows::quality::domain::{
    DamagePredictions, DeliveryContext, DmsCoordinate, ExifRecord, GpsInfo, Rational,
};
use crate::workflows::quality::pipeline::QualityRecord;
use crate::workflows::quality::ports::{
    AlertError, DeliveryCollaborators, QualityEventStore, ReviewAlert, ReviewAlertPublisher,
    StoreError,
};
use crate::workflows::quality::scoring::{DamageScorer, QualityIndexAggregator, QualityWeights};
use crate::workflows::quality::service::DeliveryQualityService;
use crate::workflows::storage::{CollaboratorError, FetchedObject, ObjectMetadata};

pub(super) const OBJECT_NAME: &str = "deliveries/photo-001.jpg";
pub(super) const EXPECTED_LATITUDE: f64 = 37.7749;
pub(super) const EXPECTED_LONGITUDE: f64 = -122.4194;

pub(super) fn timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

pub(super) fn context(promised: &str, delivered: &str) -> DeliveryContext {
    DeliveryContext::new(
        OBJECT_NAME,
        EXPECTED_LATITUDE,
        EXPECTED_LONGITUDE,
        timestamp(promised),
        timestamp(delivered),
    )
    .expect("valid context")
}

pub(super) fn on_time_context() -> DeliveryContext {
    context("2024-01-10T17:00:00Z", "2024-01-10T16:45:00Z")
}

/// Degrees/minutes/seconds encoding of a positive decimal degree value.
fn to_dms(decimal: f64) -> DmsCoordinate {
    let degrees = decimal.trunc();
    let minutes_full = (decimal - degrees) * 60.0;
    let minutes = minutes_full.trunc();
    let seconds = (minutes_full - minutes) * 60.0;
    DmsCoordinate([
        Rational(degrees as u32, 1),
        Rational(minutes as u32, 1),
        Rational((seconds * 10_000.0).round() as u32, 10_000),
    ])
}

pub(super) fn exif_at(latitude: f64, longitude: f64) -> ExifRecord {
    ExifRecord {
        gps: Some(GpsInfo {
            latitude: Some(to_dms(latitude.abs())),
            latitude_ref: Some(if latitude < 0.0 { "S" } else { "N" }.to_string()),
            longitude: Some(to_dms(longitude.abs())),
            longitude_ref: Some(if longitude < 0.0 { "W" } else { "E" }.to_string()),
            ..GpsInfo::default()
        }),
        ..ExifRecord::default()
    }
}

pub(super) fn predictions(pairs: &[(&str, f64)]) -> DamagePredictions {
    pairs
        .iter()
        .map(|(label, probability)| (label.to_string(), *probability))
        .collect()
}

pub(super) fn aggregator() -> QualityIndexAggregator {
    QualityIndexAggregator::new(&QualityWeights::default(), 100.0, DamageScorer::Simple)
        .expect("valid aggregator")
}

pub(super) fn event_json(promised: &str, delivered: &str) -> Value {
    json!({
        "eventType": "com.oraclecloud.objectstorage.createobject",
        "eventTime": delivered,
        "data": { "resourceName": OBJECT_NAME },
        "additionalDetails": {
            "expectedLatitude": EXPECTED_LATITUDE,
            "expectedLongitude": EXPECTED_LONGITUDE.to_string(),
            "promisedTime": promised,
        }
    })
}

/// Fake collaborators with canned replies and a recorded call log.
pub(super) struct ScriptedCollaborators {
    pub(super) exif: ExifRecord,
    pub(super) predictions: DamagePredictions,
    pub(super) replies: Mutex<VecDeque<Result<String, CollaboratorError>>>,
    pub(super) fail_fetch: bool,
    pub(super) calls: Mutex<Vec<String>>,
}

impl ScriptedCollaborators {
    pub(super) fn new(exif: ExifRecord, predictions: DamagePredictions, decision: &str) -> Self {
        Self {
            exif,
            predictions,
            replies: Mutex::new(VecDeque::from(vec![
                Ok("A parcel rests on a porch beside a blue door. House number 42 is visible.".to_string()),
                Ok(decision.to_string()),
            ])),
            fail_fetch: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn failing_fetch() -> Self {
        Self {
            fail_fetch: true,
            ..Self::new(ExifRecord::default(), DamagePredictions::new(), "")
        }
    }

    pub(super) fn with_reasoning_failure(mut self) -> Self {
        self.replies = Mutex::new(VecDeque::from(vec![
            Ok("summary".to_string()),
            Err(CollaboratorError::Unavailable("reasoning endpoint timed out".to_string())),
        ]));
        self
    }

    pub(super) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log mutex poisoned").clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls
            .lock()
            .expect("call log mutex poisoned")
            .push(call.into());
    }
}

impl DeliveryCollaborators for ScriptedCollaborators {
    fn fetch_object(&self, object_name: &str) -> Result<FetchedObject, CollaboratorError> {
        self.record(format!("fetch:{object_name}"));
        if self.fail_fetch {
            return Err(CollaboratorError::NotFound(object_name.to_string()));
        }
        Ok(FetchedObject {
            bytes: vec![0xFF, 0xD8, 0xFF],
            metadata: ObjectMetadata {
                content_type: "image/jpeg".to_string(),
                size: 3,
                object_name: object_name.to_string(),
                retrieved_at: timestamp("2024-01-10T16:50:00Z"),
                source: "object-storage".to_string(),
            },
        })
    }

    fn extract_exif(&self, _image: &[u8]) -> Result<ExifRecord, CollaboratorError> {
        self.record("exif");
        Ok(self.exif.clone())
    }

    fn caption(&self, _image: &[u8]) -> Result<String, CollaboratorError> {
        self.record("caption");
        Ok("Package delivered at front door".to_string())
    }

    fn detect_damage(&self, _image: &[u8]) -> Result<DamagePredictions, CollaboratorError> {
        self.record("damage");
        Ok(self.predictions.clone())
    }

    fn reason(&self, prompt: &str) -> Result<String, CollaboratorError> {
        self.record(format!("reason:{}", prompt.lines().next().unwrap_or_default()));
        self.replies
            .lock()
            .expect("reply mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(CollaboratorError::InvalidResponse("no scripted reply".to_string())))
    }
}

#[derive(Default)]
pub(super) struct MemoryStore {
    records: Mutex<Vec<QualityRecord>>,
}

impl MemoryStore {
    pub(super) fn records(&self) -> Vec<QualityRecord> {
        self.records.lock().expect("store mutex poisoned").clone()
    }
}

impl QualityEventStore for MemoryStore {
    fn store(&self, record: &QualityRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .push(record.clone());
        Ok(())
    }
}

pub(super) struct UnavailableStore;

impl QualityEventStore for UnavailableStore {
    fn store(&self, _record: &QualityRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("nosql table offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryAlerts {
    alerts: Mutex<Vec<ReviewAlert>>,
}

impl MemoryAlerts {
    pub(super) fn alerts(&self) -> Vec<ReviewAlert> {
        self.alerts.lock().expect("alert mutex poisoned").clone()
    }
}

impl ReviewAlertPublisher for MemoryAlerts {
    fn publish(&self, alert: ReviewAlert) -> Result<(), AlertError> {
        self.alerts
            .lock()
            .expect("alert mutex poisoned")
            .push(alert);
        Ok(())
    }
}

pub(super) struct BrokenAlerts;

impl ReviewAlertPublisher for BrokenAlerts {
    fn publish(&self, _alert: ReviewAlert) -> Result<(), AlertError> {
        Err(AlertError::Transport("topic not found".to_string()))
    }
}

pub(super) fn build_service(
    collaborators: ScriptedCollaborators,
) -> (
    DeliveryQualityService<ScriptedCollaborators, MemoryStore, MemoryAlerts>,
    Arc<ScriptedCollaborators>,
    Arc<MemoryStore>,
    Arc<MemoryAlerts>,
) {
    let collaborators = Arc::new(collaborators);
    let store = Arc::new(MemoryStore::default());
    let alerts = Arc::new(MemoryAlerts::default());
    let service = DeliveryQualityService::new(
        collaborators.clone(),
        aggregator(),
        store.clone(),
        alerts.clone(),
    );
    (service, collaborators, store, alerts)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
