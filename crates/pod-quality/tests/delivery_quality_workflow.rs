//! End-to-end scenarios for delivery quality assessment through the public
//! service facade and HTTP router, with photos served from a local asset
//! directory.

mod common {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use pod_quality::workflows::quality::{
        AlertError, DamagePredictions, DeliveryCollaborators, DeliveryQualityService,
        DmsCoordinate, ExifRecord, GpsInfo, QualityEventStore, QualityIndexAggregator,
        QualityRecord, QualityWeights, Rational, ReviewAlert, ReviewAlertPublisher, StoreError,
    };
    use pod_quality::workflows::quality::DamageScorer;
    use pod_quality::workflows::storage::{
        CollaboratorError, FetchedObject, LocalAssetStore, ObjectStore,
    };

    /// Photo geotagged at 37°46'29.64"N 122°25'9.84"W.
    pub(super) fn geotagged_exif() -> ExifRecord {
        ExifRecord {
            gps: Some(GpsInfo {
                latitude: Some(DmsCoordinate([
                    Rational(37, 1),
                    Rational(46, 1),
                    Rational(2964, 100),
                ])),
                latitude_ref: Some("N".to_string()),
                longitude: Some(DmsCoordinate([
                    Rational(122, 1),
                    Rational(25, 1),
                    Rational(984, 100),
                ])),
                longitude_ref: Some("W".to_string()),
                ..GpsInfo::default()
            }),
            ..ExifRecord::default()
        }
    }

    pub(super) struct StubbedVision {
        store: LocalAssetStore,
        exif: ExifRecord,
        damage: DamagePredictions,
        verdict: String,
        prompts: Mutex<Vec<String>>,
    }

    impl StubbedVision {
        pub(super) fn new(root: &Path, damage: f64, verdict: &str) -> Self {
            Self {
                store: LocalAssetStore::new(root, "deliveries/"),
                exif: geotagged_exif(),
                damage: DamagePredictions::from([
                    ("damage".to_string(), damage),
                    ("no_damage".to_string(), 1.0 - damage),
                ]),
                verdict: verdict.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(super) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("prompt mutex poisoned").clone()
        }
    }

    impl DeliveryCollaborators for StubbedVision {
        fn fetch_object(&self, object_name: &str) -> Result<FetchedObject, CollaboratorError> {
            self.store.get_object(object_name)
        }

        fn extract_exif(&self, _image: &[u8]) -> Result<ExifRecord, CollaboratorError> {
            Ok(self.exif.clone())
        }

        fn caption(&self, _image: &[u8]) -> Result<String, CollaboratorError> {
            Ok("A cardboard box on a doormat".to_string())
        }

        fn detect_damage(&self, _image: &[u8]) -> Result<DamagePredictions, CollaboratorError> {
            Ok(self.damage.clone())
        }

        fn reason(&self, prompt: &str) -> Result<String, CollaboratorError> {
            self.prompts
                .lock()
                .expect("prompt mutex poisoned")
                .push(prompt.to_string());
            if prompt.contains("Respond with a JSON object") {
                Ok(self.verdict.clone())
            } else {
                Ok("Box left on the doormat beside the front door.".to_string())
            }
        }
    }

    #[derive(Default)]
    pub(super) struct RecordingStore {
        pub(super) records: Mutex<Vec<QualityRecord>>,
    }

    impl QualityEventStore for RecordingStore {
        fn store(&self, record: &QualityRecord) -> Result<(), StoreError> {
            self.records
                .lock()
                .expect("store mutex poisoned")
                .push(record.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    pub(super) struct RecordingAlerts {
        pub(super) alerts: Mutex<Vec<ReviewAlert>>,
    }

    impl ReviewAlertPublisher for RecordingAlerts {
        fn publish(&self, alert: ReviewAlert) -> Result<(), AlertError> {
            self.alerts
                .lock()
                .expect("alert mutex poisoned")
                .push(alert);
            Ok(())
        }
    }

    pub(super) type Service = DeliveryQualityService<StubbedVision, RecordingStore, RecordingAlerts>;

    pub(super) fn service(
        collaborators: StubbedVision,
    ) -> (Arc<Service>, Arc<StubbedVision>, Arc<RecordingStore>, Arc<RecordingAlerts>) {
        let collaborators = Arc::new(collaborators);
        let store = Arc::new(RecordingStore::default());
        let alerts = Arc::new(RecordingAlerts::default());
        let aggregator =
            QualityIndexAggregator::new(&QualityWeights::default(), 50.0, DamageScorer::Simple)
                .expect("valid aggregator");
        let service = Arc::new(DeliveryQualityService::new(
            collaborators.clone(),
            aggregator,
            store.clone(),
            alerts.clone(),
        ));
        (service, collaborators, store, alerts)
    }

    pub(super) fn write_photo(root: &Path, name: &str) {
        let path = root.join("deliveries").join(name);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("deliveries dir");
        image::RgbImage::from_pixel(32, 24, image::Rgb([160, 120, 80]))
            .save(&path)
            .expect("write photo");
    }

    pub(super) fn event(resource_name: &str, delivered: &str) -> serde_json::Value {
        serde_json::json!({
            "eventType": "com.oraclecloud.objectstorage.createobject",
            "eventTime": delivered,
            "data": { "resourceName": resource_name },
            "additionalDetails": {
                "expectedLatitude": "37.7749",
                "expectedLongitude": -122.4194,
                "promisedTime": "2024-01-10T17:00:00Z"
            }
        })
    }
}

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use pod_quality::workflows::quality::{quality_router, AssessmentStatus};
use tower::ServiceExt;

use common::{event, service, write_photo, StubbedVision};

const APPROVED: &str = r#"{"status": "OK", "issues": [], "insights": "Clear, on-site photo."}"#;

#[test]
fn on_time_intact_delivery_is_accepted_without_alert() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_photo(dir.path(), "photo-001.png");
    let (service, collaborators, store, alerts) =
        service(StubbedVision::new(dir.path(), 0.1, APPROVED));

    let payload = event("photo-001.png", "2024-01-10T16:45:00Z").to_string();
    let record = service.handle_event(payload.as_bytes()).expect("assessed");

    assert_eq!(record.metadata.object_name, "deliveries/photo-001.png");
    assert_eq!(record.metadata.content_type, "image/png");
    assert_eq!(record.caption_summary, "Box left on the doormat beside the front door.");
    assert!(record.quality_metrics.location_accuracy > 0.99);
    assert_eq!(record.quality_metrics.timeliness, 1.0);
    assert!((record.quality_metrics.damage - 0.9).abs() < 1e-9);
    assert!(record.quality_metrics.quality_index > 0.95);
    assert_eq!(record.assessment.status, AssessmentStatus::Ok);

    let prompts = collaborators.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("A cardboard box on a doormat"));
    assert!(prompts[1].contains("Box left on the doormat"));

    assert_eq!(store.records.lock().expect("store").len(), 1);
    assert!(alerts.alerts.lock().expect("alerts").is_empty());
}

#[test]
fn late_damaged_delivery_flagged_for_review() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_photo(dir.path(), "photo-002.png");
    let verdict = r#"{"status": "Review", "issues": ["visible crushing"], "insights": "Corner crushed."}"#;
    let (service, _, store, alerts) = service(StubbedVision::new(dir.path(), 0.8, verdict));

    let payload = event("deliveries/photo-002.png", "2024-01-10T19:00:00Z").to_string();
    let record = service.handle_event(payload.as_bytes()).expect("assessed");

    assert!((record.quality_metrics.timeliness - 0.5).abs() < 1e-9);
    assert!((record.quality_metrics.damage - 0.2).abs() < 1e-9);
    assert_eq!(record.assessment.status, AssessmentStatus::Review);

    let alerts = alerts.alerts.lock().expect("alerts");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].object_name, "deliveries/photo-002.png");
    assert_eq!(alerts[0].issues, vec!["visible crushing".to_string()]);
    assert_eq!(store.records.lock().expect("store").len(), 1);
}

#[tokio::test]
async fn router_reports_missing_photo_as_fetch_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (service, _, store, _) = service(StubbedVision::new(dir.path(), 0.1, APPROVED));
    let router = quality_router(service);

    let request = Request::post("/api/v1/deliveries/events")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            event("missing.png", "2024-01-10T16:45:00Z").to_string(),
        ))
        .expect("request");
    let response = router.oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
    assert_eq!(body["error"]["kind"], "collaborator_unavailable");
    assert!(body["error"]["message"]
        .as_str()
        .expect("message")
        .starts_with("fetch stage failed"));
    assert!(store.records.lock().expect("store").is_empty());
}

#[test]
fn resource_names_cannot_leave_the_asset_root() {
    let base = tempfile::tempdir().expect("tempdir");
    let root = base.path().join("assets");
    write_photo(&base.path().join("elsewhere"), "photo-003.png");
    let (service, _, store, _) = service(StubbedVision::new(&root, 0.1, APPROVED));

    let payload = event(
        "../../elsewhere/deliveries/photo-003.png",
        "2024-01-10T16:45:00Z",
    )
    .to_string();
    let err = service
        .handle_event(payload.as_bytes())
        .expect_err("traversal refused");

    assert!(err.to_string().contains("escapes the asset root"));
    assert!(store.records.lock().expect("store").is_empty());
}
