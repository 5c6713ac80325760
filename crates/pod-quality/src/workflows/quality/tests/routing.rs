use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::quality::router::quality_router;

fn event_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/deliveries/events")
        .header("content-type", "application/json")
        .body(body.into())
        .expect("request")
}

#[tokio::test]
async fn event_endpoint_returns_record() {
    let (service, _, store, _) = build_service(ScriptedCollaborators::new(
        exif_at(EXPECTED_LATITUDE, EXPECTED_LONGITUDE),
        predictions(&[("damage", 0.2)]),
        r#"{"status":"OK","issues":[],"insights":"fine"}"#,
    ));
    let app = quality_router(Arc::new(service));
    let payload = event_json("2024-01-10T17:00:00Z", "2024-01-10T16:45:00Z").to_string();

    let response = app.oneshot(event_request(payload)).await.expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["assessment"]["status"], "OK");
    assert_eq!(body["metadata"]["object_name"], OBJECT_NAME);
    assert_eq!(store.records().len(), 1);
}

#[tokio::test]
async fn malformed_event_returns_bad_request() {
    let (service, _, _, _) = build_service(ScriptedCollaborators::new(
        exif_at(EXPECTED_LATITUDE, EXPECTED_LONGITUDE),
        predictions(&[]),
        "",
    ));
    let app = quality_router(Arc::new(service));

    let response = app.oneshot(event_request("[]")).await.expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["error"]["kind"], "invalid_event");
}

#[tokio::test]
async fn collaborator_failure_returns_bad_gateway() {
    let (service, _, _, _) = build_service(ScriptedCollaborators::failing_fetch());
    let app = quality_router(Arc::new(service));
    let payload = event_json("2024-01-10T17:00:00Z", "2024-01-10T16:45:00Z").to_string();

    let response = app.oneshot(event_request(payload)).await.expect("response");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = read_json_body(response).await;
    assert_eq!(body["error"]["kind"], "collaborator_unavailable");
    assert!(body["error"]["message"]
        .as_str()
        .expect("message")
        .contains("fetch"));
}
