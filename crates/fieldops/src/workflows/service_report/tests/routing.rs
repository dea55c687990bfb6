use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::service_report::router::submit_handler;
use crate::workflows::service_report::ServiceReportService;

fn post_json(uri: &str, payload: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(payload).expect("payload serializes")))
        .expect("request builds")
}

#[tokio::test]
async fn submit_handler_returns_conflict_on_duplicate() {
    let service = Arc::new(ServiceReportService::new(
        engine(),
        Arc::new(ConflictRepository),
        Arc::new(MemoryHistory::default()),
    ));

    let response = submit_handler::<ConflictRepository, MemoryHistory>(
        State(service),
        axum::Json(clean_submission()),
    )
    .await;

    assert_conflict_response(response);
}

#[tokio::test]
async fn submit_handler_returns_internal_error_on_repository_failure() {
    let service = Arc::new(ServiceReportService::new(
        engine(),
        Arc::new(UnavailableRepository),
        Arc::new(MemoryHistory::default()),
    ));

    let response = submit_handler::<UnavailableRepository, MemoryHistory>(
        State(service),
        axum::Json(clean_submission()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn submit_route_creates_then_fetches_report() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);
    let payload = serde_json::to_value(clean_submission()).expect("submission serializes");

    let response = router
        .clone()
        .oneshot(post_json("/api/v1/service-reports/submissions", &payload))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json_body(response).await;
    let report_id = created["report_id"].as_str().expect("report id").to_string();
    assert_eq!(created["audit"]["fee_suggestions"][0]["fee_id"], json!("damage"));

    let response = router
        .oneshot(
            Request::get(format!("/api/v1/service-reports/submissions/{report_id}"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let fetched = read_json_body(response).await;
    assert_eq!(fetched["report_id"], json!(report_id));
    assert_eq!(fetched["units"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn submit_route_rejects_blocked_reports() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);
    let payload = serde_json::to_value(blocked_submission()).expect("submission serializes");

    let response = router
        .oneshot(post_json("/api/v1/service-reports/submissions", &payload))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    let issues = body["issues"].as_array().expect("issues listed");
    assert_eq!(issues.len(), 3);
    assert_eq!(issues[0]["issue_type"], json!("required_field"));
}

#[tokio::test]
async fn validate_route_lists_issues() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(post_json(
            "/api/v1/service-reports/validate",
            &json!({"form_data": {"volume_gallons": 150}}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["issues"][0]["field_id"], json!("overflow_notes"));
}

#[tokio::test]
async fn defaults_route_returns_prefill() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(post_json(
            "/api/v1/service-reports/defaults",
            &json!({"job_data": {"tank_size": 400}}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["pump_minutes"], json!(110));
    assert!(body["inspection_date"].is_string());
}

#[tokio::test]
async fn fetch_route_returns_not_found() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/service-reports/submissions/sr-unknown")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
