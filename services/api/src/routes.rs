use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use fieldops::workflows::service_report::{
    service_report_router, AuditRepository, ServiceReportService, VisitHistoryLookup,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_service_report_routes<R, H>(
    service: Arc<ServiceReportService<R, H>>,
) -> axum::Router
where
    R: AuditRepository + 'static,
    H: VisitHistoryLookup + 'static,
{
    service_report_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{standard_rule_book, InMemoryAuditRepository, InMemoryVisitHistory};
    use axum::body::Body;
    use axum::http::Request;
    use fieldops::workflows::service_report::AutomationEngine;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        let service = Arc::new(ServiceReportService::new(
            AutomationEngine::new(standard_rule_book(), Default::default()),
            Arc::new(InMemoryAuditRepository::default()),
            Arc::new(InMemoryVisitHistory::default()),
        ));
        with_service_report_routes(service).layer(Extension(state))
    }

    async fn status_of(router: axum::Router, uri: &str) -> StatusCode {
        router
            .oneshot(Request::get(uri).body(Body::empty()).expect("request builds"))
            .await
            .expect("route executes")
            .status()
    }

    #[tokio::test]
    async fn readiness_tracks_startup_flag() {
        assert_eq!(status_of(app(false), "/ready").await, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(app(true), "/ready").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_and_metrics_respond() {
        assert_eq!(status_of(app(false), "/health").await, StatusCode::OK);
        assert_eq!(status_of(app(true), "/metrics").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn service_report_routes_are_mounted() {
        assert_eq!(
            status_of(app(true), "/api/v1/service-reports/submissions/sr-none").await,
            StatusCode::NOT_FOUND
        );
    }
}
