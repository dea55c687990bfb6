use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::repository::{AuditRepository, RepositoryError, ReportId, VisitHistoryLookup};
use super::service::{
    PrefillRequest, ServiceReportError, ServiceReportService, ServiceReportSubmission,
};

/// Router builder exposing the automation engine to the form layer.
pub fn service_report_router<R, H>(service: Arc<ServiceReportService<R, H>>) -> Router
where
    R: AuditRepository + 'static,
    H: VisitHistoryLookup + 'static,
{
    Router::new()
        .route(
            "/api/v1/service-reports/defaults",
            post(defaults_handler::<R, H>),
        )
        .route(
            "/api/v1/service-reports/validate",
            post(validate_handler::<R, H>),
        )
        .route(
            "/api/v1/service-reports/submissions",
            post(submit_handler::<R, H>),
        )
        .route(
            "/api/v1/service-reports/submissions/:report_id",
            get(fetch_handler::<R, H>),
        )
        .with_state(service)
}

pub(crate) async fn defaults_handler<R, H>(
    State(service): State<Arc<ServiceReportService<R, H>>>,
    axum::Json(request): axum::Json<PrefillRequest>,
) -> Response
where
    R: AuditRepository + 'static,
    H: VisitHistoryLookup + 'static,
{
    match service.prefill(&request) {
        Ok(defaults) => (StatusCode::OK, axum::Json(defaults)).into_response(),
        Err(other) => internal_error(other),
    }
}

pub(crate) async fn validate_handler<R, H>(
    State(service): State<Arc<ServiceReportService<R, H>>>,
    axum::Json(submission): axum::Json<ServiceReportSubmission>,
) -> Response
where
    R: AuditRepository + 'static,
    H: VisitHistoryLookup + 'static,
{
    let issues = service.validate(&submission);
    (StatusCode::OK, axum::Json(json!({ "issues": issues }))).into_response()
}

pub(crate) async fn submit_handler<R, H>(
    State(service): State<Arc<ServiceReportService<R, H>>>,
    axum::Json(submission): axum::Json<ServiceReportSubmission>,
) -> Response
where
    R: AuditRepository + 'static,
    H: VisitHistoryLookup + 'static,
{
    match service.submit(submission) {
        Ok(record) => {
            let payload = json!({
                "report_id": record.report_id,
                "audit": record.audit,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(ServiceReportError::SubmissionBlocked { issues }) => {
            let payload = json!({
                "error": "submission blocked by validation issues",
                "issues": issues,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(ServiceReportError::Repository(RepositoryError::Conflict)) => {
            let payload = json!({
                "error": "service report already exists",
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(other) => internal_error(other),
    }
}

pub(crate) async fn fetch_handler<R, H>(
    State(service): State<Arc<ServiceReportService<R, H>>>,
    Path(report_id): Path<String>,
) -> Response
where
    R: AuditRepository + 'static,
    H: VisitHistoryLookup + 'static,
{
    let id = ReportId(report_id);
    match service.get(&id) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(ServiceReportError::Repository(RepositoryError::NotFound)) => {
            let payload = json!({
                "report_id": id.0,
                "error": "service report not found",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => internal_error(other),
    }
}

fn internal_error(error: ServiceReportError) -> Response {
    let payload = json!({
        "error": error.to_string(),
    });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}
