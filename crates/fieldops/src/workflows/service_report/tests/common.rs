use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use crate::workflows::service_report::repository::{
    AuditRepository, JobKey, RepositoryError, ReportId, SubmissionRecord, VisitHistoryLookup,
};
use crate::workflows::service_report::{
    service_report_router, AutomationEngine, EvidenceFields, FormRecord, RuleBook,
    ServiceReportService, ServiceReportSubmission,
};

pub(super) fn record(value: Value) -> FormRecord {
    serde_json::from_value(value).expect("object record")
}

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 15, 14, 30, 0)
        .single()
        .expect("valid instant")
}

/// Rule book for a portable sanitation route: overflow notes on large pump-outs, photo and
/// signature evidence for damaged units, a per-unit damage fee, and a few prefills.
pub(super) fn rule_book() -> RuleBook {
    serde_json::from_value(json!({
        "auto_requirements": [
            {
                "id": "overflow",
                "name": "Overflow documentation",
                "conditions": [
                    {"field": "volume_gallons", "operator": "greater_than", "value": 100}
                ],
                "required_fields": ["overflow_notes"]
            },
            {
                "id": "damage-evidence",
                "name": "Damaged unit evidence",
                "conditions": [
                    {"field": "unit_status", "operator": "equals", "value": "damaged"}
                ],
                "required_fields": ["damage_notes"],
                "evidence_requirements": {
                    "min_photos": 2,
                    "signature_required": true
                }
            }
        ],
        "fee_suggestions": [
            {
                "id": "damage-fee",
                "fee_id": "damage",
                "fee_name": "Damaged Unit Fee",
                "fee_amount": 75,
                "scope": "per_unit",
                "conditions": [
                    {"field": "unit_status", "operator": "equals", "value": "damaged"}
                ]
            },
            {
                "id": "after-hours",
                "fee_id": "after_hours",
                "fee_name": "After Hours Service",
                "fee_amount": 120,
                "scope": "per_job",
                "auto_add": true,
                "prevent_duplicates": true,
                "conditions": [
                    {"field": "arrival_hour", "operator": "greater_than", "value": 17}
                ]
            }
        ],
        "default_values": [
            {"field_id": "inspection_date", "source": "system", "source_field": "current_date"},
            {"field_id": "contact_name", "source": "job_data", "source_field": "site_contact"},
            {
                "field_id": "tank_condition",
                "source": "last_visit",
                "source_field": "tank_condition",
                "days_threshold": 30
            },
            {
                "field_id": "pump_minutes",
                "source": "formula",
                "formula": "{tank_size} * 0.25 + 10"
            }
        ]
    }))
    .expect("rule book fixture parses")
}

pub(super) fn engine() -> AutomationEngine {
    AutomationEngine::new(rule_book(), EvidenceFields::default())
}

pub(super) fn clean_submission() -> ServiceReportSubmission {
    ServiceReportSubmission {
        job_key: Some(JobKey("site-17".to_string())),
        form_data: record(json!({
            "volume_gallons": 150,
            "overflow_notes": "Minor spill contained",
            "arrival_hour": 19
        })),
        units: Some(vec![
            record(json!({
                "unit_id": "U1",
                "unit_status": "damaged",
                "damage_notes": "Cracked door hinge",
                "photo_before": ["p1.jpg"],
                "photo_after": ["p2.jpg"],
                "signature": "data:image/png;base64,AAAA"
            })),
            record(json!({"unit_id": "U2", "unit_status": "ok"})),
        ]),
    }
}

pub(super) fn blocked_submission() -> ServiceReportSubmission {
    let mut submission = clean_submission();
    submission.form_data = record(json!({"volume_gallons": 150}));
    submission.units = Some(vec![record(json!({"unit_id": "U1", "unit_status": "damaged"}))]);
    submission
}

pub(super) type TestService = ServiceReportService<MemoryRepository, MemoryHistory>;

pub(super) fn build_service() -> (TestService, Arc<MemoryRepository>, Arc<MemoryHistory>) {
    let repository = Arc::new(MemoryRepository::default());
    let history = Arc::new(MemoryHistory::default());
    let service = ServiceReportService::new(engine(), repository.clone(), history.clone());
    (service, repository, history)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<ReportId, SubmissionRecord>>>,
}

impl MemoryRepository {
    pub(super) fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }
}

impl AuditRepository for MemoryRepository {
    fn insert(&self, record: SubmissionRecord) -> Result<SubmissionRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.report_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.report_id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ReportId) -> Result<Option<SubmissionRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryHistory {
    visits: Arc<Mutex<HashMap<JobKey, FormRecord>>>,
}

impl MemoryHistory {
    pub(super) fn remember(&self, job: &str, visit: FormRecord) {
        self.visits
            .lock()
            .expect("history mutex poisoned")
            .insert(JobKey(job.to_string()), visit);
    }
}

impl VisitHistoryLookup for MemoryHistory {
    fn last_visit(&self, job: &JobKey) -> Result<Option<FormRecord>, RepositoryError> {
        let guard = self.visits.lock().expect("history mutex poisoned");
        Ok(guard.get(job).cloned())
    }
}

pub(super) struct ConflictRepository;

impl AuditRepository for ConflictRepository {
    fn insert(&self, _record: SubmissionRecord) -> Result<SubmissionRecord, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn fetch(&self, _id: &ReportId) -> Result<Option<SubmissionRecord>, RepositoryError> {
        Ok(None)
    }
}

pub(super) struct UnavailableRepository;

impl AuditRepository for UnavailableRepository {
    fn insert(&self, _record: SubmissionRecord) -> Result<SubmissionRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ReportId) -> Result<Option<SubmissionRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) struct OfflineHistory;

impl VisitHistoryLookup for OfflineHistory {
    fn last_visit(&self, _job: &JobKey) -> Result<Option<FormRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("history offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn assert_conflict_response(response: Response) {
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    service_report_router(Arc::new(service))
}
