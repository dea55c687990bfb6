use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::automation::AutomationEngine;
use super::domain::{FormRecord, ValidationIssue};
use super::repository::{
    AuditRepository, JobKey, RepositoryError, ReportId, SubmissionRecord, VisitHistoryLookup,
};

/// Job context used to prefill a new service report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrefillRequest {
    #[serde(default)]
    pub job_key: Option<JobKey>,
    #[serde(default)]
    pub job_data: FormRecord,
}

/// Completed form payload, optionally with one record per serviced unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceReportSubmission {
    #[serde(default)]
    pub job_key: Option<JobKey>,
    #[serde(default)]
    pub form_data: FormRecord,
    #[serde(default)]
    pub units: Option<Vec<FormRecord>>,
}

/// Service composing the automation engine, audit repository, and visit history.
pub struct ServiceReportService<R, H> {
    engine: Arc<AutomationEngine>,
    repository: Arc<R>,
    history: Arc<H>,
}

static REPORT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_report_id() -> ReportId {
    let id = REPORT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ReportId(format!("sr-{id:06}"))
}

impl<R, H> ServiceReportService<R, H>
where
    R: AuditRepository + 'static,
    H: VisitHistoryLookup + 'static,
{
    pub fn new(engine: AutomationEngine, repository: Arc<R>, history: Arc<H>) -> Self {
        Self {
            engine: Arc::new(engine),
            repository,
            history,
        }
    }

    pub fn engine(&self) -> &AutomationEngine {
        &self.engine
    }

    /// Default values for a new report, drawing on the job's last visit when known.
    pub fn prefill(&self, request: &PrefillRequest) -> Result<FormRecord, ServiceReportError> {
        self.prefill_at(request, Utc::now())
    }

    pub fn prefill_at(
        &self,
        request: &PrefillRequest,
        now: DateTime<Utc>,
    ) -> Result<FormRecord, ServiceReportError> {
        let history = match &request.job_key {
            Some(job) => self.history.last_visit(job)?,
            None => None,
        };
        Ok(self
            .engine
            .defaults_at(&request.job_data, history.as_ref(), now))
    }

    /// Blocking issues for a draft; empty means the report may be submitted.
    pub fn validate(&self, submission: &ServiceReportSubmission) -> Vec<ValidationIssue> {
        self.engine
            .validate(&submission.form_data, submission.units.as_deref())
    }

    /// Validate, compile the audit, and persist the submission.
    pub fn submit(
        &self,
        submission: ServiceReportSubmission,
    ) -> Result<SubmissionRecord, ServiceReportError> {
        self.submit_at(submission, Utc::now())
    }

    pub fn submit_at(
        &self,
        submission: ServiceReportSubmission,
        now: DateTime<Utc>,
    ) -> Result<SubmissionRecord, ServiceReportError> {
        let issues = self.validate(&submission);
        if !issues.is_empty() {
            warn!(issues = issues.len(), "service report submission blocked");
            return Err(ServiceReportError::SubmissionBlocked { issues });
        }

        let audit = self
            .engine
            .audit_at(&submission.form_data, submission.units.as_deref(), now);
        let record = SubmissionRecord {
            report_id: next_report_id(),
            job_key: submission.job_key,
            form_data: submission.form_data,
            units: submission.units.unwrap_or_default(),
            audit,
        };

        let stored = self.repository.insert(record)?;
        info!(
            report_id = %stored.report_id.0,
            fees = stored.audit.fee_suggestions.len(),
            "service report stored"
        );
        Ok(stored)
    }

    /// Fetch a stored submission for API responses.
    pub fn get(&self, report_id: &ReportId) -> Result<SubmissionRecord, ServiceReportError> {
        let record = self
            .repository
            .fetch(report_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }
}

/// Error raised by the service-report service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceReportError {
    #[error("submission blocked by {} validation issue(s)", .issues.len())]
    SubmissionBlocked { issues: Vec<ValidationIssue> },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
