use serde::{Deserialize, Serialize};

use super::automation::AutomationAudit;
use super::domain::FormRecord;

/// Identifier wrapper for stored service reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub String);

/// Key identifying the job (site, customer, or asset) whose visit history is consulted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(pub String);

/// Repository record containing the submitted data and its automation audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub report_id: ReportId,
    pub job_key: Option<JobKey>,
    pub form_data: FormRecord,
    #[serde(default)]
    pub units: Vec<FormRecord>,
    pub audit: AutomationAudit,
}

impl SubmissionRecord {
    pub fn fee_total(&self) -> f64 {
        self.audit
            .fee_suggestions
            .iter()
            .map(|entry| entry.recommendation.fee_amount)
            .sum()
    }

    pub fn summary(&self) -> SubmissionSummary {
        SubmissionSummary {
            report_id: self.report_id.clone(),
            unit_count: self.units.len(),
            triggered_rules: self
                .audit
                .triggered_rule_ids()
                .into_iter()
                .map(str::to_string)
                .collect(),
            fee_count: self.audit.fee_suggestions.len(),
            fee_total: self.fee_total(),
        }
    }
}

/// Compact view of a stored submission for listings and CLI output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionSummary {
    pub report_id: ReportId,
    pub unit_count: usize,
    pub triggered_rules: Vec<String>,
    pub fee_count: usize,
    pub fee_total: f64,
}

/// Storage abstraction so the service module can be exercised in isolation.
pub trait AuditRepository: Send + Sync {
    fn insert(&self, record: SubmissionRecord) -> Result<SubmissionRecord, RepositoryError>;
    fn fetch(&self, id: &ReportId) -> Result<Option<SubmissionRecord>, RepositoryError>;
}

/// Source of the most recent prior visit record for a job.
pub trait VisitHistoryLookup: Send + Sync {
    fn last_visit(&self, job: &JobKey) -> Result<Option<FormRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
