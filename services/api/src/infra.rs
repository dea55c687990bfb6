use fieldops::config::AutomationConfig;
use fieldops::error::AppError;
use fieldops::workflows::service_report::{
    AuditRepository, AutoRequirementRule, ConditionOperator, ConditionSet, DefaultValueRule,
    DefaultValueSource, EvidenceRequirements, FeeScope, FeeSuggestionRule, FormRecord, JobKey,
    ReportId, RepositoryError, RuleBook, RuleCondition, SubmissionRecord, VisitHistoryLookup,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAuditRepository {
    records: Arc<Mutex<HashMap<ReportId, SubmissionRecord>>>,
}

impl AuditRepository for InMemoryAuditRepository {
    fn insert(&self, record: SubmissionRecord) -> Result<SubmissionRecord, RepositoryError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("audit store poisoned".to_string()))?;
        if guard.contains_key(&record.report_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.report_id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ReportId) -> Result<Option<SubmissionRecord>, RepositoryError> {
        let guard = self
            .records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("audit store poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }
}

/// Visit history keyed by job; the most recent stored visit wins.
#[derive(Default, Clone)]
pub(crate) struct InMemoryVisitHistory {
    visits: Arc<Mutex<HashMap<JobKey, FormRecord>>>,
}

impl InMemoryVisitHistory {
    pub(crate) fn record_visit(&self, job: JobKey, visit: FormRecord) {
        if let Ok(mut guard) = self.visits.lock() {
            guard.insert(job, visit);
        }
    }
}

impl VisitHistoryLookup for InMemoryVisitHistory {
    fn last_visit(&self, job: &JobKey) -> Result<Option<FormRecord>, RepositoryError> {
        let guard = self
            .visits
            .lock()
            .map_err(|_| RepositoryError::Unavailable("visit history poisoned".to_string()))?;
        Ok(guard.get(job).cloned())
    }
}

/// Rule book from `override_path`, then the configured path, else the built-in route rules.
pub(crate) fn load_rule_book(
    config: &AutomationConfig,
    override_path: Option<PathBuf>,
) -> Result<RuleBook, AppError> {
    match override_path.or_else(|| config.rules_path.clone()) {
        Some(path) => {
            let book = RuleBook::from_path(&path)?;
            info!(
                path = %path.display(),
                auto_requirements = book.auto_requirements.len(),
                fee_suggestions = book.fee_suggestions.len(),
                default_values = book.default_values.len(),
                "rule book loaded"
            );
            Ok(book)
        }
        None => Ok(standard_rule_book()),
    }
}

pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let file = std::fs::File::open(path)?;
    let value = serde_json::from_reader(file).map_err(std::io::Error::from)?;
    Ok(value)
}

/// Rules for a portable sanitation route, used when no rule book is configured.
pub(crate) fn standard_rule_book() -> RuleBook {
    let damaged = || {
        ConditionSet::new(vec![RuleCondition::new(
            "unit_status",
            ConditionOperator::Equals,
            json!("damaged"),
        )])
    };

    RuleBook {
        auto_requirements: vec![
            AutoRequirementRule {
                id: "overflow-notes".to_string(),
                name: "Overflow documentation".to_string(),
                is_active: true,
                conditions: ConditionSet::new(vec![RuleCondition::new(
                    "volume_gallons",
                    ConditionOperator::GreaterThan,
                    json!(100),
                )]),
                required_fields: vec!["overflow_notes".to_string()],
                evidence_requirements: None,
            },
            AutoRequirementRule {
                id: "damage-evidence".to_string(),
                name: "Damaged unit evidence".to_string(),
                is_active: true,
                conditions: damaged(),
                required_fields: vec!["damage_notes".to_string()],
                evidence_requirements: Some(EvidenceRequirements {
                    min_photos: Some(2),
                    gps_required: true,
                    signature_required: false,
                }),
            },
        ],
        fee_suggestions: vec![
            FeeSuggestionRule {
                id: "damage-fee".to_string(),
                fee_id: "damage".to_string(),
                fee_name: "Damaged Unit Fee".to_string(),
                fee_amount: 75.0,
                conditions: damaged(),
                scope: FeeScope::PerUnit,
                auto_add: false,
                prevent_duplicates: false,
                is_active: true,
            },
            FeeSuggestionRule {
                id: "restock-fee".to_string(),
                fee_id: "restock".to_string(),
                fee_name: "Supply Restock".to_string(),
                fee_amount: 15.0,
                conditions: ConditionSet::new(vec![RuleCondition::new(
                    "supplies_restocked",
                    ConditionOperator::InList,
                    json!(["paper", "sanitizer", "both"]),
                )]),
                scope: FeeScope::PerUnit,
                auto_add: true,
                prevent_duplicates: true,
                is_active: true,
            },
        ],
        default_values: vec![
            DefaultValueRule {
                source_field: Some("current_date".to_string()),
                ..DefaultValueRule::new("service_date", DefaultValueSource::System)
            },
            DefaultValueRule {
                source_field: Some("site_contact".to_string()),
                ..DefaultValueRule::new("contact_name", DefaultValueSource::JobData)
            },
            DefaultValueRule {
                source_field: Some("access_notes".to_string()),
                days_threshold: Some(90),
                ..DefaultValueRule::new("access_notes", DefaultValueSource::LastVisit)
            },
            DefaultValueRule {
                formula: Some("{unit_count} * 12 + 15".to_string()),
                ..DefaultValueRule::new("estimated_minutes", DefaultValueSource::Formula)
            },
        ],
    }
}
