//! Rule evaluation for service-report forms.
//!
//! Every resolver is a pure function of its arguments: rules never fail, unmatched or
//! malformed rules simply have no effect, and only the validator produces caller-facing
//! issues. `AutomationEngine` bundles a rule book with the evidence field keys so the
//! service layer can run the whole pipeline without threading each rule list through.

pub mod audit;
pub mod conditions;
pub mod defaults;
pub mod fees;
pub mod formula;
pub mod requirements;
pub mod validation;

use chrono::{DateTime, Utc};

use super::domain::{EvidenceFields, FeeRecommendation, FormRecord, UnitLoopConfig, ValidationIssue};
use super::rules::RuleBook;

pub use audit::{
    compile_audit, compile_audit_at, AutomationAudit, AutomationTask, FeeDecision,
    FeeSuggestionEntry, NotificationRecord, RuleEvaluation, TriggeredRequirement,
    ValidationResults,
};
pub use conditions::{describe, evaluate, evaluate_all, first_match};
pub use defaults::{resolve_defaults, resolve_defaults_at, system_value, HISTORY_DATE_FIELD};
pub use fees::resolve_fees;
pub use formula::{evaluate_formula, FormulaError};
pub use requirements::{resolve_requirements, RequirementResolution};
pub use validation::{count_photos, validate_submission};

/// Rule book plus the field conventions needed to evaluate it.
#[derive(Debug, Clone)]
pub struct AutomationEngine {
    rules: RuleBook,
    evidence_fields: EvidenceFields,
    unit_loop: UnitLoopConfig,
}

impl AutomationEngine {
    pub fn new(rules: RuleBook, evidence_fields: EvidenceFields) -> Self {
        Self {
            rules,
            evidence_fields,
            unit_loop: UnitLoopConfig::enabled(),
        }
    }

    pub fn with_unit_loop(mut self, unit_loop: UnitLoopConfig) -> Self {
        self.unit_loop = unit_loop;
        self
    }

    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    pub fn evidence_fields(&self) -> &EvidenceFields {
        &self.evidence_fields
    }

    pub fn requirements<'a>(
        &'a self,
        form_data: &FormRecord,
        unit_record: Option<&FormRecord>,
    ) -> RequirementResolution<'a> {
        resolve_requirements(form_data, &self.rules.auto_requirements, unit_record)
    }

    pub fn fees(&self, form_data: &FormRecord, units: Option<&[FormRecord]>) -> Vec<FeeRecommendation> {
        resolve_fees(form_data, &self.rules.fee_suggestions, units)
    }

    pub fn defaults_at(
        &self,
        job_data: &FormRecord,
        history: Option<&FormRecord>,
        now: DateTime<Utc>,
    ) -> FormRecord {
        resolve_defaults_at(job_data, &self.rules.default_values, history, now)
    }

    pub fn validate(&self, form_data: &FormRecord, units: Option<&[FormRecord]>) -> Vec<ValidationIssue> {
        validate_submission(
            form_data,
            &self.rules.auto_requirements,
            units,
            Some(&self.unit_loop),
            &self.evidence_fields,
        )
    }

    pub fn audit_at(
        &self,
        form_data: &FormRecord,
        units: Option<&[FormRecord]>,
        now: DateTime<Utc>,
    ) -> AutomationAudit {
        compile_audit_at(
            form_data,
            &self.rules.auto_requirements,
            &self.rules.fee_suggestions,
            units,
            &self.evidence_fields,
            now,
        )
    }
}
