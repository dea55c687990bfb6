//! Service-report automation: conditional requirements, fee suggestions, prefill
//! defaults, submission validation, and the audit stored alongside each report.

pub mod automation;
pub mod domain;
pub mod repository;
pub mod router;
pub mod rules;
pub mod service;

#[cfg(test)]
mod tests;

pub use automation::{
    AutomationAudit, AutomationEngine, FeeDecision, FormulaError, RequirementResolution,
};
pub use domain::{
    field_label, EvidenceFields, FeeRecommendation, FormRecord, IssueType, UnitLoopConfig,
    UnitRecord, ValidationIssue,
};
pub use repository::{
    AuditRepository, JobKey, RepositoryError, ReportId, SubmissionRecord, SubmissionSummary,
    VisitHistoryLookup,
};
pub use router::service_report_router;
pub use rules::{
    AutoRequirementRule, ConditionLogic, ConditionOperator, ConditionSet, DefaultValueRule,
    DefaultValueSource, EvidenceRequirements, FeeScope, FeeSuggestionRule, RuleBook,
    RuleBookError, RuleCondition, SystemField,
};
pub use service::{
    PrefillRequest, ServiceReportError, ServiceReportService, ServiceReportSubmission,
};
