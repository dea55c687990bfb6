use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::domain::{
    EvidenceFields, FeeRecommendation, FormRecord, UnitLoopConfig, ValidationIssue,
};
use super::super::rules::{AutoRequirementRule, EvidenceRequirements, FeeSuggestionRule};
use super::fees::resolve_fees;
use super::requirements::resolve_requirements;
use super::validation::validate_submission;

/// One auto-requirement rule and whether it fired at job level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub rule_id: String,
    pub rule_name: String,
    pub triggered: bool,
    pub evaluated_at: DateTime<Utc>,
}

/// Snapshot of a triggered auto-requirement, detached from the rule definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredRequirement {
    pub rule_id: String,
    pub rule_name: String,
    pub required_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_requirements: Option<EvidenceRequirements>,
}

/// What the user did with a suggested fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeDecision {
    Accepted,
    Dismissed,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSuggestionEntry {
    #[serde(flatten)]
    pub recommendation: FeeRecommendation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_decision: Option<FeeDecision>,
}

/// Follow-up task created by the caller after compiling the audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationTask {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_rule_id: Option<String>,
}

/// Notification dispatched by the caller on behalf of the automation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub channel: String,
    pub recipient: String,
    pub template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResults {
    pub blocking_issues: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// Storable compliance record of one submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationAudit {
    pub compiled_at: DateTime<Utc>,
    pub rules_evaluated: Vec<RuleEvaluation>,
    pub auto_requirements_triggered: Vec<TriggeredRequirement>,
    pub fee_suggestions: Vec<FeeSuggestionEntry>,
    pub tasks_created: Vec<AutomationTask>,
    pub notifications_sent: Vec<NotificationRecord>,
    pub validation_results: ValidationResults,
}

impl AutomationAudit {
    pub fn has_blocking_issues(&self) -> bool {
        !self.validation_results.blocking_issues.is_empty()
    }

    pub fn triggered_rule_ids(&self) -> Vec<&str> {
        self.rules_evaluated
            .iter()
            .filter(|evaluation| evaluation.triggered)
            .map(|evaluation| evaluation.rule_id.as_str())
            .collect()
    }

    /// Record the user's decision on matching fee suggestions, returning how many matched.
    /// `unit_id` of `None` matches every suggestion for the fee.
    pub fn record_fee_decision(
        &mut self,
        fee_id: &str,
        unit_id: Option<&str>,
        decision: FeeDecision,
    ) -> usize {
        let mut matched = 0;
        for entry in self.fee_suggestions.iter_mut().filter(|entry| {
            entry.recommendation.fee_id == fee_id
                && unit_id
                    .map(|unit| entry.recommendation.unit_id.as_deref() == Some(unit))
                    .unwrap_or(true)
        }) {
            entry.user_decision = Some(decision);
            matched += 1;
        }
        matched
    }

    pub fn record_task(&mut self, task: AutomationTask) {
        self.tasks_created.push(task);
    }

    pub fn record_notification(&mut self, notification: NotificationRecord) {
        self.notifications_sent.push(notification);
    }
}

/// Compile the audit for a submission using the current wall clock.
pub fn compile_audit(
    form_data: &FormRecord,
    auto_requirements: &[AutoRequirementRule],
    fee_rules: &[FeeSuggestionRule],
    units: Option<&[FormRecord]>,
    evidence_fields: &EvidenceFields,
) -> AutomationAudit {
    compile_audit_at(
        form_data,
        auto_requirements,
        fee_rules,
        units,
        evidence_fields,
        Utc::now(),
    )
}

/// Compile the audit as of `now`. Requirement triggering is reported at job level only;
/// validation walks units whenever any are supplied.
pub fn compile_audit_at(
    form_data: &FormRecord,
    auto_requirements: &[AutoRequirementRule],
    fee_rules: &[FeeSuggestionRule],
    units: Option<&[FormRecord]>,
    evidence_fields: &EvidenceFields,
    now: DateTime<Utc>,
) -> AutomationAudit {
    let resolution = resolve_requirements(form_data, auto_requirements, None);

    let rules_evaluated = auto_requirements
        .iter()
        .map(|rule| RuleEvaluation {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            triggered: resolution.was_triggered(&rule.id),
            evaluated_at: now,
        })
        .collect();

    let auto_requirements_triggered = resolution
        .triggered_rules
        .iter()
        .map(|rule| TriggeredRequirement {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            required_fields: rule.required_fields.clone(),
            evidence_requirements: rule.evidence_requirements.clone(),
        })
        .collect();

    let fee_suggestions = resolve_fees(form_data, fee_rules, units)
        .into_iter()
        .map(|recommendation| FeeSuggestionEntry {
            recommendation,
            user_decision: None,
        })
        .collect();

    let unit_loop = UnitLoopConfig {
        enabled: units.is_some(),
        ..UnitLoopConfig::default()
    };
    let blocking_issues = validate_submission(
        form_data,
        auto_requirements,
        units,
        Some(&unit_loop),
        evidence_fields,
    );

    AutomationAudit {
        compiled_at: now,
        rules_evaluated,
        auto_requirements_triggered,
        fee_suggestions,
        tasks_created: Vec::new(),
        notifications_sent: Vec::new(),
        validation_results: ValidationResults {
            blocking_issues,
            warnings: Vec::new(),
        },
    }
}
