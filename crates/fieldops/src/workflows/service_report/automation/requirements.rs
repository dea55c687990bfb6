use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::super::domain::FormRecord;
use super::super::rules::{AutoRequirementRule, EvidenceRequirements};
use super::conditions::evaluate_all;

/// Fields and evidence made mandatory by the rules that triggered for one subject.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequirementResolution<'a> {
    pub required_fields: BTreeSet<String>,
    pub evidence_requirements: BTreeMap<String, EvidenceRequirements>,
    pub triggered_rules: Vec<&'a AutoRequirementRule>,
    /// Name of the first triggered rule that required each field.
    pub required_by: BTreeMap<String, String>,
}

impl<'a> RequirementResolution<'a> {
    pub fn is_required(&self, field: &str) -> bool {
        self.required_fields.contains(field)
    }

    pub fn was_triggered(&self, rule_id: &str) -> bool {
        self.triggered_rules.iter().any(|rule| rule.id == rule_id)
    }
}

/// Resolve auto-requirements against the unit record when given, else the whole form.
pub fn resolve_requirements<'a>(
    form_data: &FormRecord,
    rules: &'a [AutoRequirementRule],
    unit_record: Option<&FormRecord>,
) -> RequirementResolution<'a> {
    let subject = unit_record.unwrap_or(form_data);
    let mut resolution = RequirementResolution::default();

    for rule in rules.iter().filter(|rule| rule.is_active) {
        if !evaluate_all(&rule.conditions, subject) {
            continue;
        }

        debug!(rule_id = %rule.id, rule_name = %rule.name, "auto-requirement triggered");

        for field in &rule.required_fields {
            resolution.required_fields.insert(field.clone());
            resolution
                .required_by
                .entry(field.clone())
                .or_insert_with(|| rule.name.clone());
        }

        if let Some(evidence) = &rule.evidence_requirements {
            resolution
                .evidence_requirements
                .insert(rule.id.clone(), evidence.clone());
        }

        resolution.triggered_rules.push(rule);
    }

    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::service_report::rules::{ConditionOperator, ConditionSet, RuleCondition};
    use serde_json::json;

    fn rule(id: &str, field: &str, threshold: i64, required: &[&str]) -> AutoRequirementRule {
        AutoRequirementRule {
            id: id.to_string(),
            name: format!("{id} rule"),
            is_active: true,
            conditions: ConditionSet::new(vec![RuleCondition::new(
                field,
                ConditionOperator::GreaterThan,
                json!(threshold),
            )]),
            required_fields: required.iter().map(|f| f.to_string()).collect(),
            evidence_requirements: None,
        }
    }

    fn record(value: serde_json::Value) -> FormRecord {
        serde_json::from_value(value).expect("object record")
    }

    #[test]
    fn unions_fields_in_input_order() {
        let rules = vec![
            rule("overflow", "volume_gallons", 100, &["overflow_notes", "photo_overflow"]),
            rule("large", "volume_gallons", 120, &["overflow_notes", "supervisor"]),
            rule("huge", "volume_gallons", 500, &["hazmat_form"]),
        ];
        let form = record(json!({"volume_gallons": 150}));

        let resolution = resolve_requirements(&form, &rules, None);

        let ids: Vec<_> = resolution.triggered_rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["overflow", "large"]);
        assert_eq!(resolution.required_fields.len(), 3);
        assert!(resolution.is_required("supervisor"));
        assert!(!resolution.is_required("hazmat_form"));
        assert_eq!(
            resolution.required_by.get("overflow_notes").map(String::as_str),
            Some("overflow rule")
        );
    }

    #[test]
    fn inactive_rules_are_skipped() {
        let mut inactive = rule("overflow", "volume_gallons", 100, &["overflow_notes"]);
        inactive.is_active = false;
        let rules = vec![inactive];

        let resolution = resolve_requirements(&record(json!({"volume_gallons": 150})), &rules, None);

        assert!(resolution.triggered_rules.is_empty());
        assert!(resolution.required_fields.is_empty());
    }

    #[test]
    fn unit_record_replaces_form_as_subject() {
        let rules = vec![rule("unit", "unit_weight", 10, &["unit_photo"])];
        let form = record(json!({"unit_weight": 50}));
        let unit = record(json!({"unit_id": "U1", "unit_weight": 5}));

        let resolution = resolve_requirements(&form, &rules, Some(&unit));

        assert!(resolution.triggered_rules.is_empty());
    }

    #[test]
    fn evidence_is_keyed_by_rule_id() {
        let mut with_evidence = rule("evidence", "volume_gallons", 100, &[]);
        with_evidence.evidence_requirements = Some(EvidenceRequirements {
            min_photos: Some(2),
            gps_required: true,
            signature_required: false,
        });
        let rules = vec![with_evidence];

        let resolution = resolve_requirements(&record(json!({"volume_gallons": 101})), &rules, None);

        let evidence = resolution
            .evidence_requirements
            .get("evidence")
            .expect("evidence recorded");
        assert_eq!(evidence.min_photos, Some(2));
        assert!(evidence.gps_required);
        assert!(resolution.was_triggered("evidence"));
    }
}
