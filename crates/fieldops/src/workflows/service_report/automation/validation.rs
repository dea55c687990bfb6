use serde_json::Value;

use super::super::domain::{
    field_label, EvidenceFields, FormRecord, IssueType, UnitLoopConfig, ValidationIssue,
};
use super::super::rules::AutoRequirementRule;
use super::requirements::{resolve_requirements, RequirementResolution};

/// Check a submission against the triggered auto-requirements. An empty result means
/// the submission may be saved.
pub fn validate_submission(
    form_data: &FormRecord,
    rules: &[AutoRequirementRule],
    units: Option<&[FormRecord]>,
    unit_loop: Option<&UnitLoopConfig>,
    evidence_fields: &EvidenceFields,
) -> Vec<ValidationIssue> {
    let unit_loop = unit_loop.filter(|config| config.enabled);

    match (unit_loop, units) {
        (Some(config), Some(units)) if !units.is_empty() => units
            .iter()
            .enumerate()
            .flat_map(|(index, unit)| {
                let resolution = resolve_requirements(form_data, rules, Some(unit));
                validate_unit(unit, index, &resolution, config, evidence_fields)
            })
            .collect(),
        _ => {
            let resolution = resolve_requirements(form_data, rules, None);
            missing_fields(form_data, &resolution)
                .into_iter()
                .map(|(field, rule_name)| ValidationIssue {
                    unit_id: None,
                    unit_index: None,
                    field_label: field_label(&field),
                    message: format!("{} is required", field_label(&field)),
                    field_id: field,
                    issue_type: IssueType::RequiredField,
                    rule_name,
                })
                .collect()
        }
    }
}

fn missing_fields(
    record: &FormRecord,
    resolution: &RequirementResolution<'_>,
) -> Vec<(String, Option<String>)> {
    resolution
        .required_fields
        .iter()
        .filter(|field| !record.has_value(field))
        .map(|field| (field.clone(), resolution.required_by.get(field).cloned()))
        .collect()
}

fn validate_unit(
    unit: &FormRecord,
    index: usize,
    resolution: &RequirementResolution<'_>,
    config: &UnitLoopConfig,
    evidence_fields: &EvidenceFields,
) -> Vec<ValidationIssue> {
    let unit_id = unit.unit_id();
    let prefix = match &unit_id {
        Some(id) => format!("{} {} ({})", config.unit_label, index + 1, id),
        None => format!("{} {}", config.unit_label, index + 1),
    };
    let issue = |field_id: &str, issue_type: IssueType, message: String, rule_name: Option<String>| {
        ValidationIssue {
            unit_id: unit_id.clone(),
            unit_index: Some(index),
            field_id: field_id.to_string(),
            field_label: field_label(field_id),
            issue_type,
            message: format!("{prefix}: {message}"),
            rule_name,
        }
    };

    let mut issues: Vec<ValidationIssue> = missing_fields(unit, resolution)
        .into_iter()
        .map(|(field, rule_name)| {
            issue(
                &field,
                IssueType::RequiredField,
                format!("{} is required", field_label(&field)),
                rule_name,
            )
        })
        .collect();

    for rule in &resolution.triggered_rules {
        let Some(evidence) = rule.evidence_requirements.as_ref() else {
            continue;
        };
        let rule_name = Some(rule.name.clone());

        if let Some(minimum) = evidence.min_photos.filter(|minimum| *minimum > 0) {
            let found = count_photos(unit, &evidence_fields.photo_marker);
            if found < minimum as usize {
                issues.push(issue(
                    "photos",
                    IssueType::MissingEvidence,
                    format!("at least {minimum} photo(s) required, found {found}"),
                    rule_name.clone(),
                ));
            }
        }

        if evidence.gps_required && !unit.has_value(&evidence_fields.gps_field) {
            issues.push(issue(
                &evidence_fields.gps_field,
                IssueType::MissingEvidence,
                "GPS location lock is required".to_string(),
                rule_name.clone(),
            ));
        }

        if evidence.signature_required && !unit.has_value(&evidence_fields.signature_field) {
            issues.push(issue(
                &evidence_fields.signature_field,
                IssueType::MissingEvidence,
                "signature is required".to_string(),
                rule_name,
            ));
        }
    }

    issues
}

/// Photos attached across every field whose key carries the photo marker.
pub fn count_photos(record: &FormRecord, marker: &str) -> usize {
    record
        .iter()
        .filter(|(key, _)| key.contains(marker))
        .map(|(_, value)| match value {
            Value::Array(items) => items.iter().filter(|item| !item.is_null()).count(),
            Value::String(text) if !text.trim().is_empty() => 1,
            Value::Object(map) if !map.is_empty() => 1,
            _ => 0,
        })
        .sum()
}
