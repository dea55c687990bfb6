use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;
use tracing::debug;

use super::super::domain::FormRecord;
use super::super::rules::{DefaultValueRule, DefaultValueSource, SystemField};
use super::conditions::evaluate_all;
use super::formula::{evaluate_formula, formula_value};

/// Key holding the visit date on a history record.
pub const HISTORY_DATE_FIELD: &str = "date";

/// Compute prefill values for a new record using the current wall clock.
pub fn resolve_defaults(
    job_data: &FormRecord,
    rules: &[DefaultValueRule],
    history: Option<&FormRecord>,
) -> FormRecord {
    resolve_defaults_at(job_data, rules, history, Utc::now())
}

/// Compute prefill values as of `now`. Later rules for the same field overwrite earlier ones.
pub fn resolve_defaults_at(
    job_data: &FormRecord,
    rules: &[DefaultValueRule],
    history: Option<&FormRecord>,
    now: DateTime<Utc>,
) -> FormRecord {
    let mut defaults = FormRecord::new();

    for rule in rules {
        if let Some(conditions) = &rule.conditions {
            if !evaluate_all(conditions, job_data) {
                continue;
            }
        }

        if let Some(value) = default_for(rule, job_data, history, now) {
            defaults.insert(rule.field_id.clone(), value);
        }
    }

    defaults
}

fn default_for(
    rule: &DefaultValueRule,
    job_data: &FormRecord,
    history: Option<&FormRecord>,
    now: DateTime<Utc>,
) -> Option<Value> {
    match rule.source {
        DefaultValueSource::JobData => {
            let field = rule.source_field.as_deref()?;
            job_data.get(field).cloned()
        }
        DefaultValueSource::LastVisit => {
            let threshold = rule.days_threshold?;
            let history = history?;
            let age = days_since(history.get(HISTORY_DATE_FIELD)?, now)?;
            if age > threshold {
                debug!(field_id = %rule.field_id, age, threshold, "last visit too old for default");
                return None;
            }
            let field = rule.source_field.as_deref()?;
            history.get(field).cloned()
        }
        DefaultValueSource::Static => rule.static_value.clone(),
        DefaultValueSource::System => {
            let field = SystemField::parse(rule.source_field.as_deref()?);
            system_value(field, now)
        }
        DefaultValueSource::Formula => {
            let formula = rule.formula.as_deref()?;
            match evaluate_formula(formula, job_data) {
                Ok(result) => formula_value(result),
                Err(err) => {
                    debug!(field_id = %rule.field_id, error = %err, "formula default skipped");
                    None
                }
            }
        }
    }
}

/// Clock-derived value for a `system` default.
pub fn system_value(field: SystemField, now: DateTime<Utc>) -> Option<Value> {
    let rendered = match field {
        SystemField::CurrentDate => now.format("%Y-%m-%d").to_string(),
        SystemField::CurrentTime => now.format("%H:%M:%S").to_string(),
        SystemField::CurrentDatetime => now.to_rfc3339_opts(SecondsFormat::Millis, true),
        SystemField::Unknown => return None,
    };
    Some(Value::String(rendered))
}

/// Whole days elapsed between a history date and `now`.
fn days_since(raw: &Value, now: DateTime<Utc>) -> Option<i64> {
    let text = raw.as_str()?.trim();
    let visited = match DateTime::parse_from_rfc3339(text) {
        Ok(datetime) => datetime.with_timezone(&Utc),
        Err(_) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
            .and_utc(),
    };
    Some((now - visited).num_days())
}
