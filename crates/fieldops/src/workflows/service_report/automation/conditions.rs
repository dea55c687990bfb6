use serde_json::Value;

use super::super::domain::FormRecord;
use super::super::rules::{ConditionLogic, ConditionOperator, ConditionSet, RuleCondition};

/// Evaluate one condition against a record. Never fails: anything that cannot be
/// compared simply does not match.
pub fn evaluate(condition: &RuleCondition, record: &FormRecord) -> bool {
    let actual = record.get(&condition.field);
    let expected = &condition.value;

    match condition.operator {
        ConditionOperator::Equals => actual.map(|v| values_equal(v, expected)).unwrap_or(false),
        ConditionOperator::NotEquals => !actual.map(|v| values_equal(v, expected)).unwrap_or(false),
        ConditionOperator::GreaterThan => to_number(actual) > to_number(Some(expected)),
        ConditionOperator::LessThan => to_number(actual) < to_number(Some(expected)),
        ConditionOperator::Contains => {
            let haystack = actual.map(to_text).unwrap_or_default();
            haystack.contains(&to_text(expected))
        }
        ConditionOperator::InList => match (expected, actual) {
            (Value::Array(items), Some(actual)) => {
                items.iter().any(|item| values_equal(item, actual))
            }
            _ => false,
        },
        ConditionOperator::Unknown => false,
    }
}

/// Evaluate a whole set. Empty sets never match; one `OR` marker anywhere makes the
/// set match on any condition, otherwise every condition must match.
pub fn evaluate_all(conditions: &ConditionSet, record: &FormRecord) -> bool {
    if conditions.is_empty() {
        return false;
    }

    let mut results = conditions
        .conditions()
        .iter()
        .map(|condition| evaluate(condition, record));

    match conditions.logic() {
        ConditionLogic::Or => results.any(|matched| matched),
        ConditionLogic::And => results.all(|matched| matched),
    }
}

/// First condition in the set that holds for the record.
pub fn first_match<'a>(
    conditions: &'a ConditionSet,
    record: &FormRecord,
) -> Option<&'a RuleCondition> {
    conditions
        .conditions()
        .iter()
        .find(|condition| evaluate(condition, record))
}

/// Short explanation of why a condition held, e.g. `unit_status equals damaged`.
pub fn describe(condition: &RuleCondition) -> String {
    format!(
        "{} {} {}",
        condition.field,
        condition.operator.label(),
        to_text(&condition.value)
    )
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(lhs), Value::Number(rhs)) => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(l), Some(r)) => l == r,
            _ => lhs == rhs,
        },
        _ => left == right,
    }
}

/// Numeric coercion for ordered comparisons. Values with no numeric reading become NaN,
/// which fails every comparison.
pub(crate) fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(flag)) => {
            if *flag {
                1.0
            } else {
                0.0
            }
        }
        Some(Value::Number(number)) => number.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(text)) => parse_numeric_text(text),
        Some(Value::Array(items)) => match items.as_slice() {
            [] => 0.0,
            [single] => match single {
                Value::Array(_) | Value::Object(_) => f64::NAN,
                other => to_number(Some(other)),
            },
            _ => f64::NAN,
        },
        Some(Value::Object(_)) => f64::NAN,
    }
}

fn parse_numeric_text(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    // Rust accepts "inf"/"nan" spellings that are not numeric input here.
    if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Text rendering used by `contains` and by recommendation reasons.
pub(crate) fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number_text(number),
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_text(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn number_text(number: &serde_json::Number) -> String {
    if number.is_i64() || number.is_u64() {
        return number.to_string();
    }
    match number.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() < 1e15 => format!("{}", float as i64),
        Some(float) => float.to_string(),
        None => number.to_string(),
    }
}
