use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which unit records carry their identifier.
pub const UNIT_ID_FIELD: &str = "unit_id";

/// Field id → value mapping captured by a service-report form (whole job or one unit).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormRecord(Map<String, Value>);

/// Per-unit form records share the job-level representation.
pub type UnitRecord = FormRecord;

impl FormRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Identifier of the unit this record describes, if any.
    pub fn unit_id(&self) -> Option<String> {
        match self.0.get(UNIT_ID_FIELD)? {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    /// Whether the field holds a usable value: missing, null, blank text and empty
    /// collections all count as absent.
    pub fn has_value(&self, field: &str) -> bool {
        self.0.get(field).map(is_filled).unwrap_or(false)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for FormRecord {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

impl FromIterator<(String, Value)> for FormRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub(crate) fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Category of a blocking problem found while validating a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    RequiredField,
    MissingEvidence,
    InvalidValue,
}

impl IssueType {
    pub const fn label(self) -> &'static str {
        match self {
            IssueType::RequiredField => "required_field",
            IssueType::MissingEvidence => "missing_evidence",
            IssueType::InvalidValue => "invalid_value",
        }
    }
}

/// Business-rule failure reported for a submission or one of its units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_index: Option<usize>,
    pub field_id: String,
    pub field_label: String,
    pub issue_type: IssueType,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
}

/// Fee proposed by the fee suggestion rules for the current submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRecommendation {
    pub fee_id: String,
    pub fee_name: String,
    pub fee_amount: f64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_index: Option<usize>,
    pub auto_added: bool,
    pub rule_id: String,
}

/// Controls whether validation walks the per-unit records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitLoopConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_unit_label")]
    pub unit_label: String,
}

fn default_unit_label() -> String {
    "Unit".to_string()
}

impl UnitLoopConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            unit_label: default_unit_label(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.unit_label = label.into();
        self
    }
}

impl Default for UnitLoopConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            unit_label: default_unit_label(),
        }
    }
}

/// Record keys consulted when checking evidence requirements on a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceFields {
    /// Substring identifying photo fields; every matching key contributes to the count.
    pub photo_marker: String,
    pub gps_field: String,
    pub signature_field: String,
}

impl Default for EvidenceFields {
    fn default() -> Self {
        Self {
            photo_marker: "photo".to_string(),
            gps_field: "gps_lock".to_string(),
            signature_field: "signature".to_string(),
        }
    }
}

/// Human readable label derived from a field id (`overflow_notes` becomes `Overflow Notes`).
pub fn field_label(field_id: &str) -> String {
    field_id
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
