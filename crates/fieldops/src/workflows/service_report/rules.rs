use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison applied by a single rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    InList,
    /// Operators outside the supported set never match.
    #[serde(other)]
    Unknown,
}

impl ConditionOperator {
    pub const fn label(self) -> &'static str {
        match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::NotEquals => "does not equal",
            ConditionOperator::GreaterThan => "is greater than",
            ConditionOperator::LessThan => "is less than",
            ConditionOperator::Contains => "contains",
            ConditionOperator::InList => "is one of",
            ConditionOperator::Unknown => "matches",
        }
    }
}

/// Combination marker carried by a condition. A single `OR` switches the whole set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionLogic {
    #[serde(rename = "OR", alias = "or")]
    Or,
    #[default]
    #[serde(rename = "AND", alias = "and")]
    #[serde(other)]
    And,
}

/// Atomic comparison of one record field against a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<ConditionLogic>,
}

impl RuleCondition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            logic: None,
        }
    }

    pub fn with_logic(mut self, logic: ConditionLogic) -> Self {
        self.logic = Some(logic);
        self
    }

    pub fn is_or(&self) -> bool {
        self.logic == Some(ConditionLogic::Or)
    }
}

/// Ordered conditions evaluated together under one global AND/OR mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet(Vec<RuleCondition>);

impl ConditionSet {
    pub fn new(conditions: Vec<RuleCondition>) -> Self {
        Self(conditions)
    }

    pub fn conditions(&self) -> &[RuleCondition] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// OR as soon as any member is marked OR, AND otherwise.
    pub fn logic(&self) -> ConditionLogic {
        if self.0.iter().any(RuleCondition::is_or) {
            ConditionLogic::Or
        } else {
            ConditionLogic::And
        }
    }
}

impl From<Vec<RuleCondition>> for ConditionSet {
    fn from(value: Vec<RuleCondition>) -> Self {
        Self(value)
    }
}

impl FromIterator<RuleCondition> for ConditionSet {
    fn from_iter<I: IntoIterator<Item = RuleCondition>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn default_active() -> bool {
    true
}

/// Minimum evidence a unit must carry once the owning rule triggers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_photos: Option<u32>,
    #[serde(default)]
    pub gps_required: bool,
    #[serde(default)]
    pub signature_required: bool,
}

impl EvidenceRequirements {
    pub fn is_empty(&self) -> bool {
        self.min_photos.unwrap_or(0) == 0 && !self.gps_required && !self.signature_required
    }
}

/// Rule making fields (and optionally evidence) mandatory when its conditions hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoRequirementRule {
    pub id: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub conditions: ConditionSet,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_requirements: Option<EvidenceRequirements>,
}

/// Whether a fee rule is evaluated once for the job or once per unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeScope {
    #[default]
    PerJob,
    PerUnit,
}

/// Rule suggesting (or auto-applying) a fee when its conditions hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSuggestionRule {
    pub id: String,
    pub fee_id: String,
    pub fee_name: String,
    pub fee_amount: f64,
    #[serde(default)]
    pub conditions: ConditionSet,
    #[serde(default)]
    pub scope: FeeScope,
    #[serde(default)]
    pub auto_add: bool,
    #[serde(default)]
    pub prevent_duplicates: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Where a default value is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValueSource {
    JobData,
    LastVisit,
    Static,
    System,
    Formula,
}

/// Clock-derived values available to `system` defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemField {
    CurrentDate,
    CurrentTime,
    CurrentDatetime,
    #[serde(other)]
    Unknown,
}

impl SystemField {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "current_date" => SystemField::CurrentDate,
            "current_time" => SystemField::CurrentTime,
            "current_datetime" => SystemField::CurrentDatetime,
            _ => SystemField::Unknown,
        }
    }
}

/// Rule describing how to prefill one field of a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultValueRule {
    pub field_id: String,
    pub source: DefaultValueSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_threshold: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<ConditionSet>,
}

impl DefaultValueRule {
    pub fn new(field_id: impl Into<String>, source: DefaultValueSource) -> Self {
        Self {
            field_id: field_id.into(),
            source,
            source_field: None,
            static_value: None,
            days_threshold: None,
            formula: None,
            conditions: None,
        }
    }
}

/// The three rule collections configured for a tenant's service-report form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleBook {
    #[serde(default)]
    pub auto_requirements: Vec<AutoRequirementRule>,
    #[serde(default)]
    pub fee_suggestions: Vec<FeeSuggestionRule>,
    #[serde(default)]
    pub default_values: Vec<DefaultValueRule>,
}

impl RuleBook {
    pub fn is_empty(&self) -> bool {
        self.auto_requirements.is_empty()
            && self.fee_suggestions.is_empty()
            && self.default_values.is_empty()
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, RuleBookError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, RuleBookError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, RuleBookError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Failure reading a stored rule book.
#[derive(Debug, thiserror::Error)]
pub enum RuleBookError {
    #[error("failed to read rule book: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid rule book JSON: {0}")]
    Json(#[from] serde_json::Error),
}
