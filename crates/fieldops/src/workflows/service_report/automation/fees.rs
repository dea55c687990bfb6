use std::collections::HashSet;

use tracing::debug;

use super::super::domain::{FeeRecommendation, FormRecord};
use super::super::rules::{FeeScope, FeeSuggestionRule};
use super::conditions::{describe, evaluate_all, first_match};

/// Fees already proposed during one resolution pass.
#[derive(Default)]
struct EmittedFees {
    fees: HashSet<String>,
    unit_fees: HashSet<(String, String)>,
}

impl EmittedFees {
    fn admits(&self, rule: &FeeSuggestionRule, unit_key: Option<&str>) -> bool {
        if rule.prevent_duplicates {
            return !self.fees.contains(&rule.fee_id);
        }
        match unit_key {
            Some(key) => !self
                .unit_fees
                .contains(&(rule.fee_id.clone(), key.to_string())),
            None => true,
        }
    }

    /// Only the key the rule itself checks is recorded.
    fn record(&mut self, rule: &FeeSuggestionRule, unit_key: Option<&str>) {
        if rule.prevent_duplicates {
            self.fees.insert(rule.fee_id.clone());
        } else if let Some(key) = unit_key {
            self.unit_fees.insert((rule.fee_id.clone(), key.to_string()));
        }
    }
}

/// Resolve fee recommendations in rule order, then unit order within per-unit rules.
pub fn resolve_fees(
    form_data: &FormRecord,
    rules: &[FeeSuggestionRule],
    units: Option<&[FormRecord]>,
) -> Vec<FeeRecommendation> {
    let mut emitted = EmittedFees::default();
    let mut recommendations = Vec::new();

    for rule in rules.iter().filter(|rule| rule.is_active) {
        match rule.scope {
            FeeScope::PerJob => {
                if !evaluate_all(&rule.conditions, form_data) || !emitted.admits(rule, None) {
                    continue;
                }
                emitted.record(rule, None);
                recommendations.push(recommend(rule, form_data, None, None));
            }
            FeeScope::PerUnit => {
                let Some(units) = units else {
                    continue;
                };

                for (index, unit) in units.iter().enumerate() {
                    if !evaluate_all(&rule.conditions, unit) {
                        continue;
                    }

                    let unit_id = unit.unit_id();
                    // Positional keys are prefixed so they never collide with a real id.
                    let unit_key = unit_id.clone().unwrap_or_else(|| format!("#{index}"));
                    if !emitted.admits(rule, Some(&unit_key)) {
                        continue;
                    }
                    emitted.record(rule, Some(&unit_key));
                    recommendations.push(recommend(rule, unit, unit_id, Some(index)));
                }
            }
        }
    }

    recommendations
}

fn recommend(
    rule: &FeeSuggestionRule,
    subject: &FormRecord,
    unit_id: Option<String>,
    unit_index: Option<usize>,
) -> FeeRecommendation {
    let reason = match first_match(&rule.conditions, subject) {
        Some(condition) => describe(condition),
        None => "conditions met".to_string(),
    };

    debug!(
        rule_id = %rule.id,
        fee_id = %rule.fee_id,
        unit_id = unit_id.as_deref().unwrap_or("-"),
        "fee suggestion triggered"
    );

    FeeRecommendation {
        fee_id: rule.fee_id.clone(),
        fee_name: rule.fee_name.clone(),
        fee_amount: rule.fee_amount,
        reason,
        unit_id,
        unit_index,
        auto_added: rule.auto_add,
        rule_id: rule.id.clone(),
    }
}
