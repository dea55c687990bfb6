use crate::infra::{
    load_rule_book, read_json_file, InMemoryAuditRepository, InMemoryVisitHistory,
};
use chrono::{Duration, Utc};
use clap::Args;
use fieldops::config::AppConfig;
use fieldops::error::AppError;
use fieldops::workflows::service_report::{
    AutomationEngine, FeeDecision, FormRecord, JobKey, PrefillRequest, ServiceReportError,
    ServiceReportService, ServiceReportSubmission, ValidationIssue,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// Rule book JSON (defaults to AUTOMATION_RULES_PATH or the built-in route rules)
    #[arg(long)]
    pub(crate) rules: Option<PathBuf>,
    /// Form data JSON object
    #[arg(long)]
    pub(crate) form: PathBuf,
    /// JSON array of unit records
    #[arg(long)]
    pub(crate) units: Option<PathBuf>,
    /// Prior visit JSON object used for last-visit defaults
    #[arg(long)]
    pub(crate) history: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Number of portable units on the sample route
    #[arg(long, default_value_t = 3)]
    pub(crate) units: usize,
    /// Print the stored audit as JSON
    #[arg(long)]
    pub(crate) show_audit: bool,
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let EvaluateArgs {
        rules,
        form,
        units,
        history,
    } = args;

    let config = AppConfig::load()?;
    let rules = load_rule_book(&config.automation, rules)?;
    let engine = AutomationEngine::new(rules, config.automation.evidence_fields);

    let form: FormRecord = read_json_file(&form)?;
    let units: Option<Vec<FormRecord>> = units.map(|path| read_json_file(&path)).transpose()?;
    let history: Option<FormRecord> = history.map(|path| read_json_file(&path)).transpose()?;

    let now = Utc::now();
    let output = json!({
        "defaults": engine.defaults_at(&form, history.as_ref(), now),
        "audit": engine.audit_at(&form, units.as_deref(), now),
    });
    let rendered = serde_json::to_string_pretty(&output).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let rules = load_rule_book(&config.automation, None)?;
    let engine = AutomationEngine::new(rules, config.automation.evidence_fields);

    let repository = Arc::new(InMemoryAuditRepository::default());
    let history = Arc::new(InMemoryVisitHistory::default());
    let job = JobKey("fairgrounds-east".to_string());
    history.record_visit(
        job.clone(),
        record(json!({
            "date": (Utc::now() - Duration::days(21)).to_rfc3339(),
            "access_notes": "Gate code 4410, enter from the service lane",
        })),
    );
    let service = ServiceReportService::new(engine, repository, history);

    println!("Service report automation demo");
    let unit_count = args.units.max(1);
    let prefill = match service.prefill(&PrefillRequest {
        job_key: Some(job.clone()),
        job_data: record(json!({"site_contact": "Jordan Ellis", "unit_count": unit_count})),
    }) {
        Ok(defaults) => defaults,
        Err(err) => {
            println!("  Prefill unavailable: {err}");
            return Ok(());
        }
    };
    println!("Prefilled fields:");
    for (field, value) in prefill.iter() {
        println!("  - {field}: {}", display_value(value));
    }

    let mut submission = ServiceReportSubmission {
        job_key: Some(job),
        form_data: prefill,
        units: Some(demo_units(unit_count, false)),
    };
    submission.form_data.insert("volume_gallons", json!(140));

    println!("\nFirst submission attempt (evidence still missing)");
    match service.submit(submission.clone()) {
        Ok(record) => println!("  Unexpectedly stored {}", record.report_id.0),
        Err(ServiceReportError::SubmissionBlocked { issues }) => render_issues(&issues),
        Err(err) => {
            println!("  Submission failed: {err}");
            return Ok(());
        }
    }

    submission
        .form_data
        .insert("overflow_notes", json!("Spill contained with absorbent pads"));
    submission.units = Some(demo_units(unit_count, true));

    println!("\nSecond submission attempt (evidence attached)");
    let record = match service.submit(submission) {
        Ok(record) => record,
        Err(ServiceReportError::SubmissionBlocked { issues }) => {
            render_issues(&issues);
            return Ok(());
        }
        Err(err) => {
            println!("  Submission failed: {err}");
            return Ok(());
        }
    };

    let mut audit = record.audit.clone();
    audit.record_fee_decision("damage", None, FeeDecision::Accepted);
    let summary = record.summary();
    println!(
        "- Stored report {} covering {} unit(s)",
        summary.report_id.0, summary.unit_count
    );
    println!("  Triggered rules: {}", summary.triggered_rules.join(", "));
    println!(
        "  Fee suggestions ({} totaling ${:.2}):",
        summary.fee_count, summary.fee_total
    );
    for entry in &audit.fee_suggestions {
        let fee = &entry.recommendation;
        println!(
            "    - {} ${:.2} [{}] {}{}",
            fee.fee_name,
            fee.fee_amount,
            fee.unit_id.as_deref().unwrap_or("job"),
            fee.reason,
            if fee.auto_added { " (auto-added)" } else { "" }
        );
    }

    if args.show_audit {
        match serde_json::to_string_pretty(&audit) {
            Ok(json) => println!("  Audit payload:\n{}", json),
            Err(err) => println!("  Audit payload unavailable: {}", err),
        }
    }

    Ok(())
}

fn demo_units(count: usize, with_evidence: bool) -> Vec<FormRecord> {
    (1..=count)
        .map(|index| {
            let mut unit = record(json!({
                "unit_id": format!("PT-{index:02}"),
                "unit_status": if index == 1 { "damaged" } else { "serviced" },
                "supplies_restocked": if index % 2 == 0 { "both" } else { "none" },
            }));
            if with_evidence && index == 1 {
                unit.insert("damage_notes", json!("Door latch sheared off"));
                unit.insert("photo_damage", json!(["latch-1.jpg", "latch-2.jpg"]));
                unit.insert("gps_lock", json!({"lat": 41.5868, "lng": -93.625}));
            }
            unit
        })
        .collect()
}

fn render_issues(issues: &[ValidationIssue]) {
    println!("  Blocked by {} issue(s):", issues.len());
    for issue in issues {
        println!("    - [{}] {}", issue.issue_type.label(), issue.message);
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn record(value: Value) -> FormRecord {
    match value {
        Value::Object(map) => FormRecord::from(map),
        _ => FormRecord::new(),
    }
}
