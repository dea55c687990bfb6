use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::{Directive, ParseError};
use tracing_subscriber::EnvFilter;

/// Target of the rule engine's trigger and skip events.
pub const RULE_TRACE_TARGET: &str = "fieldops::workflows::service_report::automation";

#[derive(Debug)]
pub enum TelemetryError {
    EnvFilter { value: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::EnvFilter { value, .. } => {
                write!(f, "invalid log filter '{value}' for the automation service")
            }
            TelemetryError::Subscriber(err) => write!(f, "could not install subscriber: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::EnvFilter { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
        }
    }
}

/// Build the filter from `RUST_LOG`, falling back to the configured level. Rule tracing
/// raises the automation target to `debug` on top of either.
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(&config.log_level)?,
    };
    with_rule_tracing(filter, config.trace_rules)
}

fn parse_filter(value: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(value).map_err(|source| TelemetryError::EnvFilter {
        value: value.to_string(),
        source,
    })
}

fn with_rule_tracing(filter: EnvFilter, enabled: bool) -> Result<EnvFilter, TelemetryError> {
    if !enabled {
        return Ok(filter);
    }
    let value = format!("{RULE_TRACE_TARGET}=debug");
    let directive = value
        .parse::<Directive>()
        .map_err(|source| TelemetryError::EnvFilter { value, source })?;
    Ok(filter.add_directive(directive))
}

pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    // Targets tell requirement, fee and default events apart when rules are traced.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config)?)
        .with_target(config.trace_rules)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}
