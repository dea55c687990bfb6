use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::service_report::EvidenceFields;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub automation: AutomationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let trace_rules = env::var("AUTOMATION_TRACE_RULES")
            .map(|value| flag_enabled(&value))
            .unwrap_or(false);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                trace_rules,
            },
            automation: AutomationConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Emit rule trigger events at `debug` regardless of `log_level`.
    pub trace_rules: bool,
}

/// Where the rule book lives and which form keys carry evidence.
#[derive(Debug, Clone, Default)]
pub struct AutomationConfig {
    pub rules_path: Option<PathBuf>,
    pub evidence_fields: EvidenceFields,
}

impl AutomationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = EvidenceFields::default();
        let rules_path = env::var("AUTOMATION_RULES_PATH")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            rules_path,
            evidence_fields: EvidenceFields {
                photo_marker: field_key("AUTOMATION_PHOTO_MARKER", defaults.photo_marker)?,
                gps_field: field_key("AUTOMATION_GPS_FIELD", defaults.gps_field)?,
                signature_field: field_key("AUTOMATION_SIGNATURE_FIELD", defaults.signature_field)?,
            },
        })
    }
}

fn flag_enabled(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn field_key(variable: &'static str, default: String) -> Result<String, ConfigError> {
    match env::var(variable) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::EmptyFieldKey { variable }),
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    EmptyFieldKey { variable: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::EmptyFieldKey { variable } => {
                write!(f, "{variable} must name a non-empty form field key")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::EmptyFieldKey { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("AUTOMATION_TRACE_RULES");
        env::remove_var("AUTOMATION_RULES_PATH");
        env::remove_var("AUTOMATION_PHOTO_MARKER");
        env::remove_var("AUTOMATION_GPS_FIELD");
        env::remove_var("AUTOMATION_SIGNATURE_FIELD");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(!config.telemetry.trace_rules);
        assert_eq!(config.automation.rules_path, None);
        assert_eq!(config.automation.evidence_fields, EvidenceFields::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn automation_overrides_come_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "ci");
        env::set_var("AUTOMATION_RULES_PATH", "/etc/fieldops/rules.json");
        env::set_var("AUTOMATION_PHOTO_MARKER", "image");
        env::set_var("AUTOMATION_GPS_FIELD", "gps_fix");
        env::set_var("AUTOMATION_TRACE_RULES", "Yes");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Test);
        assert_eq!(
            config.automation.rules_path,
            Some(PathBuf::from("/etc/fieldops/rules.json"))
        );
        assert_eq!(config.automation.evidence_fields.photo_marker, "image");
        assert_eq!(config.automation.evidence_fields.gps_field, "gps_fix");
        assert_eq!(config.automation.evidence_fields.signature_field, "signature");
        assert!(config.telemetry.trace_rules);
        reset_env();
    }

    #[test]
    fn rejects_blank_field_keys_and_bad_ports() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("AUTOMATION_SIGNATURE_FIELD", "  ");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::EmptyFieldKey {
                variable: "AUTOMATION_SIGNATURE_FIELD"
            })
        ));

        reset_env();
        env::set_var("APP_PORT", "eighty");
        assert!(matches!(AppConfig::load(), Err(ConfigError::InvalidPort)));
        reset_env();
    }
}
