//! Configuration loading from the process environment.

use crate::config::schema::{LogFormat, ServiceConfig, DEFAULT_PORT};

/// Environment variable holding the listen port.
pub const PORT_VAR: &str = "PORT";
/// Environment variable selecting the log format.
pub const LOG_FORMAT_VAR: &str = "LOG_FORMAT";
/// Environment variable enabling the Prometheus exporter.
pub const METRICS_ADDR_VAR: &str = "METRICS_ADDR";

/// Load configuration from the process environment.
pub fn load_config() -> ServiceConfig {
    load_from(|key| std::env::var(key).ok())
}

/// Load configuration using `lookup` to resolve variables.
///
/// Unset and empty values are treated the same way.
pub fn load_from<F>(lookup: F) -> ServiceConfig
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

    ServiceConfig {
        port: non_empty(PORT_VAR).unwrap_or_else(|| DEFAULT_PORT.to_string()),
        log_format: non_empty(LOG_FORMAT_VAR)
            .map(|value| LogFormat::from_env_value(&value))
            .unwrap_or_default(),
        metrics_address: non_empty(METRICS_ADDR_VAR),
        ..ServiceConfig::default()
    }
}
