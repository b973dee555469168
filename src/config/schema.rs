//! Configuration schema definitions.

use std::time::Duration;

/// Port used when `PORT` is unset or empty.
pub const DEFAULT_PORT: &str = "10001";

/// Root configuration for the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Listen port, taken verbatim from the environment.
    pub port: String,

    /// Time allowed for a client to send the request headers.
    pub read_timeout: Duration,

    /// Time allowed for a handler to produce its response.
    pub write_timeout: Duration,

    /// Keep-alive connections with nothing in flight are closed after this.
    pub idle_timeout: Duration,

    /// Upper bound on the graceful drain before connections are forced closed.
    pub shutdown_timeout: Duration,

    /// Output format of log lines.
    pub log_format: LogFormat,

    /// Prometheus exporter address; the exporter is off when `None`.
    pub metrics_address: Option<String>,
}

impl ServiceConfig {
    /// Address the listener binds to: every interface on the configured port.
    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(30),
            log_format: LogFormat::default(),
            metrics_address: None,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable lines, the default.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parse a `LOG_FORMAT` value. Only `json` (any case) selects JSON.
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}
