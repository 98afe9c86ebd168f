//! Logging configuration from environment variables.

use std::env;

const DEFAULT_SERVICE_NAME: &str = "shiroclient";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration for the process-wide log subscriber.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name stamped on the startup line
    pub service_name: String,

    /// Filter directives (`info`, `shiro_client=debug,warn`, ...)
    pub log_level: String,

    /// Whether to write log lines to stdout at all
    pub console_output: bool,

    /// JSON lines instead of the human readable format
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SHIRO_SERVICE_NAME`: Service name (default: shiroclient)
    /// - `SHIRO_LOG_LEVEL` or `RUST_LOG`: Filter directives (default: info)
    /// - `SHIRO_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `SHIRO_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        Self {
            service_name: lookup("SHIRO_SERVICE_NAME")
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),

            log_level: lookup("SHIRO_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),

            console_output: lookup("SHIRO_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: lookup("SHIRO_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}
