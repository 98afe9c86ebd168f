//! Global subscriber installation.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Builds the filter from `config.log_level`, which already folds in
/// `SHIRO_LOG_LEVEL` and `RUST_LOG` in that order.
pub(crate) fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::Filter(e.to_string()))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = env_filter(config)?;

    let installed = match (config.console_output, config.json_logs) {
        (true, true) => {
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .with_span_list(true);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init()
        }
        (true, false) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(true);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
        }
        (false, _) => tracing_subscriber::registry().with(env_filter).try_init(),
    };
    installed.map_err(|_| TelemetryError::AlreadyInitialized)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "logging initialized"
    );
    Ok(())
}

/// Subscriber for tests: writes through the test harness capture and
/// ignores an already installed subscriber.
pub fn init_test_logging() {
    let config = TelemetryConfig::from_env();
    let Ok(env_filter) = env_filter(&config) else {
        return;
    };
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
