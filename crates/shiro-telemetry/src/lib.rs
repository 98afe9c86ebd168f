//! # Shiro Telemetry
//!
//! Structured logging for applications built on the shiro client crates.
//! The libraries only emit `tracing` events and spans; this crate installs
//! the subscriber that renders them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shiro_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() {
//!     init_logging(&TelemetryConfig::from_env()).expect("logging");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SHIRO_SERVICE_NAME` | `shiroclient` | Service name |
//! | `SHIRO_LOG_LEVEL` | `info` | Filter directives, `RUST_LOG` is the fallback |
//! | `SHIRO_CONSOLE_OUTPUT` | `true` | Write to stdout |
//! | `SHIRO_JSON_LOGS` | `false` | JSON lines, defaults on inside containers |

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::{init_logging, init_test_logging};

use thiserror::Error;

/// Logging initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}
