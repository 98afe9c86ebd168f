//! Domain types for the shiro client.
//!
//! Request configuration, call outcomes, health reports and the error
//! taxonomy. Nothing here performs I/O.

pub mod config;
pub mod error;
pub mod health;
pub mod response;

// Re-exports for convenience
pub use config::{
    apply_configs, has_marker, probe_timestamp_generator, Config, Params, ProxyUrl,
    RequestOptions, ResponseCapture, TimestampGenerator,
};
pub use error::{codes, is_timeout_error, ClientError, ErrorLevel, ShiroError, ShiroResult};
pub use health::{parse_health_response, HealthCheck, HealthReport};
pub use response::{AppError, Block, DecodeOptions, Response, SuccessResponse, Transaction};
