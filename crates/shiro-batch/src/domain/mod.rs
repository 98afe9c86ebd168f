//! Batch envelopes and driver configuration.

pub mod config;
pub mod envelope;

pub use config::{apply_driver_configs, DriverConfig, DriverOptions};
pub use envelope::{RequestEnvelope, ResponseEnvelope};
