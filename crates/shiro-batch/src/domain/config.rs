//! Driver configuration.

use std::collections::BTreeMap;

use serde_json::Value;

/// One mutation of the driver's [`DriverOptions`].
#[derive(Debug, Clone)]
pub enum DriverConfig {
    /// Span the driver's poll loops are parented under.
    ParentSpan(tracing::Span),
    LogField(String, Value),
    LogFields(BTreeMap<String, Value>),
}

impl DriverConfig {
    pub fn log_field(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::LogField(key.into(), value.into())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    pub parent_span: Option<tracing::Span>,
    /// Attached to every log line and forwarded to every client call.
    pub log_fields: BTreeMap<String, Value>,
}

pub fn apply_driver_configs(configs: &[DriverConfig]) -> DriverOptions {
    let mut opts = DriverOptions::default();
    for config in configs {
        match config {
            DriverConfig::ParentSpan(span) => opts.parent_span = Some(span.clone()),
            DriverConfig::LogField(k, v) => {
                opts.log_fields.insert(k.clone(), v.clone());
            }
            DriverConfig::LogFields(fields) => {
                for (k, v) in fields {
                    opts.log_fields.insert(k.clone(), v.clone());
                }
            }
        }
    }
    opts
}
