//! Health check reports returned by the gateway or the phylum.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{ShiroError, ShiroResult};

const REPORT_DESC: &str = "health check report";

/// Status of one upstream service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// RFC 3339 time the report was generated.
    pub timestamp: String,
    pub status: String,
    pub service_name: String,
    pub service_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HealthCheck {
    pub reports: Vec<HealthReport>,
}

impl HealthCheck {
    pub fn reports(&self) -> &[HealthReport] {
        &self.reports
    }

    /// Report for `service_name`, if the upstream included one.
    pub fn report(&self, service_name: &str) -> Option<&HealthReport> {
        self.reports.iter().find(|r| r.service_name == service_name)
    }
}

/// Parses a health check body. A non-null `exception` is always an error.
pub fn parse_health_response(body: &[u8]) -> ShiroResult<HealthCheck> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ShiroError::decode(REPORT_DESC, format!("valid JSON: {}", e)))?;
    let obj = match value {
        Value::Object(obj) => obj,
        _ => return Err(ShiroError::decode(REPORT_DESC, "an object response")),
    };

    match obj.get("exception") {
        None | Some(Value::Null) => {}
        Some(exception) => return Err(ShiroError::RemoteException(exception.to_string())),
    }

    let raw_reports = match obj.get("reports") {
        None | Some(Value::Null) => return Ok(HealthCheck::default()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ShiroError::decode(REPORT_DESC, "an array reports field")),
    };

    let reports = raw_reports
        .iter()
        .map(|raw| match raw {
            Value::Object(m) => convert_report(m),
            _ => Err(ShiroError::decode(REPORT_DESC, "an object")),
        })
        .collect::<ShiroResult<Vec<_>>>()?;
    Ok(HealthCheck { reports })
}

fn convert_report(m: &Map<String, Value>) -> ShiroResult<HealthReport> {
    let field = |name: &str| {
        m.get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ShiroError::decode(REPORT_DESC, format!("string {} field", name)))
    };
    Ok(HealthReport {
        timestamp: field("timestamp")?,
        status: field("status")?,
        service_name: field("service_name")?,
        service_version: field("service_version")?,
    })
}
