//! JSON envelopes exchanged with the phylum's batch endpoints.

use serde::{Deserialize, Serialize};
use serde_json::value::{to_raw_value, RawValue};

/// A pending request returned by `batch_get_requests`.
#[derive(Debug, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default)]
    pub batch_id: String,
    #[serde(default)]
    pub request_id: String,
    /// Request payload, kept as the exact JSON text the phylum sent.
    #[serde(default)]
    pub message: Option<Box<RawValue>>,
}

impl RequestEnvelope {
    /// Envelopes with any blank field indicate a decode or protocol problem.
    pub fn is_blank(&self) -> bool {
        self.batch_id.is_empty()
            || self.request_id.is_empty()
            || self.message.as_ref().map_or(true, |m| m.get().is_empty())
    }

    pub fn message_bytes(&self) -> &[u8] {
        self.message
            .as_ref()
            .map(|m| m.get().as_bytes())
            .unwrap_or_default()
    }
}

/// The outcome of one request, sent with `batch_process_response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub batch_id: String,
    pub request_id: String,
    pub is_error: bool,
    /// The callback's payload as it returned it, or the error message as a
    /// JSON string.
    pub message: Box<RawValue>,
}

impl ResponseEnvelope {
    pub fn success(batch_id: &str, request_id: &str, message: Box<RawValue>) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            request_id: request_id.to_string(),
            is_error: false,
            message,
        }
    }

    /// Wraps a callback payload, rejecting bytes that are not one JSON value.
    pub fn from_payload(
        batch_id: &str,
        request_id: &str,
        payload: Vec<u8>,
    ) -> serde_json::Result<Self> {
        let message: Box<RawValue> = serde_json::from_slice(&payload)?;
        Ok(Self::success(batch_id, request_id, message))
    }

    pub fn error(batch_id: &str, request_id: &str, error: &str) -> serde_json::Result<Self> {
        Ok(Self {
            batch_id: batch_id.to_string(),
            request_id: request_id.to_string(),
            is_error: true,
            message: to_raw_value(error)?,
        })
    }
}

impl PartialEq for ResponseEnvelope {
    fn eq(&self, other: &Self) -> bool {
        self.batch_id == other.batch_id
            && self.request_id == other.request_id
            && self.is_error == other.is_error
            && self.message.get() == other.message.get()
    }
}
