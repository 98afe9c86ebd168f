//! Call outcomes and ledger query results.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::error::{ShiroError, ShiroResult};

/// Controls how result payloads are decoded into caller types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Ignore object keys the target type does not know about. When false,
    /// any such key fails the decode.
    pub discard_unknown: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            discard_unknown: true,
        }
    }
}

impl DecodeOptions {
    pub fn strict() -> Self {
        Self {
            discard_unknown: false,
        }
    }
}

/// Outcome of a `call`. An application failure is a valid outcome, not an
/// error, so callers must check for [`Response::Failure`] before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Success(SuccessResponse),
    Failure(AppError),
}

impl Response {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Result payload as JSON bytes; empty for a failure.
    pub fn result_json(&self) -> &[u8] {
        match self {
            Self::Success(s) => &s.result,
            Self::Failure(_) => &[],
        }
    }

    /// Committed transaction id; empty for a failure or a read-only call.
    pub fn transaction_id(&self) -> &str {
        match self {
            Self::Success(s) => &s.transaction_id,
            Self::Failure(_) => "",
        }
    }

    pub fn error(&self) -> Option<&AppError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<SuccessResponse, AppError> {
        match self {
            Self::Success(s) => Ok(s),
            Self::Failure(e) => Err(e),
        }
    }

    /// Decodes the success payload, tolerating unknown fields.
    pub fn decode<T: DeserializeOwned>(&self) -> ShiroResult<T> {
        self.success("decode")?.decode()
    }

    pub fn decode_with<T>(&self, options: DecodeOptions) -> ShiroResult<T>
    where
        T: DeserializeOwned + Serialize,
    {
        self.success("decode_with")?.decode_with(options)
    }

    fn success(&self, op: &'static str) -> ShiroResult<&SuccessResponse> {
        match self {
            Self::Success(s) => Ok(s),
            Self::Failure(e) => Err(ShiroError::decode(
                op,
                format!("a success response, got failure code {}", e.code),
            )),
        }
    }
}

/// A successful call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SuccessResponse {
    /// JSON encoding of the phylum's return value.
    pub result: Vec<u8>,
    pub transaction_id: String,
    /// Block the transaction was committed in, when the backend reports it.
    pub commit_block: Option<u64>,
    /// Highest block observed while simulating, when the backend reports it.
    pub max_simulated_block: Option<u64>,
}

impl SuccessResponse {
    pub fn decode<T: DeserializeOwned>(&self) -> ShiroResult<T> {
        Ok(serde_json::from_slice(&self.result)?)
    }

    pub fn decode_with<T>(&self, options: DecodeOptions) -> ShiroResult<T>
    where
        T: DeserializeOwned + Serialize,
    {
        if options.discard_unknown {
            return self.decode();
        }
        let raw: Value = serde_json::from_slice(&self.result)?;
        let typed: T = serde_json::from_value(raw.clone())?;
        let echoed = serde_json::to_value(&typed)?;
        if let Some(path) = first_unknown_key(&raw, &echoed, String::new()) {
            return Err(ShiroError::decode(
                "decode_with",
                format!("no unknown field, found `{}`", path),
            ));
        }
        Ok(typed)
    }
}

// Keys present in `raw` that did not survive a decode/encode round trip.
fn first_unknown_key(raw: &Value, echoed: &Value, path: String) -> Option<String> {
    match (raw, echoed) {
        (Value::Object(r), Value::Object(e)) => r.iter().find_map(|(k, v)| {
            let child = if path.is_empty() {
                k.clone()
            } else {
                format!("{}.{}", path, k)
            };
            match e.get(k) {
                None => Some(child),
                Some(ev) => first_unknown_key(v, ev, child),
            }
        }),
        (Value::Array(r), Value::Array(e)) => r
            .iter()
            .zip(e)
            .enumerate()
            .find_map(|(i, (rv, ev))| first_unknown_key(rv, ev, format!("{}[{}]", path, i))),
        _ => None,
    }
}

/// Failure reported by the phylum (error level 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppError {
    pub code: i64,
    pub message: String,
    /// Empty or valid JSON.
    pub data: Vec<u8>,
}

impl AppError {
    pub fn new(code: i64, message: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn data_json(&self) -> &[u8] {
        &self.data
    }

    pub fn decode_data<T: DeserializeOwned>(&self) -> ShiroResult<T> {
        Ok(serde_json::from_slice(&self.data)?)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc error code {} {}", self.code, self.message)?;
        if !self.data.is_empty() {
            write!(f, " {}", String::from_utf8_lossy(&self.data))?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

/// A committed block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub hash: String,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    pub id: String,
    pub reason: String,
    pub event: Vec<u8>,
    pub chaincode_id: String,
}
