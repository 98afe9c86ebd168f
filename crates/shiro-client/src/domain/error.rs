//! Error types for shiro client operations.
//!
//! Errors cover transport, protocol decoding and client-level (error level 1)
//! failures. Application failures reported by the phylum (error level 2) are
//! never errors: they arrive as [`Response::Failure`](crate::domain::Response).

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::response::AppError;

/// Numeric sub-codes carried by client-level errors.
pub mod codes {
    /// No client error.
    pub const CLIENT_ERROR_NONE: i64 = 0;
    /// The gateway gave up waiting on the substrate.
    pub const CLIENT_ERROR_TIMEOUT: i64 = 1;
}

/// Error level reported by the gateway in `result.error_level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    /// Request and phylum logic both succeeded.
    None,
    /// The call could not be completed.
    Client,
    /// The phylum ran and reported a failure.
    Phylum,
}

impl ErrorLevel {
    pub fn from_wire(level: i64) -> Option<Self> {
        match level {
            0 => Some(Self::None),
            1 => Some(Self::Client),
            2 => Some(Self::Phylum),
            _ => None,
        }
    }

    pub fn as_wire(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Client => 1,
            Self::Phylum => 2,
        }
    }
}

/// A client-level (error level 1) failure reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientError {
    pub code: i64,
    pub message: String,
}

impl ClientError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Client error whose `message` field was missing or not a string. The
    /// code is not trusted in that case either.
    pub fn without_message() -> Self {
        Self::new(codes::CLIENT_ERROR_NONE, "shiroclient error with no message")
    }

    pub fn is_timeout(&self) -> bool {
        self.code == codes::CLIENT_ERROR_TIMEOUT
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for ClientError {}

/// Errors returned by shiro client operations.
#[derive(Debug, Error)]
pub enum ShiroError {
    #[error("{op}: expected an endpoint to be set")]
    MissingEndpoint { op: &'static str },

    #[error("{op}: http transport: {source}")]
    Http {
        op: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{op}: request cancelled")]
    Cancelled { op: &'static str },

    #[error("{op}: deadline exceeded after {timeout:?}")]
    DeadlineExceeded { op: &'static str, timeout: Duration },

    #[error("{op} expected {detail}")]
    Decode { op: &'static str, detail: String },

    #[error(
        "{op}: mismatched parallel arrays (ids={ids}, reasons={reasons}, events={events}, chaincode_ids={chaincode_ids})"
    )]
    MismatchedArrays {
        op: &'static str,
        ids: usize,
        reasons: usize,
        events: usize,
        chaincode_ids: usize,
    },

    #[error(transparent)]
    Client(#[from] ClientError),

    /// Phylum failure surfaced by helpers that cannot hand back a `Response`.
    #[error(transparent)]
    Application(#[from] AppError),

    #[error("{op} unexpected error level {level}")]
    UnexpectedErrorLevel { op: &'static str, level: i64 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("substrate: {0}")]
    Substrate(String),

    #[error("remote exception: {0}")]
    RemoteException(String),

    #[error("{op} is not supported")]
    Unsupported { op: &'static str },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ShiroError {
    pub(crate) fn decode(op: &'static str, detail: impl Into<String>) -> Self {
        Self::Decode {
            op,
            detail: detail.into(),
        }
    }

    /// True for a client-level error carrying the timeout sub-code.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Client(e) if e.is_timeout())
    }

    /// True when the caller's cancellation token or deadline ended the call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::DeadlineExceeded { .. })
    }
}

/// Result type for shiro client operations.
pub type ShiroResult<T> = Result<T, ShiroError>;

/// Reports whether `err`, or anything in its `source()` chain, is a
/// client-level timeout.
///
/// Works through arbitrary wrapping, e.g. `anyhow::Error::context` or a
/// caller's own `#[source]` field:
///
/// ```ignore
/// if let Err(e) = client.call("f", &[]).await.context("calling f") {
///     if is_timeout_error(e.as_ref()) { retry().await }
/// }
/// ```
pub fn is_timeout_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(shiro) = e.downcast_ref::<ShiroError>() {
            if shiro.is_timeout() {
                return true;
            }
        }
        if let Some(client) = e.downcast_ref::<ClientError>() {
            if client.is_timeout() {
                return true;
            }
        }
        current = e.source();
    }
    false
}
