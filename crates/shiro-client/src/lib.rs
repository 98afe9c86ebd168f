//! # Shiro Client
//!
//! Client SDK for phylum logic executed by a shiro substrate, reached either
//! through the JSON-RPC gateway or through an in-process mock ledger.
//!
//! ## Architecture
//!
//! ```text
//! caller ── [Config] ──▶ apply_configs ──▶ RequestOptions
//!                                             │
//!                     ┌───────────────────────┴──────────────────────┐
//!                     ▼                                              ▼
//!               RpcClient                                       MockClient
//!        (JSON-RPC 2.0 over HTTP)                       (Substrate port, plain data)
//!                     │                                              │
//!                     └─────────────── Response / ShiroError ────────┘
//! ```
//!
//! ## Error levels
//!
//! - Level 0: `Ok(Response::Success(..))`
//! - Level 1: `Err(ShiroError::Client(..))`, see [`is_timeout_error`]
//! - Level 2: `Ok(Response::Failure(..))`, an application failure is a value
//!
//! Transport and decode problems are always `Err` and are never retried.
//!
//! ## Usage
//!
//! ```ignore
//! use shiro_client::{Config, RpcClient, ShiroClient};
//!
//! let client = RpcClient::new(vec![Config::endpoint("http://localhost:8082")]);
//! let resp = client.call("hello", &[Config::params(json!({"name": "a"}))]).await?;
//! match resp.error() {
//!     Some(err) => eprintln!("phylum failed: {}", err),
//!     None => println!("{}", String::from_utf8_lossy(resp.result_json())),
//! }
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod health;
pub mod ports;

use base64::Engine;

pub use adapters::{MockClient, MockOptions, RpcClient, SyncClient};
pub use domain::{
    apply_configs, codes, has_marker, is_timeout_error, AppError, Block, ClientError, Config,
    DecodeOptions, ErrorLevel, HealthCheck, HealthReport, Params, ProxyUrl, RequestOptions, Response,
    ResponseCapture, ShiroError, ShiroResult, SuccessResponse, Transaction,
};
pub use health::remote_health_check;
pub use ports::{HealthChecker, MockShiroClient, ShiroClient, Substrate};

/// Encodes phylum source for [`ShiroClient::init`].
pub fn encode_phylum_bytes(phylum: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(phylum)
}
