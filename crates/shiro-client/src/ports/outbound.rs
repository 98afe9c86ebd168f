//! Outbound port: the in-process substrate behind the mock adapter.
//!
//! Everything crossing this boundary is plain data. Closures such as the
//! timestamp generator are evaluated on the client side and only their
//! output is passed along.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// [`RequestOptions`](crate::domain::RequestOptions) flattened to data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcreteRequestOptions {
    pub headers: BTreeMap<String, String>,
    pub endpoint: String,
    pub id: String,
    pub auth_token: String,
    /// JSON encoded call parameters.
    pub params: Vec<u8>,
    pub transient: BTreeMap<String, Vec<u8>>,
    /// Time the substrate should treat as "now" (RFC 3339).
    pub timestamp: String,
    pub msp_filter: Vec<String>,
    pub min_endorsers: u32,
    pub creator: String,
    pub dependent_txid: String,
    pub disable_write_polling: bool,
    pub cc_fetchurl_downgrade: bool,
    pub cc_fetchurl_proxy: String,
    pub dependent_block: String,
    pub phylum_version: String,
    pub new_phylum_version: String,
    pub debug_print: bool,
}

/// Error reported by the substrate.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{diagnostic}")]
pub struct SubstrateError {
    pub diagnostic: String,
}

impl SubstrateError {
    pub fn new(diagnostic: impl Into<String>) -> Self {
        Self {
            diagnostic: diagnostic.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstrateResponse {
    pub result_json: Vec<u8>,
    pub has_error: bool,
    pub error_code: i64,
    pub error_message: String,
    pub error_json: Vec<u8>,
    pub transaction_id: String,
    pub commit_block: Option<u64>,
    pub max_simulated_block: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstrateTransaction {
    pub id: String,
    pub reason: String,
    pub event: Vec<u8>,
    pub chaincode_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstrateBlock {
    pub hash: String,
    pub transactions: Vec<SubstrateTransaction>,
}

/// A substrate able to host mock ledgers, addressed by tag.
#[async_trait]
pub trait Substrate: Send + Sync {
    /// Liveness probe; a healthy substrate echoes `nonce`.
    async fn health_check(&self, nonce: u64) -> Result<u64, SubstrateError>;

    /// Creates a mock ledger, optionally restored from `snapshot`, and
    /// returns its tag.
    async fn new_mock_from(
        &self,
        name: &str,
        version: &str,
        snapshot: &[u8],
    ) -> Result<String, SubstrateError>;

    async fn set_creator_with_attributes_mock(
        &self,
        tag: &str,
        creator: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<(), SubstrateError>;

    async fn snapshot_mock(&self, tag: &str) -> Result<Vec<u8>, SubstrateError>;

    async fn close_mock(&self, tag: &str) -> Result<(), SubstrateError>;

    async fn init(
        &self,
        tag: &str,
        phylum: &str,
        options: &ConcreteRequestOptions,
    ) -> Result<(), SubstrateError>;

    async fn call(
        &self,
        tag: &str,
        method: &str,
        options: &ConcreteRequestOptions,
    ) -> Result<SubstrateResponse, SubstrateError>;

    async fn query_info(
        &self,
        tag: &str,
        options: &ConcreteRequestOptions,
    ) -> Result<u64, SubstrateError>;

    async fn query_block(
        &self,
        tag: &str,
        block_number: u64,
        options: &ConcreteRequestOptions,
    ) -> Result<SubstrateBlock, SubstrateError>;
}
