//! Inbound ports: the client API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::domain::{Block, Config, HealthCheck, Response, ShiroResult};

/// A connection to a phylum execution backend.
///
/// Every operation takes per-call [`Config`] records that are applied after
/// the client's base configs.
#[async_trait]
pub trait ShiroClient: Send + Sync {
    /// Re-opens the client against the given phylum version.
    async fn seed(&self, version: &str, configs: &[Config]) -> ShiroResult<()>;

    /// Identifier of the deployed phylum.
    async fn shiro_phylum(&self, configs: &[Config]) -> ShiroResult<String>;

    /// Installs phylum code. `phylum` is base64 encoded, see
    /// [`encode_phylum_bytes`](crate::encode_phylum_bytes).
    async fn init(&self, phylum: &str, configs: &[Config]) -> ShiroResult<()>;

    /// Invokes a phylum endpoint. Parameters, transient data and the other
    /// call settings travel in `configs`.
    async fn call(&self, method: &str, configs: &[Config]) -> ShiroResult<Response>;

    /// Current block height.
    async fn query_info(&self, configs: &[Config]) -> ShiroResult<u64>;

    async fn query_block(&self, block_number: u64, configs: &[Config]) -> ShiroResult<Block>;

    /// Upstream service enumeration, when the backend supports it.
    fn health_checker(&self) -> Option<&dyn HealthChecker> {
        None
    }
}

/// Health check with upstream service enumeration.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    async fn health_check(&self, services: &[String], configs: &[Config])
        -> ShiroResult<HealthCheck>;
}

/// Operations only a mock ledger supports.
#[async_trait]
pub trait MockShiroClient: ShiroClient {
    /// Releases the mock ledger.
    async fn close(&self) -> ShiroResult<()>;

    /// Writes a snapshot of the mock ledger to `writer`.
    async fn snapshot(&self, writer: &mut (dyn AsyncWrite + Unpin + Send)) -> ShiroResult<()>;

    async fn set_creator_with_attributes(
        &self,
        creator: &str,
        attributes: &BTreeMap<String, String>,
    ) -> ShiroResult<()>;
}
