//! Serializing decorator.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tokio::sync::Mutex;

use crate::domain::{Block, Config, Response, ShiroResult};
use crate::ports::{HealthChecker, MockShiroClient, ShiroClient};

/// Runs every operation of the wrapped client, `close` included, under one
/// lock. For backends that are not safe for concurrent use.
pub struct SyncClient<C> {
    lock: Mutex<()>,
    inner: C,
}

impl<C> SyncClient<C> {
    pub fn new(inner: C) -> Self {
        Self {
            lock: Mutex::new(()),
            inner,
        }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

#[async_trait]
impl<C: ShiroClient> ShiroClient for SyncClient<C> {
    async fn seed(&self, version: &str, configs: &[Config]) -> ShiroResult<()> {
        let _guard = self.lock.lock().await;
        self.inner.seed(version, configs).await
    }

    async fn shiro_phylum(&self, configs: &[Config]) -> ShiroResult<String> {
        let _guard = self.lock.lock().await;
        self.inner.shiro_phylum(configs).await
    }

    async fn init(&self, phylum: &str, configs: &[Config]) -> ShiroResult<()> {
        let _guard = self.lock.lock().await;
        self.inner.init(phylum, configs).await
    }

    async fn call(&self, method: &str, configs: &[Config]) -> ShiroResult<Response> {
        let _guard = self.lock.lock().await;
        self.inner.call(method, configs).await
    }

    async fn query_info(&self, configs: &[Config]) -> ShiroResult<u64> {
        let _guard = self.lock.lock().await;
        self.inner.query_info(configs).await
    }

    async fn query_block(&self, block_number: u64, configs: &[Config]) -> ShiroResult<Block> {
        let _guard = self.lock.lock().await;
        self.inner.query_block(block_number, configs).await
    }

    fn health_checker(&self) -> Option<&dyn HealthChecker> {
        self.inner.health_checker()
    }
}

#[async_trait]
impl<C: MockShiroClient> MockShiroClient for SyncClient<C> {
    async fn close(&self) -> ShiroResult<()> {
        let _guard = self.lock.lock().await;
        self.inner.close().await
    }

    async fn snapshot(&self, writer: &mut (dyn AsyncWrite + Unpin + Send)) -> ShiroResult<()> {
        let _guard = self.lock.lock().await;
        self.inner.snapshot(writer).await
    }

    async fn set_creator_with_attributes(
        &self,
        creator: &str,
        attributes: &BTreeMap<String, String>,
    ) -> ShiroResult<()> {
        let _guard = self.lock.lock().await;
        self.inner
            .set_creator_with_attributes(creator, attributes)
            .await
    }
}
