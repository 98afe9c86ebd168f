//! Mock ledger client backed by an in-process [`Substrate`].
//!
//! Operations flatten their [`RequestOptions`] into a
//! [`ConcreteRequestOptions`] and hand them to the substrate, so the same
//! `Response`/error semantics hold as for the gateway client.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, Instrument};
use uuid::Uuid;

use crate::domain::{
    apply_configs, AppError, Block, Config, RequestOptions, Response, ShiroError, ShiroResult,
    SuccessResponse, Transaction,
};
use crate::ports::{
    ConcreteRequestOptions, MockShiroClient, ShiroClient, Substrate, SubstrateError,
};

/// Phylum name and version mock ledgers are created with by default.
pub const DEFAULT_MOCK_PHYLUM: &str = "test";

fn substrate_error(err: SubstrateError) -> ShiroError {
    ShiroError::Substrate(err.diagnostic)
}

/// Settings for creating a mock ledger.
#[derive(Debug, Clone)]
pub struct MockOptions {
    pub phylum_name: String,
    pub phylum_version: String,
    /// Ledger snapshot to restore; empty starts a fresh ledger.
    pub snapshot: Vec<u8>,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            phylum_name: DEFAULT_MOCK_PHYLUM.to_string(),
            phylum_version: DEFAULT_MOCK_PHYLUM.to_string(),
            snapshot: Vec::new(),
        }
    }
}

impl MockOptions {
    pub fn with_snapshot(mut self, snapshot: Vec<u8>) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Reads the whole snapshot from `reader`.
    pub async fn with_snapshot_reader<R>(mut self, mut reader: R) -> ShiroResult<Self>
    where
        R: AsyncRead + Unpin,
    {
        let mut snapshot = Vec::new();
        reader.read_to_end(&mut snapshot).await?;
        self.snapshot = snapshot;
        Ok(self)
    }
}

/// Client for a mock ledger hosted by a [`Substrate`].
pub struct MockClient {
    base_configs: Vec<Config>,
    substrate: Arc<dyn Substrate>,
    tag: String,
    phylum: String,
}

impl MockClient {
    /// Checks the substrate is alive, then creates a mock ledger on it.
    pub async fn new(
        substrate: Arc<dyn Substrate>,
        base_configs: Vec<Config>,
        options: MockOptions,
    ) -> ShiroResult<Self> {
        let nonce = Uuid::new_v4().as_u64_pair().0;
        let echoed = substrate
            .health_check(nonce)
            .await
            .map_err(substrate_error)?;
        if echoed != nonce {
            return Err(ShiroError::Substrate(format!(
                "health check echoed {} instead of {}",
                echoed, nonce
            )));
        }

        let tag = substrate
            .new_mock_from(
                &options.phylum_name,
                &options.phylum_version,
                &options.snapshot,
            )
            .await
            .map_err(substrate_error)?;
        info!(
            tag = %tag,
            phylum = %options.phylum_name,
            restored = !options.snapshot.is_empty(),
            "mock ledger created"
        );

        Ok(Self {
            base_configs,
            substrate,
            tag,
            phylum: options.phylum_name,
        })
    }

    /// Tag the substrate assigned to this ledger.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn options(&self, configs: &[Config]) -> RequestOptions {
        apply_configs(&self.base_configs, configs)
    }
}

/// Flattens options to plain data. The timestamp generator runs here; the
/// current UTC time is used when none is configured.
pub fn flatten(opts: &RequestOptions) -> ShiroResult<ConcreteRequestOptions> {
    Ok(ConcreteRequestOptions {
        headers: opts.headers.clone(),
        endpoint: opts.endpoint.clone(),
        id: opts.id.clone(),
        auth_token: opts.auth_token.clone(),
        params: opts.params_json()?,
        transient: opts.transient.clone(),
        timestamp: opts
            .timestamp()
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        msp_filter: opts.msp_filter.clone(),
        min_endorsers: opts.min_endorsers,
        creator: opts.creator.clone(),
        dependent_txid: opts.dependent_txid.clone(),
        disable_write_polling: opts.disable_write_polling,
        cc_fetchurl_downgrade: opts.cc_fetchurl_downgrade,
        cc_fetchurl_proxy: opts
            .cc_fetchurl_proxy
            .as_ref()
            .map(|u| u.as_str().to_string())
            .unwrap_or_default(),
        dependent_block: opts.dependent_block.clone(),
        phylum_version: opts.phylum_version.clone(),
        new_phylum_version: opts.new_phylum_version.clone(),
        debug_print: opts.debug_print,
    })
}

#[async_trait]
impl ShiroClient for MockClient {
    async fn seed(&self, _version: &str, _configs: &[Config]) -> ShiroResult<()> {
        Err(ShiroError::Unsupported { op: "Seed" })
    }

    async fn shiro_phylum(&self, _configs: &[Config]) -> ShiroResult<String> {
        Ok(self.phylum.clone())
    }

    async fn init(&self, phylum: &str, configs: &[Config]) -> ShiroResult<()> {
        let opts = self.options(configs);
        let cro = flatten(&opts)?;
        self.substrate
            .init(&self.tag, phylum, &cro)
            .instrument(opts.request_span("Init"))
            .await
            .map_err(substrate_error)
    }

    async fn call(&self, method: &str, configs: &[Config]) -> ShiroResult<Response> {
        let opts = self.options(configs);
        let cro = flatten(&opts)?;
        let span = opts.request_span("Call");
        async {
            if cro.debug_print {
                debug!(tag = %self.tag, method, "UNSAFE: substrate request");
            }
            let resp = match self.substrate.call(&self.tag, method, &cro).await {
                Ok(resp) => resp,
                Err(err) => {
                    if cro.debug_print {
                        debug!(error = %err, "UNSAFE: substrate response error");
                    }
                    return Err(substrate_error(err));
                }
            };
            if cro.debug_print {
                debug!(
                    result = %String::from_utf8_lossy(&resp.result_json),
                    "UNSAFE: substrate response"
                );
            }

            if resp.has_error {
                return Ok(Response::Failure(AppError::new(
                    resp.error_code,
                    resp.error_message,
                    resp.error_json,
                )));
            }
            Ok(Response::Success(SuccessResponse {
                result: resp.result_json,
                transaction_id: resp.transaction_id,
                commit_block: resp.commit_block,
                max_simulated_block: resp.max_simulated_block,
            }))
        }
        .instrument(span)
        .await
    }

    async fn query_info(&self, configs: &[Config]) -> ShiroResult<u64> {
        let opts = self.options(configs);
        let cro = flatten(&opts)?;
        self.substrate
            .query_info(&self.tag, &cro)
            .instrument(opts.request_span("QueryInfo"))
            .await
            .map_err(substrate_error)
    }

    async fn query_block(&self, block_number: u64, configs: &[Config]) -> ShiroResult<Block> {
        let opts = self.options(configs);
        let cro = flatten(&opts)?;
        let block = self
            .substrate
            .query_block(&self.tag, block_number, &cro)
            .instrument(opts.request_span("QueryBlock"))
            .await
            .map_err(substrate_error)?;
        Ok(Block {
            hash: block.hash,
            transactions: block
                .transactions
                .into_iter()
                .map(|t| Transaction {
                    id: t.id,
                    reason: t.reason,
                    event: t.event,
                    chaincode_id: t.chaincode_id,
                })
                .collect(),
        })
    }
}

#[async_trait]
impl MockShiroClient for MockClient {
    async fn close(&self) -> ShiroResult<()> {
        self.substrate
            .close_mock(&self.tag)
            .await
            .map_err(substrate_error)?;
        info!(tag = %self.tag, "mock ledger closed");
        Ok(())
    }

    async fn snapshot(&self, writer: &mut (dyn AsyncWrite + Unpin + Send)) -> ShiroResult<()> {
        let snapshot = self
            .substrate
            .snapshot_mock(&self.tag)
            .await
            .map_err(substrate_error)?;
        writer.write_all(&snapshot).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn set_creator_with_attributes(
        &self,
        creator: &str,
        attributes: &BTreeMap<String, String>,
    ) -> ShiroResult<()> {
        self.substrate
            .set_creator_with_attributes_mock(&self.tag, creator, attributes)
            .await
            .map_err(substrate_error)
    }
}
