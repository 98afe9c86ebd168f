//! JSON-RPC gateway client.

mod health;
mod transport;
mod wire;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, Instrument};

use crate::domain::{
    apply_configs, parse_health_response, Block, Config, HealthCheck, RequestOptions, Response,
    ShiroError, ShiroResult, SuccessResponse,
};
use crate::ports::{HealthChecker, ShiroClient};

use self::wire::{
    decode_block, decode_envelope, decode_height, CallParams, EmptyParams, InitParams,
    QueryBlockParams, RpcOutcome, RpcRequest, SeedParams, METHOD_CALL, METHOD_INIT,
    METHOD_QUERY_BLOCK, METHOD_QUERY_INFO, METHOD_SEED, METHOD_SHIRO_PHYLUM,
};

const OP_HEALTH_CHECK: &str = "HealthCheck";

/// Client for a shiro JSON-RPC gateway.
///
/// ```ignore
/// let client = RpcClient::new(vec![Config::endpoint("http://localhost:8082")]);
/// let resp = client
///     .call("create_account", &[Config::params(json!({"name": "a"}))])
///     .await?;
/// ```
#[derive(Clone)]
pub struct RpcClient {
    base_configs: Vec<Config>,
    http: reqwest::Client,
}

impl RpcClient {
    pub fn new(base_configs: Vec<Config>) -> Self {
        Self::with_http_client(base_configs, reqwest::Client::new())
    }

    /// Uses `http` unless a call overrides it with [`Config::HttpClient`].
    pub fn with_http_client(base_configs: Vec<Config>, http: reqwest::Client) -> Self {
        Self { base_configs, http }
    }

    pub fn base_configs(&self) -> &[Config] {
        &self.base_configs
    }

    fn options(&self, configs: &[Config]) -> RequestOptions {
        apply_configs(&self.base_configs, configs)
    }

    fn http_client<'a>(&'a self, opts: &'a RequestOptions) -> &'a reqwest::Client {
        opts.http_client.as_ref().unwrap_or(&self.http)
    }

    fn with_headers(
        mut builder: reqwest::RequestBuilder,
        opts: &RequestOptions,
    ) -> reqwest::RequestBuilder {
        for (key, value) in &opts.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if !opts.auth_token.is_empty() {
            builder = builder.bearer_auth(&opts.auth_token);
        }
        builder
    }

    /// One request/response round trip, decoded and classified.
    async fn reqres<P>(
        &self,
        method: &'static str,
        params: P,
        opts: &RequestOptions,
    ) -> ShiroResult<RpcOutcome>
    where
        P: Serialize + Send,
    {
        if opts.endpoint.is_empty() {
            return Err(ShiroError::MissingEndpoint { op: method });
        }

        let body = serde_json::to_vec(&RpcRequest::new(&opts.id, method, params))?;
        if opts.debug_print {
            debug!(request = %String::from_utf8_lossy(&body), "UNSAFE: shiro request");
        }

        let client = self.http_client(opts);
        let request = Self::with_headers(client.post(&opts.endpoint), opts)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .build()
            .map_err(|source| ShiroError::Http { op: method, source })?;

        let reply = transport::execute(method, client, request, opts).await?;
        if opts.debug_print {
            debug!(
                status = %reply.status,
                response = %String::from_utf8_lossy(&reply.body),
                "UNSAFE: shiro response"
            );
        }

        let value: Value = serde_json::from_slice(&reply.body).map_err(|e| {
            ShiroError::decode(
                method,
                format!("a JSON response body (HTTP {}): {}", reply.status, e),
            )
        })?;
        if let Some(capture) = &opts.response_capture {
            capture.store(value.clone());
        }
        decode_envelope(&value)
    }
}

#[async_trait]
impl ShiroClient for RpcClient {
    async fn seed(&self, version: &str, configs: &[Config]) -> ShiroResult<()> {
        let opts = self.options(configs);
        let span = opts.request_span(METHOD_SEED);
        async {
            self.reqres(METHOD_SEED, SeedParams { version }, &opts)
                .await?
                .into_result(METHOD_SEED)?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn shiro_phylum(&self, configs: &[Config]) -> ShiroResult<String> {
        let opts = self.options(configs);
        let span = opts.request_span(METHOD_SHIRO_PHYLUM);
        async {
            let result = self
                .reqres(METHOD_SHIRO_PHYLUM, EmptyParams {}, &opts)
                .await?
                .into_result(METHOD_SHIRO_PHYLUM)?;
            match result {
                Value::String(phylum) => Ok(phylum),
                _ => Err(ShiroError::decode(
                    METHOD_SHIRO_PHYLUM,
                    "a string result field",
                )),
            }
        }
        .instrument(span)
        .await
    }

    async fn init(&self, phylum: &str, configs: &[Config]) -> ShiroResult<()> {
        let opts = self.options(configs);
        let span = opts.request_span(METHOD_INIT);
        async {
            self.reqres(METHOD_INIT, InitParams { phylum }, &opts)
                .await?
                .into_result(METHOD_INIT)?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn call(&self, method: &str, configs: &[Config]) -> ShiroResult<Response> {
        let opts = self.options(configs);
        let span = opts.request_span(METHOD_CALL);
        async {
            let outcome = self
                .reqres(METHOD_CALL, CallParams::new(method, &opts), &opts)
                .await?;
            match outcome {
                RpcOutcome::Success {
                    result,
                    transaction_id,
                    commit_block,
                    max_simulated_block,
                } => Ok(Response::Success(SuccessResponse {
                    result: serde_json::to_vec(&result)?,
                    transaction_id,
                    commit_block,
                    max_simulated_block,
                })),
                RpcOutcome::Client(e) => {
                    debug!(method, code = e.code, error = %e, "shiro client error");
                    Err(e.into())
                }
                RpcOutcome::Application(fields) => {
                    let app = fields.into_app_error(METHOD_CALL)?;
                    debug!(method, code = app.code, "phylum returned an error");
                    Ok(Response::Failure(app))
                }
                RpcOutcome::Unknown(level) => Err(ShiroError::UnexpectedErrorLevel {
                    op: METHOD_CALL,
                    level,
                }),
            }
        }
        .instrument(span)
        .await
    }

    async fn query_info(&self, configs: &[Config]) -> ShiroResult<u64> {
        let opts = self.options(configs);
        let span = opts.request_span(METHOD_QUERY_INFO);
        async {
            let result = self
                .reqres(METHOD_QUERY_INFO, EmptyParams {}, &opts)
                .await?
                .into_result(METHOD_QUERY_INFO)?;
            decode_height(&result)
        }
        .instrument(span)
        .await
    }

    async fn query_block(&self, block_number: u64, configs: &[Config]) -> ShiroResult<Block> {
        let opts = self.options(configs);
        let span = opts.request_span(METHOD_QUERY_BLOCK);
        async {
            let result = self
                .reqres(METHOD_QUERY_BLOCK, QueryBlockParams { block_number }, &opts)
                .await?
                .into_result(METHOD_QUERY_BLOCK)?;
            decode_block(&result)
        }
        .instrument(span)
        .await
    }

    fn health_checker(&self) -> Option<&dyn HealthChecker> {
        Some(self)
    }
}

#[async_trait]
impl HealthChecker for RpcClient {
    async fn health_check(
        &self,
        services: &[String],
        configs: &[Config],
    ) -> ShiroResult<HealthCheck> {
        let opts = self.options(configs);
        let span = opts.request_span(OP_HEALTH_CHECK);
        async {
            if opts.endpoint.is_empty() {
                return Err(ShiroError::MissingEndpoint {
                    op: OP_HEALTH_CHECK,
                });
            }
            let url = health::health_check_url(&opts.endpoint, services)?;
            debug!(url = %url, "gateway health check");

            let client = self.http_client(&opts);
            let request = Self::with_headers(client.get(url), &opts)
                .build()
                .map_err(|source| ShiroError::Http {
                    op: OP_HEALTH_CHECK,
                    source,
                })?;
            let reply = transport::execute(OP_HEALTH_CHECK, client, request, &opts).await?;
            parse_health_response(&reply.body)
        }
        .instrument(span)
        .await
    }
}
