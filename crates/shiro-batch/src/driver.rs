//! Batch driver: registers batch callbacks and talks to the phylum.

use std::sync::Arc;
use std::time::Duration;

use serde_json::value::RawValue;
use serde_json::Value;
use shiro_client::{Config, ShiroClient};
use tokio::runtime::Handle;
use tracing::{error, warn};

use crate::domain::{apply_driver_configs, DriverConfig, DriverOptions};
use crate::error::{BatchError, BatchResult};
use crate::ticker::{spawn_poll_loop, Ticker, TickerInner};

pub(crate) const BATCH_GET_REQUESTS_METHOD: &str = "batch_get_requests";
pub(crate) const BATCH_PROCESS_RESPONSE_METHOD: &str = "batch_process_response";

/// Shortest polling interval the driver accepts.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Handles one batch request: `(batch_id, request_id, message)` to a JSON
/// response payload.
///
/// Runs on the blocking pool, concurrently with other requests, so it must
/// synchronize any shared state itself and must not hang.
pub type BatchCallback =
    Arc<dyn Fn(&str, &str, &[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync + 'static>;

/// Identifies the batch request a log line or client call is about.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct CallContext<'a> {
    pub batch_name: &'a str,
    pub batch_id: &'a str,
    pub request_id: &'a str,
}

impl CallContext<'_> {
    fn log_fields(&self) -> std::collections::BTreeMap<String, Value> {
        [
            ("batch_name", self.batch_name),
            ("batch_id", self.batch_id),
            ("request_id", self.request_id),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.to_string(), Value::from(v)))
        .collect()
    }
}

pub(crate) struct DriverInner {
    pub client: Arc<dyn ShiroClient>,
    pub options: DriverOptions,
}

impl DriverInner {
    /// Calls a batch endpoint with `params` sent verbatim. Every failure is
    /// logged and yields `None`.
    pub(crate) async fn call(
        &self,
        method: &str,
        params: Box<RawValue>,
        ctx: CallContext<'_>,
        client_configs: &[Config],
    ) -> Option<Vec<u8>> {
        let mut configs = vec![
            Config::RawParams(params),
            Config::LogFields(self.options.log_fields.clone()),
            Config::LogFields(ctx.log_fields()),
        ];
        configs.extend_from_slice(client_configs);

        let response = match self.client.call(method, &configs).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    method,
                    batch_name = ctx.batch_name,
                    batch_id = ctx.batch_id,
                    request_id = ctx.request_id,
                    error = %e,
                    "call failed while polling"
                );
                return None;
            }
        };
        if let Some(app) = response.error() {
            error!(
                method,
                batch_name = ctx.batch_name,
                batch_id = ctx.batch_id,
                request_id = ctx.request_id,
                error_code = app.code,
                error_message = %app.message,
                error_data = %String::from_utf8_lossy(app.data_json()),
                "phylum error while polling"
            );
            return None;
        }
        let result = response.result_json();
        if result.is_empty() {
            error!(
                method,
                batch_name = ctx.batch_name,
                batch_id = ctx.batch_id,
                request_id = ctx.request_id,
                "empty JSON result while polling"
            );
            return None;
        }
        Some(result.to_vec())
    }
}

/// Processes batch requests originating in phylum code reached through a
/// [`ShiroClient`].
#[derive(Clone)]
pub struct Driver {
    inner: Arc<DriverInner>,
}

impl Driver {
    pub fn new(client: Arc<dyn ShiroClient>, configs: &[DriverConfig]) -> Self {
        Self {
            inner: Arc::new(DriverInner {
                client,
                options: apply_driver_configs(configs),
            }),
        }
    }

    /// Starts polling `batch_name` every `interval` and returns the handle
    /// controlling it.
    ///
    /// `client_configs` are appended to every client call the poll makes.
    /// Must be called from within a tokio runtime.
    pub fn register<F>(
        &self,
        batch_name: impl Into<String>,
        interval: Duration,
        callback: F,
        client_configs: Vec<Config>,
    ) -> BatchResult<Ticker>
    where
        F: Fn(&str, &str, &[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync + 'static,
    {
        self.register_callback(batch_name, interval, Arc::new(callback), client_configs)
    }

    pub fn register_callback(
        &self,
        batch_name: impl Into<String>,
        interval: Duration,
        callback: BatchCallback,
        client_configs: Vec<Config>,
    ) -> BatchResult<Ticker> {
        let handle = Handle::try_current().map_err(|_| BatchError::NoRuntime)?;
        let batch_name = batch_name.into();
        if batch_name.is_empty() {
            return Err(BatchError::EmptyBatchName);
        }

        let interval = if interval < MIN_POLL_INTERVAL {
            warn!(
                batch_name = %batch_name,
                requested = ?interval,
                "poll interval too short; clamping"
            );
            MIN_POLL_INTERVAL
        } else {
            interval
        };

        let inner = Arc::new(TickerInner::new(
            self.inner.clone(),
            batch_name,
            callback,
            client_configs,
        ));
        Ok(spawn_poll_loop(&handle, inner, interval))
    }
}
