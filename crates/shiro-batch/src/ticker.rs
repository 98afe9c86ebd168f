//! Per-batch poll loop and the [`Ticker`] handle controlling it.
//!
//! ```text
//! interval ──┐                 ┌─► batch_get_requests
//!            ├─► poll loop ────┤   ├─► callback (blocking pool, one per request)
//! Force ─────┘   (one task)    │   └─► batch_process_response
//! Stop ──────► interval off    └── rounds run as spawned tasks
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::value::to_raw_value;
use shiro_client::Config;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, Instrument};

use crate::domain::{RequestEnvelope, ResponseEnvelope};
use crate::driver::{
    BatchCallback, CallContext, DriverInner, BATCH_GET_REQUESTS_METHOD,
    BATCH_PROCESS_RESPONSE_METHOD,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollCommand {
    Force,
    Stop,
}

pub(crate) struct TickerInner {
    driver: Arc<DriverInner>,
    batch_name: String,
    callback: BatchCallback,
    client_configs: Vec<Config>,
    enabled: RwLock<bool>,
}

impl TickerInner {
    pub(crate) fn new(
        driver: Arc<DriverInner>,
        batch_name: String,
        callback: BatchCallback,
        client_configs: Vec<Config>,
    ) -> Self {
        Self {
            driver,
            batch_name,
            callback,
            client_configs,
            enabled: RwLock::new(true),
        }
    }

    fn is_enabled(&self) -> bool {
        *self.enabled.read()
    }

    fn span(&self) -> tracing::Span {
        let fields = &self.driver.options.log_fields;
        let fields = if fields.is_empty() {
            String::new()
        } else {
            serde_json::to_string(fields).unwrap_or_default()
        };
        match &self.driver.options.parent_span {
            Some(parent) => tracing::info_span!(
                parent: parent,
                "batch_poll",
                batch_name = %self.batch_name,
                fields = %fields
            ),
            None => tracing::info_span!(
                "batch_poll",
                batch_name = %self.batch_name,
                fields = %fields
            ),
        }
    }

    fn context(&self) -> CallContext<'_> {
        CallContext {
            batch_name: &self.batch_name,
            ..CallContext::default()
        }
    }

    /// One poll round. Returns once every request dispatched in the round
    /// has been reported back, or abandoned.
    async fn round(self: Arc<Self>) {
        let params = match to_raw_value(&[self.batch_name.as_str()]) {
            Ok(params) => params,
            Err(e) => {
                error!(batch_name = %self.batch_name, error = %e, "failed to marshal poll params");
                return;
            }
        };
        let Some(result) = self
            .driver
            .call(
                BATCH_GET_REQUESTS_METHOD,
                params,
                self.context(),
                &self.client_configs,
            )
            .await
        else {
            return;
        };

        let envelopes: Vec<RequestEnvelope> = match serde_json::from_slice(&result) {
            Ok(envelopes) => envelopes,
            Err(e) => {
                error!(
                    batch_name = %self.batch_name,
                    error = %e,
                    "failed to unmarshal while polling"
                );
                return;
            }
        };

        let mut requests = JoinSet::new();
        for envelope in envelopes {
            if envelope.is_blank() {
                error!(
                    batch_name = %self.batch_name,
                    "failed to unmarshal (blank fields) while polling"
                );
                break;
            }
            requests.spawn(self.clone().process(envelope).in_current_span());
        }

        while let Some(joined) = requests.join_next().await {
            if let Err(e) = joined {
                error!(batch_name = %self.batch_name, error = %e, "request task failed");
            }
        }
    }

    async fn process(self: Arc<Self>, envelope: RequestEnvelope) {
        let batch_id = envelope.batch_id.clone();
        let request_id = envelope.request_id.clone();

        let callback = self.callback.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            callback(
                &envelope.batch_id,
                &envelope.request_id,
                envelope.message_bytes(),
            )
        })
        .await;

        let outcome = match outcome {
            Ok(Ok(payload)) if payload.is_empty() => Err(anyhow::anyhow!("zero-length response")),
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => Err(anyhow::anyhow!("callback panicked")),
            Err(e) => Err(anyhow::anyhow!("callback did not complete: {}", e)),
        };

        let response = match outcome {
            Ok(payload) => match ResponseEnvelope::from_payload(&batch_id, &request_id, payload) {
                Ok(response) => response,
                Err(e) => {
                    error!(
                        batch_name = %self.batch_name,
                        batch_id = %batch_id,
                        request_id = %request_id,
                        error = %e,
                        "callback response is not valid JSON"
                    );
                    return;
                }
            },
            Err(e) => {
                let message = format!("{:#}", e);
                error!(
                    batch_name = %self.batch_name,
                    batch_id = %batch_id,
                    request_id = %request_id,
                    error = %message,
                    "callback failed to produce response"
                );
                match ResponseEnvelope::error(&batch_id, &request_id, &message) {
                    Ok(response) => response,
                    Err(e) => {
                        error!(
                            batch_name = %self.batch_name,
                            batch_id = %batch_id,
                            request_id = %request_id,
                            error = %e,
                            "failed to marshal error response"
                        );
                        return;
                    }
                }
            }
        };

        let params = match to_raw_value(&(self.batch_name.as_str(), &response)) {
            Ok(params) => params,
            Err(e) => {
                error!(
                    batch_name = %self.batch_name,
                    batch_id = %batch_id,
                    request_id = %request_id,
                    error = %e,
                    "failed to marshal response"
                );
                return;
            }
        };
        let ctx = CallContext {
            batch_name: &self.batch_name,
            batch_id: &batch_id,
            request_id: &request_id,
        };
        let reported = self
            .driver
            .call(
                BATCH_PROCESS_RESPONSE_METHOD,
                params,
                ctx,
                &self.client_configs,
            )
            .await;
        if reported.is_none() {
            error!(
                batch_name = %self.batch_name,
                batch_id = %batch_id,
                request_id = %request_id,
                "response method failed"
            );
            return;
        }

        debug!(
            batch_name = %self.batch_name,
            batch_id = %batch_id,
            request_id = %request_id,
            "batch processed response"
        );
    }
}

/// Controls the polling of one registered batch.
///
/// Clones share the same poll loop. Dropping every handle leaves scheduled
/// polling running; the loop only exits once it has been stopped and no
/// handle remains.
#[derive(Clone)]
pub struct Ticker {
    inner: Arc<TickerInner>,
    commands: mpsc::UnboundedSender<PollCommand>,
}

impl Ticker {
    pub fn batch_name(&self) -> &str {
        &self.inner.batch_name
    }

    /// Polls right now and returns once every request of the round has been
    /// reported back to the phylum.
    ///
    /// Runs even while paused or stopped. Concurrent calls are not
    /// serialized against each other or against scheduled rounds.
    pub async fn tick(&self) {
        let span = self.inner.span();
        self.inner.clone().round().instrument(span).await;
    }

    /// Schedules an immediate poll without waiting for it.
    ///
    /// Runs even while paused or stopped.
    pub fn tick_async(&self) {
        if self.commands.send(PollCommand::Force).is_err() {
            error!(batch_name = %self.inner.batch_name, "poll loop is gone; forced tick dropped");
        }
    }

    /// Pauses scheduled polling. Rounds already running are not interrupted.
    pub fn pause(&self) {
        *self.inner.enabled.write() = false;
    }

    pub fn resume(&self) {
        *self.inner.enabled.write() = true;
    }

    pub fn is_paused(&self) -> bool {
        !self.inner.is_enabled()
    }

    /// Permanently stops scheduled polling. Rounds already running are not
    /// cancelled and forced ticks keep working.
    pub fn stop(&self) {
        if self.commands.send(PollCommand::Stop).is_err() {
            debug!(batch_name = %self.inner.batch_name, "poll loop already gone");
        }
    }
}

pub(crate) fn spawn_poll_loop(
    handle: &Handle,
    inner: Arc<TickerInner>,
    period: Duration,
) -> Ticker {
    let (commands, receiver) = mpsc::unbounded_channel();
    let span = inner.span();
    handle.spawn(poll_loop(inner.clone(), receiver, period).instrument(span));
    Ticker { inner, commands }
}

async fn poll_loop(
    inner: Arc<TickerInner>,
    mut commands: mpsc::UnboundedReceiver<PollCommand>,
    period: Duration,
) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut stopped = false;
    let mut handles_open = true;
    info!(interval_ms = period.as_millis() as u64, "batch polling started");

    loop {
        tokio::select! {
            command = commands.recv(), if handles_open => match command {
                Some(PollCommand::Force) => {
                    tokio::spawn(inner.clone().round().in_current_span());
                }
                Some(PollCommand::Stop) => {
                    if !stopped {
                        info!("batch polling stopped");
                    }
                    stopped = true;
                }
                None => handles_open = false,
            },
            _ = interval.tick(), if !stopped => {
                if inner.is_enabled() {
                    tokio::spawn(inner.clone().round().in_current_span());
                }
            }
        }

        if stopped && !handles_open {
            break;
        }
    }
    debug!("batch poll loop exited");
}
