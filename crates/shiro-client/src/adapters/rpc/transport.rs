//! HTTP exchange raced against caller cancellation.
//!
//! The request runs on its own task. If the caller's token fires or the
//! deadline passes first, the caller gets an error immediately and the task
//! finishes reading the body in the background; those bytes are dropped.

use std::future::pending;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::domain::{RequestOptions, ShiroError, ShiroResult};

/// Status and body of a completed exchange.
#[derive(Debug)]
pub(crate) struct HttpReply {
    pub status: reqwest::StatusCode,
    pub body: Vec<u8>,
}

pub(crate) async fn execute(
    op: &'static str,
    client: &reqwest::Client,
    request: reqwest::Request,
    opts: &RequestOptions,
) -> ShiroResult<HttpReply> {
    let (tx, rx) = oneshot::channel();
    let client = client.clone();
    tokio::spawn(async move {
        let outcome = async {
            let response = client.execute(request).await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(HttpReply {
                status,
                body: body.to_vec(),
            })
        }
        .await;
        if tx.send(outcome).is_err() {
            debug!(op, "discarding response received after cancellation");
        }
    });

    let cancelled = async {
        match &opts.cancellation {
            Some(token) => token.cancelled().await,
            None => pending().await,
        }
    };
    let deadline = async {
        match opts.timeout {
            Some(timeout) => {
                tokio::time::sleep(timeout).await;
                timeout
            }
            None => pending().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancelled => Err(ShiroError::Cancelled { op }),
        timeout = deadline => Err(ShiroError::DeadlineExceeded { op, timeout }),
        reply = rx => match reply {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(source)) => Err(ShiroError::Http { op, source }),
            Err(_) => {
                warn!(op, "transport task ended without a reply");
                Err(ShiroError::Internal(format!("{}: transport task ended without a reply", op)))
            }
        },
    }
}
