//! # Shiro Batch
//!
//! Polls a phylum for pending batch requests, hands each one to a callback
//! and reports the outcome back.
//!
//! ## Poll round
//!
//! 1. `batch_get_requests [batch_name]` returns a list of request envelopes.
//! 2. Each envelope runs through the callback concurrently.
//! 3. `batch_process_response [batch_name, envelope]` reports each outcome.
//!
//! Every failure is logged and the round (or the single request) is
//! abandoned. Nothing is retried and nothing reaches the caller of
//! [`Driver::register`].
//!
//! ## Usage
//!
//! ```ignore
//! let driver = Driver::new(client, &[DriverConfig::log_field("service", "oracle")]);
//! let ticker = driver.register(
//!     "payments",
//!     Duration::from_secs(5),
//!     |_batch_id, _request_id, message| Ok(handle(message)?),
//!     Vec::new(),
//! )?;
//! ticker.tick().await;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod driver;
pub mod error;
pub mod ticker;

pub use domain::{DriverConfig, DriverOptions, RequestEnvelope, ResponseEnvelope};
pub use driver::{BatchCallback, Driver, MIN_POLL_INTERVAL};
pub use error::{BatchError, BatchResult};
pub use ticker::Ticker;
