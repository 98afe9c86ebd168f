//! In-memory substrate hosting a batch phylum.
//!
//! Endpoints:
//! - `schedule_request_now [batch, message]`
//! - `schedule_request [batch, message, rfc3339]`
//! - `batch_get_requests [batch]`: requests due at the call's timestamp
//! - `batch_process_response [batch, envelope]`
//! - `get_recent_input []`
//! - `healthcheck []`
//! - `fail [code, message]`: always a phylum error

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shiro_client::ports::{
    ConcreteRequestOptions, Substrate, SubstrateBlock, SubstrateError, SubstrateResponse,
    SubstrateTransaction,
};

pub const LEDGER_VERSION: &str = "batch-1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Pending {
    batch: String,
    request_id: String,
    message: Value,
    due: DateTime<FixedOffset>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct LedgerState {
    phylum: String,
    creator: String,
    attributes: BTreeMap<String, String>,
    pending: Vec<Pending>,
    recent_input: String,
    next_request: u64,
    /// One transaction id per block.
    blocks: Vec<String>,
}

impl LedgerState {
    fn commit(&mut self) -> (String, u64) {
        let height = self.blocks.len() as u64 + 1;
        let txid = format!("tx-{:04}", height);
        self.blocks.push(txid.clone());
        (txid, height)
    }
}

/// Substrate emulating the batch phylum, one state per mock tag.
#[derive(Default)]
pub struct BatchLedger {
    next_tag: AtomicU64,
    ledgers: Mutex<HashMap<String, LedgerState>>,
    calls: Mutex<Vec<(String, ConcreteRequestOptions)>>,
}

fn success(result: Value) -> SubstrateResponse {
    SubstrateResponse {
        result_json: result.to_string().into_bytes(),
        ..SubstrateResponse::default()
    }
}

fn committed(result: Value, txid: String, height: u64) -> SubstrateResponse {
    SubstrateResponse {
        transaction_id: txid,
        commit_block: Some(height),
        max_simulated_block: Some(height - 1),
        ..success(result)
    }
}

fn failure(code: i64, message: &str, data: Value) -> SubstrateResponse {
    SubstrateResponse {
        has_error: true,
        error_code: code,
        error_message: message.to_string(),
        error_json: data.to_string().into_bytes(),
        ..SubstrateResponse::default()
    }
}

fn parse_time(raw: &str) -> Result<DateTime<FixedOffset>, SubstrateError> {
    DateTime::parse_from_rfc3339(raw)
        .map_err(|e| SubstrateError::new(format!("bad timestamp {:?}: {}", raw, e)))
}

impl BatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(method, options)` pair passed to `call`.
    pub fn calls(&self) -> Vec<(String, ConcreteRequestOptions)> {
        self.calls.lock().clone()
    }

    pub fn creator(&self, tag: &str) -> Option<(String, BTreeMap<String, String>)> {
        self.ledgers
            .lock()
            .get(tag)
            .map(|l| (l.creator.clone(), l.attributes.clone()))
    }

    pub fn is_open(&self, tag: &str) -> bool {
        self.ledgers.lock().contains_key(tag)
    }

    fn with_ledger<T>(
        &self,
        tag: &str,
        f: impl FnOnce(&mut LedgerState) -> Result<T, SubstrateError>,
    ) -> Result<T, SubstrateError> {
        let mut ledgers = self.ledgers.lock();
        let ledger = ledgers
            .get_mut(tag)
            .ok_or_else(|| SubstrateError::new(format!("unknown mock {}", tag)))?;
        f(ledger)
    }

    fn dispatch(
        ledger: &mut LedgerState,
        method: &str,
        args: &[Value],
        options: &ConcreteRequestOptions,
    ) -> Result<SubstrateResponse, SubstrateError> {
        let arg_str = |i: usize| args.get(i).and_then(Value::as_str).unwrap_or_default();
        let now = || parse_time(&options.timestamp);

        let resp = match method {
            "schedule_request_now" | "schedule_request" => {
                let due = if method == "schedule_request" {
                    parse_time(arg_str(2))?
                } else {
                    now()?
                };
                ledger.next_request += 1;
                ledger.pending.push(Pending {
                    batch: arg_str(0).to_string(),
                    request_id: format!("req-{}", ledger.next_request),
                    message: args.get(1).cloned().unwrap_or(Value::Null),
                    due,
                });
                let (txid, height) = ledger.commit();
                committed(Value::Bool(true), txid, height)
            }
            "batch_get_requests" => {
                let now = now()?;
                let batch = arg_str(0);
                let due: Vec<Value> = ledger
                    .pending
                    .iter()
                    .filter(|p| p.batch == batch && p.due <= now)
                    .map(|p| {
                        json!({
                            "batch_id": batch,
                            "request_id": p.request_id,
                            "message": p.message,
                        })
                    })
                    .collect();
                success(Value::Array(due))
            }
            "batch_process_response" => {
                let envelope = args.get(1).cloned().unwrap_or(Value::Null);
                let request_id = envelope["request_id"].as_str().unwrap_or_default();
                let message = envelope["message"].as_str().unwrap_or_default();
                ledger.recent_input = if envelope["is_error"].as_bool().unwrap_or(false) {
                    format!("error: {}", message)
                } else {
                    message.to_string()
                };
                ledger.pending.retain(|p| p.request_id != request_id);
                let (txid, height) = ledger.commit();
                committed(Value::Bool(true), txid, height)
            }
            "get_recent_input" => success(Value::String(ledger.recent_input.clone())),
            "healthcheck" => success(json!({
                "reports": [{
                    "timestamp": options.timestamp,
                    "status": "UP",
                    "service_name": ledger.phylum,
                    "service_version": LEDGER_VERSION,
                }]
            })),
            "fail" => failure(
                args.first().and_then(Value::as_i64).unwrap_or(1),
                arg_str(1),
                json!({"method": method}),
            ),
            other => failure(404, &format!("unknown endpoint {}", other), Value::Null),
        };
        Ok(resp)
    }
}

#[async_trait]
impl Substrate for BatchLedger {
    async fn health_check(&self, nonce: u64) -> Result<u64, SubstrateError> {
        Ok(nonce)
    }

    async fn new_mock_from(
        &self,
        name: &str,
        _version: &str,
        snapshot: &[u8],
    ) -> Result<String, SubstrateError> {
        let mut state = if snapshot.is_empty() {
            LedgerState::default()
        } else {
            serde_json::from_slice(snapshot)
                .map_err(|e| SubstrateError::new(format!("bad snapshot: {}", e)))?
        };
        state.phylum = name.to_string();
        let tag = format!("mock-{}", self.next_tag.fetch_add(1, Ordering::SeqCst));
        self.ledgers.lock().insert(tag.clone(), state);
        Ok(tag)
    }

    async fn set_creator_with_attributes_mock(
        &self,
        tag: &str,
        creator: &str,
        attributes: &BTreeMap<String, String>,
    ) -> Result<(), SubstrateError> {
        self.with_ledger(tag, |ledger| {
            ledger.creator = creator.to_string();
            ledger.attributes = attributes.clone();
            Ok(())
        })
    }

    async fn snapshot_mock(&self, tag: &str) -> Result<Vec<u8>, SubstrateError> {
        self.with_ledger(tag, |ledger| {
            serde_json::to_vec(ledger).map_err(|e| SubstrateError::new(e.to_string()))
        })
    }

    async fn close_mock(&self, tag: &str) -> Result<(), SubstrateError> {
        self.ledgers
            .lock()
            .remove(tag)
            .map(|_| ())
            .ok_or_else(|| SubstrateError::new(format!("unknown mock {}", tag)))
    }

    async fn init(
        &self,
        tag: &str,
        phylum: &str,
        _options: &ConcreteRequestOptions,
    ) -> Result<(), SubstrateError> {
        if phylum.is_empty() {
            return Err(SubstrateError::new("empty phylum"));
        }
        self.with_ledger(tag, |ledger| {
            ledger.commit();
            Ok(())
        })
    }

    async fn call(
        &self,
        tag: &str,
        method: &str,
        options: &ConcreteRequestOptions,
    ) -> Result<SubstrateResponse, SubstrateError> {
        self.calls
            .lock()
            .push((method.to_string(), options.clone()));

        let params: Value = serde_json::from_slice(&options.params)
            .map_err(|e| SubstrateError::new(format!("bad params: {}", e)))?;
        let args = match params {
            Value::Array(args) => args,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        self.with_ledger(tag, |ledger| Self::dispatch(ledger, method, &args, options))
    }

    async fn query_info(
        &self,
        tag: &str,
        _options: &ConcreteRequestOptions,
    ) -> Result<u64, SubstrateError> {
        self.with_ledger(tag, |ledger| Ok(ledger.blocks.len() as u64))
    }

    async fn query_block(
        &self,
        tag: &str,
        block_number: u64,
        _options: &ConcreteRequestOptions,
    ) -> Result<SubstrateBlock, SubstrateError> {
        self.with_ledger(tag, |ledger| {
            let index = block_number
                .checked_sub(1)
                .ok_or_else(|| SubstrateError::new("block 0 does not exist"))?;
            let txid = ledger
                .blocks
                .get(index as usize)
                .ok_or_else(|| SubstrateError::new(format!("no block {}", block_number)))?;
            Ok(SubstrateBlock {
                hash: format!("hash-{:04}", block_number),
                transactions: vec![SubstrateTransaction {
                    id: txid.clone(),
                    reason: "VALID".to_string(),
                    event: format!("{{\"block\":{}}}", block_number).into_bytes(),
                    chaincode_id: ledger.phylum.clone(),
                }],
            })
        })
    }
}
