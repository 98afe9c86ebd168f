//! JSON-RPC wire structures and envelope decoding.

use std::collections::BTreeMap;

use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::{
    AppError, Block, ClientError, ErrorLevel, Params, RequestOptions, ShiroError, ShiroResult,
    Transaction,
};

pub(crate) const JSONRPC_VERSION: &str = "2.0";

pub(crate) const METHOD_SEED: &str = "Seed";
pub(crate) const METHOD_SHIRO_PHYLUM: &str = "ShiroPhylum";
pub(crate) const METHOD_INIT: &str = "Init";
pub(crate) const METHOD_CALL: &str = "Call";
pub(crate) const METHOD_QUERY_INFO: &str = "QueryInfo";
pub(crate) const METHOD_QUERY_BLOCK: &str = "QueryBlock";

const TRANSIENT_TIMESTAMP_OVERRIDE: &str = "timestamp_override";
const ENVELOPE_OP: &str = "reqres";

/// JSON-RPC request structure.
#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: &'a str,
    pub method: &'static str,
    pub params: P,
}

impl<'a, P: Serialize> RpcRequest<'a, P> {
    pub fn new(id: &'a str, method: &'static str, params: P) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SeedParams<'a> {
    pub version: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct InitParams<'a> {
    pub phylum: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct QueryBlockParams {
    pub block_number: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmptyParams {}

/// Params of the `Call` method. Optional fields are omitted rather than
/// zero valued; the two fetch-url fields are always present.
#[derive(Debug, Serialize)]
pub(crate) struct CallParams<'a> {
    pub method: &'a str,
    pub params: Option<&'a Params>,
    pub transient: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub dependent_txid: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub dependent_block: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub phylum_version: &'a str,
    #[serde(skip_serializing_if = "is_false")]
    pub disable_write_polling: bool,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub msp_filter: &'a [String],
    #[serde(skip_serializing_if = "is_zero")]
    pub min_endorsers: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub creator_msp_id: &'a str,
    pub cc_fetchurl_downgrade: bool,
    pub cc_fetchurl_proxy: String,
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

impl<'a> CallParams<'a> {
    pub fn new(method: &'a str, opts: &'a RequestOptions) -> Self {
        let mut transient: BTreeMap<String, String> = opts
            .transient
            .iter()
            .map(|(k, v)| (k.clone(), hex::encode(v)))
            .collect();
        if let Some(ts) = opts.timestamp() {
            transient.insert(TRANSIENT_TIMESTAMP_OVERRIDE.to_string(), hex::encode(ts));
        }

        Self {
            method,
            params: opts.params.as_ref(),
            transient,
            dependent_txid: &opts.dependent_txid,
            dependent_block: &opts.dependent_block,
            phylum_version: &opts.phylum_version,
            disable_write_polling: opts.disable_write_polling,
            msp_filter: &opts.msp_filter,
            min_endorsers: opts.min_endorsers,
            creator_msp_id: &opts.creator,
            cc_fetchurl_downgrade: opts.cc_fetchurl_downgrade,
            cc_fetchurl_proxy: opts
                .cc_fetchurl_proxy
                .as_ref()
                .map(|u| u.as_str().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Raw level-2 fields, validated only by operations that accept them.
#[derive(Debug, Clone)]
pub(crate) struct AppErrorFields {
    code: Value,
    message: Value,
    data: Value,
}

impl AppErrorFields {
    pub fn into_app_error(self, op: &'static str) -> ShiroResult<AppError> {
        let code = self
            .code
            .as_f64()
            .ok_or_else(|| ShiroError::decode(op, "a numeric code field"))?;
        let message = self
            .message
            .as_str()
            .ok_or_else(|| ShiroError::decode(op, "a string message field"))?
            .to_string();
        let data = serde_json::to_vec(&self.data)?;
        Ok(AppError::new(code as i64, message, data))
    }
}

/// A decoded gateway envelope, classified by error level.
#[derive(Debug, Clone)]
pub(crate) enum RpcOutcome {
    Success {
        result: Value,
        transaction_id: String,
        commit_block: Option<u64>,
        max_simulated_block: Option<u64>,
    },
    Client(ClientError),
    Application(AppErrorFields),
    Unknown(i64),
}

impl RpcOutcome {
    /// Accepts only levels 0 and 1, as the non-`Call` operations do.
    pub fn into_result(self, op: &'static str) -> ShiroResult<Value> {
        match self {
            Self::Success { result, .. } => Ok(result),
            Self::Client(e) => Err(e.into()),
            Self::Application(_) => Err(ShiroError::UnexpectedErrorLevel {
                op,
                level: ErrorLevel::Phylum.as_wire(),
            }),
            Self::Unknown(level) => Err(ShiroError::UnexpectedErrorLevel { op, level }),
        }
    }
}

fn require<'v>(obj: &'v Map<String, Value>, field: &str) -> ShiroResult<&'v Value> {
    obj.get(field)
        .ok_or_else(|| ShiroError::decode(ENVELOPE_OP, format!("a {} field", field)))
}

/// Decodes a gateway response body.
pub(crate) fn decode_envelope(body: &Value) -> ShiroResult<RpcOutcome> {
    let obj = body
        .as_object()
        .ok_or_else(|| ShiroError::decode(ENVELOPE_OP, "an object"))?;

    let version = require(obj, "jsonrpc")?
        .as_str()
        .ok_or_else(|| ShiroError::decode(ENVELOPE_OP, "a string jsonrpc field"))?;
    if version != JSONRPC_VERSION {
        return Err(ShiroError::decode(ENVELOPE_OP, "jsonrpc version 2.0"));
    }

    let result = require(obj, "result")?
        .as_object()
        .ok_or_else(|| ShiroError::decode(ENVELOPE_OP, "an object result field"))?;
    let level = require(result, "error_level")?
        .as_f64()
        .ok_or_else(|| ShiroError::decode(ENVELOPE_OP, "a numeric error_level field"))?
        as i64;
    let inner = require(result, "result")?;
    let code = require(result, "code")?;
    let message = require(result, "message")?;
    let data = require(result, "data")?;

    let outcome = match ErrorLevel::from_wire(level) {
        Some(ErrorLevel::None) => RpcOutcome::Success {
            result: inner.clone(),
            transaction_id: obj
                .get("$commit_tx_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            commit_block: obj.get("$commit_block_num").and_then(Value::as_u64),
            max_simulated_block: obj.get("$max_simulated_block_num").and_then(Value::as_u64),
        },
        Some(ErrorLevel::Client) => RpcOutcome::Client(match message.as_str() {
            Some(m) => ClientError::new(code.as_f64().unwrap_or_default() as i64, m),
            None => ClientError::without_message(),
        }),
        Some(ErrorLevel::Phylum) => RpcOutcome::Application(AppErrorFields {
            code: code.clone(),
            message: message.clone(),
            data: data.clone(),
        }),
        None => RpcOutcome::Unknown(level),
    };
    Ok(outcome)
}

/// Reads a numeric block height.
pub(crate) fn decode_height(result: &Value) -> ShiroResult<u64> {
    result
        .as_u64()
        .or_else(|| result.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        .ok_or_else(|| ShiroError::decode(METHOD_QUERY_INFO, "a numeric result field"))
}

fn string_array(obj: &Map<String, Value>, field: &str, member: &str) -> ShiroResult<Vec<String>> {
    const OP: &str = METHOD_QUERY_BLOCK;
    let items = obj
        .get(field)
        .ok_or_else(|| ShiroError::decode(OP, format!("a {} field", field)))?
        .as_array()
        .ok_or_else(|| ShiroError::decode(OP, format!("an array {} field", field)))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| ShiroError::decode(OP, format!("a string {} member", member)))
        })
        .collect()
}

/// Decodes a `QueryBlock` result, zipping the four parallel arrays.
pub(crate) fn decode_block(result: &Value) -> ShiroResult<Block> {
    const OP: &str = METHOD_QUERY_BLOCK;
    let obj = result
        .as_object()
        .ok_or_else(|| ShiroError::decode(OP, "an object result field"))?;

    let hash = obj
        .get("block_hash")
        .ok_or_else(|| ShiroError::decode(OP, "a block_hash field"))?
        .as_str()
        .ok_or_else(|| ShiroError::decode(OP, "a string block_hash field"))?
        .to_string();

    let ids = string_array(obj, "transaction_ids", "transaction_id")?;
    let reasons = string_array(obj, "transaction_reasons", "transaction_reason")?;
    let events = string_array(obj, "transaction_events", "transaction_event")?
        .iter()
        .map(|e| {
            base64::engine::general_purpose::STANDARD
                .decode(e)
                .map_err(|_| ShiroError::decode(OP, "a base64 string transaction_event member"))
        })
        .collect::<ShiroResult<Vec<_>>>()?;
    let chaincode_ids = string_array(obj, "chaincode_ids", "chaincode_id")?;

    let n = ids.len();
    if reasons.len() != n || events.len() != n || chaincode_ids.len() != n {
        return Err(ShiroError::MismatchedArrays {
            op: OP,
            ids: n,
            reasons: reasons.len(),
            events: events.len(),
            chaincode_ids: chaincode_ids.len(),
        });
    }

    let transactions = ids
        .into_iter()
        .zip(reasons)
        .zip(events)
        .zip(chaincode_ids)
        .map(|(((id, reason), event), chaincode_id)| Transaction {
            id,
            reason,
            event,
            chaincode_id,
        })
        .collect();

    Ok(Block { hash, transactions })
}
