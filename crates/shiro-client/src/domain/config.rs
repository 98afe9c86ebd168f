//! Request configuration.
//!
//! A call is configured by an ordered list of [`Config`] records. Each record
//! sets exactly one attribute of a [`RequestOptions`]; [`apply_configs`] folds
//! the client's base records and then the per-call records over a fresh
//! default, so the last record touching a field wins.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

/// Transient key read by the substrate for the Jaeger collector URI.
pub const TRANSIENT_KEY_JAEGER_COLLECTOR: &str = "trace_jaeger_collector_endpoint";
/// Transient key read by the substrate for the tracing dataset id.
pub const TRANSIENT_KEY_TRACE_DATASET: &str = "trace_dataset";

/// Produces the timestamp the mock substrate treats as "now".
pub type TimestampGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Receives the decoded JSON-RPC envelope of the last exchange.
#[derive(Clone, Default)]
pub struct ResponseCapture {
    inner: Arc<Mutex<Option<Value>>>,
}

impl ResponseCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last captured envelope, if any.
    pub fn get(&self) -> Option<Value> {
        self.inner.lock().clone()
    }

    pub fn take(&self) -> Option<Value> {
        self.inner.lock().take()
    }

    pub(crate) fn store(&self, value: Value) {
        *self.inner.lock() = Some(value);
    }
}

impl fmt::Debug for ResponseCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCapture")
            .field("captured", &self.inner.lock().is_some())
            .finish()
    }
}

/// Call parameters.
///
/// `Raw` holds JSON text that is sent exactly as given, so numbers outside
/// the range of `f64` or `u64` survive the trip.
#[derive(Debug, Clone)]
pub enum Params {
    Value(Value),
    Raw(Box<RawValue>),
}

impl Params {
    /// The params as JSON text.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Value(v) => serde_json::to_string(v),
            Self::Raw(r) => Ok(r.get().to_string()),
        }
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => v.serialize(serializer),
            Self::Raw(r) => r.serialize(serializer),
        }
    }
}

/// Proxy URL for the substrate's fetch-url calls.
///
/// Validated on construction but sent exactly as written: `http://proxy:3128`
/// stays without the trailing slash [`Url`] would add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyUrl {
    url: Url,
    raw: String,
}

impl ProxyUrl {
    pub fn parse(raw: impl Into<String>) -> Result<Self, url::ParseError> {
        let raw = raw.into();
        let url = Url::parse(&raw)?;
        Ok(Self { url, raw })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl From<Url> for ProxyUrl {
    fn from(url: Url) -> Self {
        let raw = url.to_string();
        Self { url, raw }
    }
}

impl fmt::Display for ProxyUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One mutation of a [`RequestOptions`].
#[derive(Clone)]
pub enum Config {
    Endpoint(String),
    Id(String),
    Header(String, String),
    AuthToken(String),
    Params(Value),
    /// Params as exact JSON text.
    RawParams(Box<RawValue>),
    TransientData(String, Vec<u8>),
    TransientDataMap(BTreeMap<String, Vec<u8>>),
    Response(ResponseCapture),
    /// Span that request spans are parented under.
    ParentSpan(tracing::Span),
    LogField(String, Value),
    LogFields(BTreeMap<String, Value>),
    TimestampGenerator(TimestampGenerator),
    /// No effect in mock mode.
    MspFilter(Vec<String>),
    MinEndorsers(u32),
    /// Only has effect in mock mode.
    Creator(String),
    DependentTxId(String),
    DependentBlock(String),
    DisableWritePolling(bool),
    PhylumVersion(String),
    /// Only meaningful when installing a phylum.
    NewPhylumVersion(String),
    CcFetchUrlDowngrade(bool),
    CcFetchUrlProxy(ProxyUrl),
    DebugPrint(bool),
    HttpClient(reqwest::Client),
    Cancellation(CancellationToken),
    Timeout(Duration),
    /// Named presence flag with no effect on the request itself.
    Marker(&'static str),
}

impl Config {
    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self::Endpoint(endpoint.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn header(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Header(key.into(), value.into())
    }

    pub fn auth_token(token: impl Into<String>) -> Self {
        Self::AuthToken(token.into())
    }

    pub fn params(params: impl Into<Value>) -> Self {
        Self::Params(params.into())
    }

    /// Serializes `params` up front so a failure surfaces at the call site.
    pub fn try_params<T: Serialize + ?Sized>(params: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::Params(serde_json::to_value(params)?))
    }

    /// Validates `json` and sends it byte for byte.
    pub fn raw_params(json: impl Into<String>) -> Result<Self, serde_json::Error> {
        Ok(Self::RawParams(RawValue::from_string(json.into())?))
    }

    pub fn cc_fetchurl_proxy(url: impl Into<String>) -> Result<Self, url::ParseError> {
        Ok(Self::CcFetchUrlProxy(ProxyUrl::parse(url)?))
    }

    pub fn transient_data(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::TransientData(key.into(), value.into())
    }

    pub fn transient_data_map(data: BTreeMap<String, Vec<u8>>) -> Self {
        Self::TransientDataMap(data)
    }

    pub fn log_field(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::LogField(key.into(), value.into())
    }

    pub fn timestamp_generator<F>(generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self::TimestampGenerator(Arc::new(generator))
    }

    pub fn msp_filter<I, S>(filter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MspFilter(filter.into_iter().map(Into::into).collect())
    }

    pub fn creator(creator: impl Into<String>) -> Self {
        Self::Creator(creator.into())
    }

    pub fn dependent_txid(txid: impl Into<String>) -> Self {
        Self::DependentTxId(txid.into())
    }

    pub fn dependent_block(block: impl Into<String>) -> Self {
        Self::DependentBlock(block.into())
    }

    pub fn phylum_version(version: impl Into<String>) -> Self {
        Self::PhylumVersion(version.into())
    }

    pub fn new_phylum_version(version: impl Into<String>) -> Self {
        Self::NewPhylumVersion(version.into())
    }

    /// Enables Jaeger tracing in the substrate. `collector_uri` is the full
    /// URI of the Jaeger HTTP Thrift collector.
    pub fn jaeger_tracing(collector_uri: &str, dataset_id: &str) -> Self {
        let mut data = BTreeMap::new();
        data.insert(
            TRANSIENT_KEY_JAEGER_COLLECTOR.to_string(),
            collector_uri.as_bytes().to_vec(),
        );
        data.insert(
            TRANSIENT_KEY_TRACE_DATASET.to_string(),
            dataset_id.as_bytes().to_vec(),
        );
        Self::TransientDataMap(data)
    }

    fn apply(&self, opts: &mut RequestOptions) {
        match self {
            Self::Endpoint(v) => opts.endpoint = v.clone(),
            Self::Id(v) => opts.id = v.clone(),
            Self::Header(k, v) => {
                opts.headers.insert(k.clone(), v.clone());
            }
            Self::AuthToken(v) => opts.auth_token = v.clone(),
            Self::Params(v) => opts.params = Some(Params::Value(v.clone())),
            Self::RawParams(v) => opts.params = Some(Params::Raw(v.clone())),
            Self::TransientData(k, v) => {
                opts.transient.insert(k.clone(), v.clone());
            }
            Self::TransientDataMap(m) => {
                for (k, v) in m {
                    opts.transient.insert(k.clone(), v.clone());
                }
            }
            Self::Response(c) => opts.response_capture = Some(c.clone()),
            Self::ParentSpan(s) => opts.parent_span = Some(s.clone()),
            Self::LogField(k, v) => {
                opts.log_fields.insert(k.clone(), v.clone());
            }
            Self::LogFields(m) => {
                for (k, v) in m {
                    opts.log_fields.insert(k.clone(), v.clone());
                }
            }
            Self::TimestampGenerator(g) => opts.timestamp_generator = Some(g.clone()),
            Self::MspFilter(v) => opts.msp_filter = v.clone(),
            Self::MinEndorsers(v) => opts.min_endorsers = *v,
            Self::Creator(v) => opts.creator = v.clone(),
            Self::DependentTxId(v) => opts.dependent_txid = v.clone(),
            Self::DependentBlock(v) => opts.dependent_block = v.clone(),
            Self::DisableWritePolling(v) => opts.disable_write_polling = *v,
            Self::PhylumVersion(v) => opts.phylum_version = v.clone(),
            Self::NewPhylumVersion(v) => opts.new_phylum_version = v.clone(),
            Self::CcFetchUrlDowngrade(v) => opts.cc_fetchurl_downgrade = *v,
            Self::CcFetchUrlProxy(v) => opts.cc_fetchurl_proxy = Some(v.clone()),
            Self::DebugPrint(v) => opts.debug_print = *v,
            Self::HttpClient(c) => opts.http_client = Some(c.clone()),
            Self::Cancellation(t) => opts.cancellation = Some(t.clone()),
            Self::Timeout(d) => opts.timeout = Some(*d),
            Self::Marker(name) => {
                opts.markers.insert(*name);
            }
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Endpoint(v) => f.debug_tuple("Endpoint").field(v).finish(),
            Self::Id(v) => f.debug_tuple("Id").field(v).finish(),
            Self::Header(k, _) => f.debug_tuple("Header").field(k).finish(),
            Self::AuthToken(_) => f.write_str("AuthToken(..)"),
            Self::Params(v) => f.debug_tuple("Params").field(v).finish(),
            Self::RawParams(v) => f.debug_tuple("RawParams").field(&v.get()).finish(),
            Self::TransientData(k, _) => f.debug_tuple("TransientData").field(k).finish(),
            Self::TransientDataMap(m) => f
                .debug_tuple("TransientDataMap")
                .field(&m.keys().collect::<Vec<_>>())
                .finish(),
            Self::Response(c) => f.debug_tuple("Response").field(c).finish(),
            Self::ParentSpan(s) => f.debug_tuple("ParentSpan").field(s).finish(),
            Self::LogField(k, v) => f.debug_tuple("LogField").field(k).field(v).finish(),
            Self::LogFields(m) => f.debug_tuple("LogFields").field(m).finish(),
            Self::TimestampGenerator(_) => f.write_str("TimestampGenerator(..)"),
            Self::MspFilter(v) => f.debug_tuple("MspFilter").field(v).finish(),
            Self::MinEndorsers(v) => f.debug_tuple("MinEndorsers").field(v).finish(),
            Self::Creator(v) => f.debug_tuple("Creator").field(v).finish(),
            Self::DependentTxId(v) => f.debug_tuple("DependentTxId").field(v).finish(),
            Self::DependentBlock(v) => f.debug_tuple("DependentBlock").field(v).finish(),
            Self::DisableWritePolling(v) => f.debug_tuple("DisableWritePolling").field(v).finish(),
            Self::PhylumVersion(v) => f.debug_tuple("PhylumVersion").field(v).finish(),
            Self::NewPhylumVersion(v) => f.debug_tuple("NewPhylumVersion").field(v).finish(),
            Self::CcFetchUrlDowngrade(v) => f.debug_tuple("CcFetchUrlDowngrade").field(v).finish(),
            Self::CcFetchUrlProxy(v) => f.debug_tuple("CcFetchUrlProxy").field(v).finish(),
            Self::DebugPrint(v) => f.debug_tuple("DebugPrint").field(v).finish(),
            Self::HttpClient(_) => f.write_str("HttpClient(..)"),
            Self::Cancellation(t) => f
                .debug_tuple("Cancellation")
                .field(&t.is_cancelled())
                .finish(),
            Self::Timeout(d) => f.debug_tuple("Timeout").field(d).finish(),
            Self::Marker(name) => f.debug_tuple("Marker").field(name).finish(),
        }
    }
}

/// Resolved settings for a single request. Discarded after the call.
#[derive(Clone)]
pub struct RequestOptions {
    /// Fresh UUID v4 unless set.
    pub id: String,
    pub endpoint: String,
    pub auth_token: String,
    pub headers: BTreeMap<String, String>,
    pub transient: BTreeMap<String, Vec<u8>>,
    pub params: Option<Params>,
    pub response_capture: Option<ResponseCapture>,
    pub parent_span: Option<tracing::Span>,
    pub log_fields: BTreeMap<String, Value>,
    pub timestamp_generator: Option<TimestampGenerator>,
    pub msp_filter: Vec<String>,
    pub min_endorsers: u32,
    pub creator: String,
    pub dependent_txid: String,
    pub dependent_block: String,
    pub disable_write_polling: bool,
    pub phylum_version: String,
    pub new_phylum_version: String,
    pub cc_fetchurl_downgrade: bool,
    pub cc_fetchurl_proxy: Option<ProxyUrl>,
    pub debug_print: bool,
    pub http_client: Option<reqwest::Client>,
    pub cancellation: Option<CancellationToken>,
    pub timeout: Option<Duration>,
    markers: BTreeSet<&'static str>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            endpoint: String::new(),
            auth_token: String::new(),
            headers: BTreeMap::new(),
            transient: BTreeMap::new(),
            params: None,
            response_capture: None,
            parent_span: None,
            log_fields: BTreeMap::new(),
            timestamp_generator: None,
            msp_filter: Vec::new(),
            min_endorsers: 0,
            creator: String::new(),
            dependent_txid: String::new(),
            dependent_block: String::new(),
            disable_write_polling: false,
            phylum_version: String::new(),
            new_phylum_version: String::new(),
            cc_fetchurl_downgrade: false,
            cc_fetchurl_proxy: None,
            debug_print: false,
            http_client: None,
            cancellation: None,
            timeout: None,
            markers: BTreeSet::new(),
        }
    }
}

impl RequestOptions {
    pub fn has_marker(&self, name: &str) -> bool {
        self.markers.contains(name)
    }

    /// Runs the timestamp generator, if one is configured.
    pub fn timestamp(&self) -> Option<String> {
        self.timestamp_generator.as_ref().map(|g| g())
    }

    /// Params serialized to JSON bytes; `null` when unset.
    pub fn params_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        match &self.params {
            Some(params) => params.to_json_string().map(String::into_bytes),
            None => Ok(b"null".to_vec()),
        }
    }

    /// Span for one outbound operation, parented under the configured span
    /// or the current one.
    pub fn request_span(&self, op: &'static str) -> tracing::Span {
        let fields = if self.log_fields.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&self.log_fields).unwrap_or_default()
        };
        match &self.parent_span {
            Some(parent) => tracing::debug_span!(
                parent: parent,
                "shiro_request",
                op,
                request_id = %self.id,
                fields = %fields
            ),
            None => tracing::debug_span!(
                "shiro_request",
                op,
                request_id = %self.id,
                fields = %fields
            ),
        }
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("transient", &self.transient.keys().collect::<Vec<_>>())
            .field("params", &self.params)
            .field("log_fields", &self.log_fields)
            .field("msp_filter", &self.msp_filter)
            .field("min_endorsers", &self.min_endorsers)
            .field("creator", &self.creator)
            .field("dependent_txid", &self.dependent_txid)
            .field("dependent_block", &self.dependent_block)
            .field("disable_write_polling", &self.disable_write_polling)
            .field("phylum_version", &self.phylum_version)
            .field("new_phylum_version", &self.new_phylum_version)
            .field("cc_fetchurl_downgrade", &self.cc_fetchurl_downgrade)
            .field("cc_fetchurl_proxy", &self.cc_fetchurl_proxy)
            .field("debug_print", &self.debug_print)
            .field("timeout", &self.timeout)
            .field("markers", &self.markers)
            .finish_non_exhaustive()
    }
}

/// Builds the options for one request: base configs first, then per-call.
pub fn apply_configs(base: &[Config], per_call: &[Config]) -> RequestOptions {
    let mut opts = RequestOptions::default();
    for config in base.iter().chain(per_call) {
        config.apply(&mut opts);
    }
    opts
}

/// True if `configs` contains the marker `name`.
pub fn has_marker(configs: &[Config], name: &str) -> bool {
    configs
        .iter()
        .any(|c| matches!(c, Config::Marker(m) if *m == name))
}

/// The timestamp generator a config list resolves to.
pub fn probe_timestamp_generator(configs: &[Config]) -> Option<TimestampGenerator> {
    apply_configs(&[], configs).timestamp_generator
}
