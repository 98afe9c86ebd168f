//! In-process JSON-RPC gateway for driving `RpcClient` over real HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

type Responder = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// A request the stub received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub headers: HeaderMap,
    pub body: Value,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn method(&self) -> &str {
        self.body["method"].as_str().unwrap_or_default()
    }

    pub fn params(&self) -> &Value {
        &self.body["params"]
    }
}

struct GatewayState {
    responder: Responder,
    requests: Mutex<Vec<RecordedRequest>>,
    health_body: Mutex<Value>,
    health_queries: Mutex<Vec<Option<String>>>,
    delay: Mutex<Duration>,
}

/// Gateway stub listening on an ephemeral localhost port.
pub struct GatewayStub {
    addr: SocketAddr,
    state: Arc<GatewayState>,
    server: JoinHandle<()>,
}

impl GatewayStub {
    /// Starts the stub. `responder` maps each JSON-RPC request body to the
    /// full response body.
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        let state = Arc::new(GatewayState {
            responder: Arc::new(responder),
            requests: Mutex::new(Vec::new()),
            health_body: Mutex::new(json!({"reports": []})),
            health_queries: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
        });

        let app = Router::new()
            .route("/", post(rpc))
            .route("/health_check", get(health_check))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind gateway stub");
        let addr = listener.local_addr().expect("gateway stub address");
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("gateway stub");
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL to configure as the client endpoint.
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.state
            .requests
            .lock()
            .last()
            .cloned()
            .expect("no request received")
    }

    pub fn set_health_body(&self, body: Value) {
        *self.state.health_body.lock() = body;
    }

    /// Raw query strings seen on `/health_check`.
    pub fn health_queries(&self) -> Vec<Option<String>> {
        self.state.health_queries.lock().clone()
    }

    /// Holds every response back by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock() = delay;
    }
}

impl Drop for GatewayStub {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn rpc(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.requests.lock().push(RecordedRequest {
        headers,
        body: body.clone(),
    });
    let delay = *state.delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let mut reply = (state.responder)(&body);
    if let (Some(obj), Some(id)) = (reply.as_object_mut(), body.get("id")) {
        obj.entry("id").or_insert_with(|| id.clone());
    }
    Json(reply)
}

async fn health_check(
    State(state): State<Arc<GatewayState>>,
    RawQuery(query): RawQuery,
) -> Json<Value> {
    state.health_queries.lock().push(query);
    Json(state.health_body.lock().clone())
}

// =============================================================================
// RESPONSE BUILDERS
// =============================================================================

fn envelope(level: i64, result: Value, code: i64, message: &str, data: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": {
            "error_level": level,
            "result": result,
            "code": code,
            "message": message,
            "data": data,
        }
    })
}

/// Error level 0.
pub fn success(result: Value) -> Value {
    envelope(0, result, 0, "", Value::Null)
}

/// Error level 0 with the commit metadata a write produces.
pub fn committed(result: Value, txid: &str, commit_block: u64, max_simulated: u64) -> Value {
    let mut reply = success(result);
    reply["$commit_tx_id"] = json!(txid);
    reply["$commit_block_num"] = json!(commit_block);
    reply["$max_simulated_block_num"] = json!(max_simulated);
    reply
}

/// Error level 1.
pub fn client_error(code: i64, message: &str) -> Value {
    envelope(1, Value::Null, code, message, Value::Null)
}

/// Error level 2.
pub fn phylum_error(code: i64, message: &str, data: Value) -> Value {
    envelope(2, Value::Null, code, message, data)
}
