//! JSON-RPC 2.0 surface over the same pool operations the REST façade
//! exposes, reachable over stdio (for CLI/subprocess integration) and over
//! a WebSocket upgrade, using the same `serde_json` request/response
//! envelope shape `riptide-api`'s transport layer uses.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::Json;
use gateway_types::{now_ms, BrowserId, GatewayError, PageId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

fn gateway_error_code(err: &GatewayError) -> i64 {
    match err {
        GatewayError::NotFound(_) => -32001,
        GatewayError::PageNotFound(_) => -32002,
        GatewayError::UnauthorizedSession(..) => -32003,
        GatewayError::Unauthorized => -32004,
        GatewayError::ShuttingDown => -32005,
        GatewayError::CircuitOpen => -32006,
        GatewayError::QueueFull => -32007,
        GatewayError::Timeout => -32008,
        GatewayError::LaunchFailed(_) => -32009,
        GatewayError::PageLimitReached(_) => -32010,
        GatewayError::Unhealthy(_) => -32011,
        GatewayError::InvalidConfig(_) => -32012,
        GatewayError::AlreadyInitialized => -32013,
        GatewayError::Internal(_) => -32014,
    }
}

fn error_response(id: Option<Value>, code: i64, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.into(),
        }),
    }
}

fn ok_response(id: Option<Value>, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: Some(result),
        error: None,
    }
}

#[derive(Debug, Deserialize, Default)]
struct AcquireParams {
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ContextParams {
    context_id: uuid::Uuid,
}

#[derive(Debug, Deserialize)]
struct PageParams {
    context_id: uuid::Uuid,
    page_id: uuid::Uuid,
}

/// Dispatches one already-parsed request against the pool on behalf of
/// `session_id`. Separated from the transport handlers below so stdio,
/// HTTP, and WebSocket all share one implementation.
pub async fn dispatch(
    state: &AppState,
    session_id: SessionId,
    request: JsonRpcRequest,
) -> JsonRpcResponse {
    let id = request.id.clone();
    let outcome = run_method(state, session_id, &request.method, request.params).await;
    match outcome {
        Ok(value) => ok_response(id, value),
        Err(MethodError::UnknownMethod) => {
            error_response(id, -32601, format!("unknown method: {}", request.method))
        }
        Err(MethodError::BadParams(msg)) => error_response(id, -32602, msg),
        Err(MethodError::Gateway(err)) => {
            error_response(id, gateway_error_code(&err), err.to_string())
        }
    }
}

enum MethodError {
    UnknownMethod,
    BadParams(String),
    Gateway(GatewayError),
}

impl From<GatewayError> for MethodError {
    fn from(err: GatewayError) -> Self {
        MethodError::Gateway(err)
    }
}

async fn run_method(
    state: &AppState,
    session_id: SessionId,
    method: &str,
    params: Value,
) -> Result<Value, MethodError> {
    match method {
        "acquire" => {
            let params: AcquireParams = if params.is_null() {
                AcquireParams::default()
            } else {
                serde_json::from_value(params)
                    .map_err(|e| MethodError::BadParams(e.to_string()))?
            };
            let timeout_ms = params.timeout_ms.unwrap_or(state.default_acquire_timeout_ms);
            let deadline = now_ms().saturating_add(timeout_ms);
            let instance = state.pool.acquire(session_id, deadline).await?;
            Ok(serde_json::to_value(instance).expect("BrowserInstance always serializes"))
        }
        "release" => {
            let params: ContextParams =
                serde_json::from_value(params).map_err(|e| MethodError::BadParams(e.to_string()))?;
            state
                .pool
                .release(BrowserId::from(params.context_id), session_id)
                .await?;
            Ok(Value::Null)
        }
        "create_page" => {
            let params: ContextParams =
                serde_json::from_value(params).map_err(|e| MethodError::BadParams(e.to_string()))?;
            let page_id = state
                .pool
                .create_page(BrowserId::from(params.context_id), session_id)
                .await?;
            Ok(serde_json::to_value(page_id).expect("PageId always serializes"))
        }
        "close_page" => {
            let params: PageParams =
                serde_json::from_value(params).map_err(|e| MethodError::BadParams(e.to_string()))?;
            state
                .pool
                .close_page(
                    BrowserId::from(params.context_id),
                    session_id,
                    PageId::from(params.page_id),
                )
                .await?;
            Ok(Value::Null)
        }
        "list_instances" => {
            let instances = state.pool.list_instances().await;
            Ok(serde_json::to_value(instances).expect("instances always serialize"))
        }
        "metrics_snapshot" => {
            let snapshot = state.pool.metrics_snapshot().await;
            Ok(serde_json::to_value(snapshot).expect("snapshot always serializes"))
        }
        _ => Err(MethodError::UnknownMethod),
    }
}

/// `POST /v1/rpc`: one request, one response.
pub async fn rpc_http(
    State(state): State<AppState>,
    axum::extract::Extension(crate::middleware::AuthedSession(session_id)): axum::extract::Extension<
        crate::middleware::AuthedSession,
    >,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    Json(dispatch(&state, session_id, request).await)
}

/// `GET /v1/rpc/ws`: a persistent connection multiplexing many JSON-RPC
/// calls, one per text frame.
pub async fn rpc_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    axum::extract::Extension(crate::middleware::AuthedSession(session_id)): axum::extract::Extension<
        crate::middleware::AuthedSession,
    >,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_rpc_ws(socket, state, session_id))
}

async fn handle_rpc_ws(mut socket: WebSocket, state: AppState, session_id: SessionId) {
    while let Some(Ok(message)) = socket.recv().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let response = match serde_json::from_str::<JsonRpcRequest>(&text) {
            Ok(request) => dispatch(&state, session_id, request).await,
            Err(err) => error_response(None, -32700, format!("parse error: {err}")),
        };
        let encoded = serde_json::to_string(&response).expect("response always serializes");
        if socket.send(Message::Text(encoded)).await.is_err() {
            break;
        }
    }
}

/// Drives the JSON-RPC surface over stdin/stdout, one request per line,
/// for process-embedded integrations that would rather spawn the gateway
/// than speak HTTP to it.
pub async fn serve_stdio(state: Arc<AppState>, session_id: SessionId) {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "stdin read error, stopping rpc loop");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => dispatch(&state, session_id, request).await,
            Err(err) => error_response(None, -32700, format!("parse error: {err}")),
        };
        let mut encoded = serde_json::to_string(&response).expect("response always serializes");
        encoded.push('\n');
        if stdout.write_all(encoded.as_bytes()).await.is_err() {
            break;
        }
        let _ = stdout.flush().await;
        debug!("handled one stdio rpc request");
    }
}
