//! JSON-RPC 2.0 over HTTP POST (§6): `{jsonrpc, method, params, id?}` in,
//! `{jsonrpc, result, id}` or `{jsonrpc, error:{code,message,data?}, id}`
//! out. One request per connection — no keep-alive, no batching.

use super::http::{read_request, write_response};
use crate::dispatcher::Dispatcher;
use claudebench_core::Error;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

#[derive(Deserialize)]
struct RpcRequest {
    method: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    id: Option<Value>,
}

#[derive(Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
    id: Value,
}

#[derive(Serialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// Serve JSON-RPC 2.0 POST requests on `addr` until the process exits.
pub async fn serve_jsonrpc(addr: SocketAddr, dispatcher: Arc<Dispatcher>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "json-rpc endpoint listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, dispatcher).await {
                tracing::debug!(%peer, %err, "json-rpc connection error");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, dispatcher: Arc<Dispatcher>) -> std::io::Result<()> {
    let Some(request) = read_request(&mut stream).await? else {
        return Ok(());
    };
    if request.method != "POST" {
        return write_response(&mut stream, 404, "text/plain", b"not found").await;
    }

    let actor = request.headers.get("x-instance-id").cloned();
    let response = match serde_json::from_slice::<RpcRequest>(&request.body) {
        Ok(rpc) => {
            let id = rpc.id.unwrap_or(Value::Null);
            match dispatcher.dispatch(&rpc.method, rpc.params, actor) {
                Ok(result) => RpcResponse {
                    jsonrpc: "2.0",
                    result: Some(result),
                    error: None,
                    id,
                },
                Err(err) => RpcResponse {
                    jsonrpc: "2.0",
                    result: None,
                    error: Some(to_rpc_error(&err)),
                    id,
                },
            }
        }
        Err(err) => RpcResponse {
            jsonrpc: "2.0",
            result: None,
            error: Some(RpcError {
                code: -32602,
                message: format!("malformed request: {err}"),
                data: None,
            }),
            id: Value::Null,
        },
    };

    let body = serde_json::to_vec(&response).unwrap_or_else(|_| b"{}".to_vec());
    write_response(&mut stream, 200, "application/json", &body).await
}

fn to_rpc_error(err: &Error) -> RpcError {
    let data = match err {
        Error::RateLimitExceeded { retry_after_ms, remaining, .. } => {
            Some(json!({ "retryAfter": retry_after_ms, "remaining": remaining }))
        }
        Error::CircuitOpen { fallback_returned, .. } => Some(json!({ "fallback": fallback_returned })),
        _ => None,
    };
    RpcError {
        code: err.json_rpc_code(),
        message: err.to_string(),
        data,
    }
}
