//! MCP server over stdio: line-delimited JSON-RPC 2.0.
//!
//! Requests are handled concurrently. Each line read from the input becomes
//! an in-flight future; responses are written in completion order. On EOF
//! the server stops reading and returns once every in-flight call is done.

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::backend::Backend;
use crate::error::LxdMcpError;
use crate::tools;

pub const SERVER_NAME: &str = "lxd-mcp-server";
const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
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

impl JsonRpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Wrap a tool report as a call result.
fn tool_result(text: String, is_error: bool) -> Value {
    let mut result = json!({ "content": [{ "type": "text", "text": text }] });
    if is_error {
        result["isError"] = Value::Bool(true);
    }
    result
}

/// Handle one request. Notifications (no `id`) produce no response.
pub async fn handle_request<B: Backend>(backend: &B, req: JsonRpcRequest) -> Option<JsonRpcResponse> {
    let Some(id) = req.id else {
        match req.method.as_str() {
            "notifications/initialized" => tracing::info!("client initialized"),
            other => tracing::debug!(method = other, "ignoring notification"),
        }
        return None;
    };

    let response = match req.method.as_str() {
        "initialize" => JsonRpcResponse::result(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": { "tools": {} },
            }),
        ),
        "ping" => JsonRpcResponse::result(id, json!({})),
        "tools/list" => JsonRpcResponse::result(id, json!({ "tools": tools::definitions() })),
        "tools/call" => {
            let params = req.params.unwrap_or(Value::Null);
            let Some(name) = params.get("name").and_then(Value::as_str) else {
                return Some(JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    "tools/call requires a tool name",
                ));
            };
            let args = params.get("arguments").cloned().unwrap_or(Value::Null);

            let result = match tools::call(backend, name, args).await {
                Ok(text) => tool_result(text, false),
                Err(e) => {
                    tracing::warn!(tool = name, "tool failed: {e}");
                    tool_result(e.to_string(), true)
                }
            };
            JsonRpcResponse::result(id, result)
        }
        other => JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
    };
    Some(response)
}

async fn handle_line<B: Backend>(backend: &B, line: String) -> Option<JsonRpcResponse> {
    match serde_json::from_str::<JsonRpcRequest>(&line) {
        Ok(req) => {
            if req.jsonrpc != "2.0" {
                tracing::debug!(version = %req.jsonrpc, "unexpected jsonrpc version");
            }
            tracing::debug!(method = %req.method, id = ?req.id, "request");
            handle_request(backend, req).await
        }
        Err(e) => {
            tracing::warn!("unparseable request: {e}");
            Some(JsonRpcResponse::error(
                Value::Null,
                PARSE_ERROR,
                format!("Parse error: {e}"),
            ))
        }
    }
}

async fn write_response<W: AsyncWrite + Unpin>(
    output: &mut W,
    response: &JsonRpcResponse,
) -> Result<(), LxdMcpError> {
    let mut line = serde_json::to_vec(response).map_err(|e| LxdMcpError::Io {
        context: "failed to encode response".into(),
        source: std::io::Error::other(e),
    })?;
    line.push(b'\n');
    output
        .write_all(&line)
        .await
        .map_err(|source| LxdMcpError::Io {
            context: "failed to write response".into(),
            source,
        })?;
    output.flush().await.map_err(|source| LxdMcpError::Io {
        context: "failed to flush response".into(),
        source,
    })
}

/// Serve requests from `input` until EOF, writing responses to `output`.
pub async fn serve<B, R, W>(backend: &B, input: R, mut output: W) -> Result<(), LxdMcpError>
where
    B: Backend,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut in_flight = FuturesUnordered::new();
    let mut reading = true;

    tracing::info!("serving on stdio");
    loop {
        tokio::select! {
            line = lines.next_line(), if reading => {
                match line.map_err(|source| LxdMcpError::Io {
                    context: "failed to read request".into(),
                    source,
                })? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => in_flight.push(handle_line(backend, line)),
                    None => {
                        tracing::debug!(pending = in_flight.len(), "input closed");
                        reading = false;
                    }
                }
            }
            Some(response) = in_flight.next(), if !in_flight.is_empty() => {
                if let Some(response) = response {
                    write_response(&mut output, &response).await?;
                }
            }
            else => break,
        }
    }

    tracing::info!("input closed, server stopped");
    Ok(())
}
