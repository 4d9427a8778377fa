//! Server side of the tool protocol: newline-delimited JSON-RPC 2.0 over a
//! pair of byte streams, normally stdin/stdout.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backend::types::{
    McpTool, McpToolCall, McpToolResult, ServerInfo, JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use crate::error::Result;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// A set of tools exposed over the protocol. Tool failures are reported
/// inside the returned result, not as protocol errors.
#[async_trait]
pub trait ToolService: Send + Sync {
    fn server_info(&self) -> ServerInfo;

    fn tools(&self) -> Vec<McpTool>;

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> McpToolResult;
}

pub async fn serve_stdio<S>(service: Arc<S>) -> Result<()>
where
    S: ToolService + 'static,
{
    serve(service, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Answer requests until `reader` reaches EOF, then wait for in-flight
/// calls to finish. Requests are handled concurrently; each response is
/// written as one line.
pub async fn serve<S, R, W>(service: Arc<S>, reader: R, writer: W) -> Result<()>
where
    S: ToolService + 'static,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Value>(64);

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(response) = rx.recv().await {
            let mut line = serde_json::to_string(&response)?;
            line.push('\n');
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
        }
        Ok::<(), crate::error::Mcp2AiError>(())
    });

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("request line is not valid UTF-8: {}", e);
                let response = error_response(Value::Null, PARSE_ERROR, "Parse error");
                if tx.send(response).await.is_err() {
                    warn!("response dropped: output stream closed");
                }
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let service = service.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(response) = handle_message(service.as_ref(), &line).await {
                if tx.send(response).await.is_err() {
                    warn!("response dropped: output stream closed");
                }
            }
        });
    }

    info!("input closed, shutting down");
    drop(tx);

    match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(crate::error::Mcp2AiError::Other(format!(
            "response writer failed: {}",
            e
        ))),
    }
}

/// Handle one incoming line. Returns the response to send, or `None` for
/// notifications and stray responses.
pub async fn handle_message<S>(service: &S, line: &str) -> Option<Value>
where
    S: ToolService + ?Sized,
{
    let message: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            warn!("unparseable request: {}", e);
            return Some(error_response(Value::Null, PARSE_ERROR, "Parse error"));
        }
    };

    let Some(method) = message.get("method").and_then(Value::as_str) else {
        if message.get("id").is_some() {
            debug!("ignoring response sent to the server");
            return None;
        }
        return Some(error_response(Value::Null, INVALID_REQUEST, "Invalid Request"));
    };

    let Some(id) = message.get("id").cloned() else {
        debug!(method, "notification received");
        return None;
    };

    let params = message.get("params").cloned().unwrap_or(Value::Null);
    debug!(method, "request received");

    let response = match method {
        "initialize" => {
            let server_info = service.server_info();
            success_response(
                id,
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {
                        "tools": { "listChanged": false }
                    },
                    "serverInfo": server_info,
                }),
            )
        }
        "ping" => success_response(id, json!({})),
        "tools/list" => {
            let tools = service.tools();
            info!(count = tools.len(), "listing tools");
            success_response(id, json!({ "tools": tools }))
        }
        "tools/call" => match serde_json::from_value::<McpToolCall>(params) {
            Ok(call) => {
                info!(tool = %call.name, "tool call received");
                let result = service.call_tool(&call.name, call.arguments).await;
                match serde_json::to_value(&result) {
                    Ok(result) => success_response(id, result),
                    Err(e) => error_response(id, INTERNAL_ERROR, &e.to_string()),
                }
            }
            Err(e) => error_response(id, INVALID_PARAMS, &format!("Invalid params: {}", e)),
        },
        other => {
            warn!(method = other, "unknown method");
            error_response(id, METHOD_NOT_FOUND, &format!("Method not found: {}", other))
        }
    };

    Some(response)
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": code,
            "message": message,
        }
    })
}
