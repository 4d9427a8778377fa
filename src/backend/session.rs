use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::transport::Transport;
use super::types::{
    InitializeResult, McpToolResult, ServerInfo, ToolListResponse, MCP_PROTOCOL_VERSION,
};
use super::ToolBackend;
use crate::error::{Mcp2AiError, Result};
use crate::models::{ToolCallRequest, ToolCallResult, ToolErrorKind, ToolSchema};
use crate::registry::validate_arguments;
use crate::retry::RetryPolicy;

const CLIENT_NAME: &str = "mcp2ai";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy)]
pub struct BackendSettings {
    /// Bound on the handshake and on each discovery attempt.
    pub connect_timeout: Duration,
    /// Bound on each `tools/call`.
    pub call_timeout: Duration,
    pub discover_retry: RetryPolicy,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
            discover_retry: RetryPolicy::none(),
        }
    }
}

/// A live connection to one tool backend.
///
/// The advertised schema set is held as an `Arc` snapshot: `discover`
/// swaps in a new one, and every `invoke` validates against whichever
/// snapshot was current when it started.
pub struct BackendSession<T: Transport> {
    transport: T,
    settings: BackendSettings,
    schemas: RwLock<Arc<Vec<ToolSchema>>>,
    server_info: ServerInfo,
}

impl<T: Transport> BackendSession<T> {
    /// Perform the `initialize` handshake.
    pub async fn connect(transport: T, settings: BackendSettings) -> Result<Self> {
        let init_params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "clientInfo": {
                "name": CLIENT_NAME,
                "version": CLIENT_VERSION
            }
        });

        let response = timeout(
            settings.connect_timeout,
            transport.request("initialize", init_params),
        )
        .await
        .map_err(|_| {
            Mcp2AiError::BackendUnavailable(format!(
                "no initialize response within {:?}",
                settings.connect_timeout
            ))
        })?
        .map_err(|e| Mcp2AiError::BackendUnavailable(format!("initialize failed: {}", e)))?;

        let init_result: InitializeResult = serde_json::from_value(response)
            .map_err(|e| Mcp2AiError::Protocol(format!("invalid initialize result: {}", e)))?;

        info!(
            server = %init_result.server_info.name,
            version = %init_result.server_info.version,
            protocol = %init_result.protocol_version,
            "connected to tool backend"
        );

        transport
            .notify("notifications/initialized", json!({}))
            .await?;

        Ok(Self {
            transport,
            settings,
            schemas: RwLock::new(Arc::new(Vec::new())),
            server_info: init_result.server_info,
        })
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Query the backend for its tools and replace the advertised set.
    /// Safe to call repeatedly.
    pub async fn discover(&self) -> Result<Vec<ToolSchema>> {
        let policy = self.settings.discover_retry;
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.list_tools_once().await {
                Ok(schemas) => {
                    info!(count = schemas.len(), "discovered backend tools");
                    *self.schemas.write().await = Arc::new(schemas.clone());
                    return Ok(schemas);
                }
                Err(e) if policy.allows_retry(attempts) => {
                    let delay = policy.delay_for(attempts);
                    warn!(
                        attempt = attempts,
                        "tool discovery failed, retrying in {:?}: {}", delay, e
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn list_tools_once(&self) -> Result<Vec<ToolSchema>> {
        let response = timeout(
            self.settings.connect_timeout,
            self.transport.request("tools/list", json!({})),
        )
        .await
        .map_err(|_| {
            Mcp2AiError::BackendUnavailable(format!(
                "no tools/list response within {:?}",
                self.settings.connect_timeout
            ))
        })?
        .map_err(|e| match e {
            Mcp2AiError::BackendUnavailable(_) => e,
            other => Mcp2AiError::BackendUnavailable(other.to_string()),
        })?;

        let tool_list: ToolListResponse = serde_json::from_value(response)
            .map_err(|e| Mcp2AiError::Protocol(format!("invalid tools/list result: {}", e)))?;

        Ok(tool_list.tools.into_iter().map(ToolSchema::from).collect())
    }

    /// Stable snapshot of the advertised schema set.
    pub async fn schemas(&self) -> Arc<Vec<ToolSchema>> {
        self.schemas.read().await.clone()
    }

    pub async fn shutdown(&self) -> Result<()> {
        info!("shutting down tool backend");
        self.transport.close().await
    }
}

#[async_trait]
impl<T: Transport + 'static> ToolBackend for BackendSession<T> {
    async fn invoke(&self, call: &ToolCallRequest) -> ToolCallResult {
        let snapshot = self.schemas().await;

        let Some(schema) = snapshot.iter().find(|s| s.name == call.name) else {
            return ToolCallResult::failure(
                &call.id,
                ToolErrorKind::UnknownTool,
                format!("Tool '{}' is not offered by the backend", call.name),
            );
        };

        if let Err(message) = validate_arguments(&schema.input_schema, &call.arguments_value()) {
            debug!(tool = %call.name, "rejected arguments before dispatch: {}", message);
            return ToolCallResult::failure(&call.id, ToolErrorKind::InvalidArguments, message);
        }

        let params = json!({
            "name": call.name,
            "arguments": call.arguments,
        });

        match timeout(
            self.settings.call_timeout,
            self.transport.request("tools/call", params),
        )
        .await
        {
            Err(_) => ToolCallResult::failure(
                &call.id,
                ToolErrorKind::BackendInvocation,
                format!(
                    "Tool '{}' execution timed out after {:?}",
                    call.name, self.settings.call_timeout
                ),
            ),
            Ok(Err(Mcp2AiError::BackendUnavailable(message))) => ToolCallResult::failure(
                &call.id,
                ToolErrorKind::BackendUnavailable,
                format!("Tool '{}' backend unavailable: {}", call.name, message),
            ),
            Ok(Err(e)) => ToolCallResult::failure(
                &call.id,
                ToolErrorKind::BackendInvocation,
                format!("Tool '{}' execution failed: {}", call.name, e),
            ),
            Ok(Ok(response)) => match serde_json::from_value::<McpToolResult>(response) {
                Ok(result) => result.into_call_result(&call.id),
                Err(e) => ToolCallResult::failure(
                    &call.id,
                    ToolErrorKind::BackendInvocation,
                    format!("unexpected tools/call result: {}", e),
                ),
            },
        }
    }
}
