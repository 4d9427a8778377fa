use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::{
    degrade, excerpt, fallback, request_error, unique_call_id, ModelAdapter, ModelSettings,
};
use crate::error::{Mcp2AiError, Result};
use crate::models::{Conversation, Message, ModelTurn, Role, ToolCallRequest, ToolSchema};

const SERVICE: &str = "Ollama";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    function: WireFunctionCall,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunctionDef,
}

#[derive(Debug, Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

impl From<&ToolSchema> for WireTool {
    fn from(schema: &ToolSchema) -> Self {
        Self {
            tool_type: "function",
            function: WireFunctionDef {
                name: schema.name.clone(),
                description: schema.description.clone(),
                parameters: schema.input_schema.clone(),
            },
        }
    }
}

fn wire_message(message: &Message) -> WireMessage {
    match message.role {
        Role::User => WireMessage {
            role: "user",
            content: message.content.clone(),
            tool_calls: Vec::new(),
            tool_name: None,
        },
        Role::Assistant => WireMessage {
            role: "assistant",
            content: message.content.clone(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect(),
            tool_name: None,
        },
        Role::Tool => WireMessage {
            role: "tool",
            content: message.content.clone(),
            tool_calls: Vec::new(),
            tool_name: message.tool_name.clone(),
        },
    }
}

/// Client for a local Ollama server's `/api/chat` endpoint.
pub struct OllamaAdapter {
    client: reqwest::Client,
    base_url: String,
    model: String,
    system_prompt: Option<String>,
}

impl OllamaAdapter {
    pub fn new(settings: &ModelSettings) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(settings.timeout).build()?;

        Ok(Self {
            client,
            base_url: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            system_prompt: settings.system_prompt.clone(),
        })
    }

    fn build_request<'a>(
        &'a self,
        conversation: &Conversation,
        tools: &[ToolSchema],
    ) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        if let Some(system) = &self.system_prompt {
            messages.push(WireMessage {
                role: "system",
                content: system.clone(),
                tool_calls: Vec::new(),
                tool_name: None,
            });
        }
        messages.extend(conversation.iter().map(wire_message));

        ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            tools: tools.iter().map(WireTool::from).collect(),
        }
    }
}

#[async_trait]
impl ModelAdapter for OllamaAdapter {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, conversation: &Conversation, tools: &[ToolSchema]) -> Result<ModelTurn> {
        let url = format!("{}/api/chat", self.base_url);
        let request = self.build_request(conversation, tools);
        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending chat request to Ollama"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, &self.base_url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| request_error(SERVICE, &self.base_url, e))?;

        if status == StatusCode::NOT_FOUND {
            return Err(Mcp2AiError::InferenceUnavailable(format!(
                "model '{}' not found; try `ollama pull {}`",
                self.model, self.model
            )));
        }
        if !status.is_success() {
            return Err(Mcp2AiError::InferenceUnavailable(format!(
                "Ollama returned {}: {}",
                status,
                excerpt(&body)
            )));
        }

        parse_ollama_response(&body)
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, &self.base_url, e))?;

        if !response.status().is_success() {
            return Err(Mcp2AiError::InferenceUnavailable(format!(
                "Ollama health check returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Normalize a non-streaming `/api/chat` body into a [`ModelTurn`].
///
/// Only a body that is not JSON, or has no `message` object, is an error.
/// A `tool_calls` field that cannot be read degrades to text.
pub fn parse_ollama_response(body: &str) -> Result<ModelTurn> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| Mcp2AiError::MalformedModelOutput(format!("response is not JSON: {}", e)))?;

    let message = value
        .get("message")
        .and_then(Value::as_object)
        .ok_or_else(|| Mcp2AiError::MalformedModelOutput("response has no message object".into()))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match message.get("tool_calls") {
        None | Some(Value::Null) => Ok(lift_from_text(content)),
        Some(Value::Array(raw)) if raw.is_empty() => Ok(lift_from_text(content)),
        Some(Value::Array(raw)) => match parse_tool_calls(raw) {
            Ok(calls) => Ok(ModelTurn::with_tool_calls(content, calls)),
            Err(reason) => {
                warn!("discarding unreadable tool calls: {}", reason);
                Ok(degrade(content, &Value::Array(raw.clone())))
            }
        },
        Some(other) => {
            warn!("discarding tool_calls that are not a list");
            Ok(degrade(content, other))
        }
    }
}

fn lift_from_text(content: String) -> ModelTurn {
    if !content.contains("<tool_call>") {
        return ModelTurn::text(content);
    }
    let (text, calls) = fallback::lift_tagged_calls(&content);
    ModelTurn::with_tool_calls(text, calls)
}

/// Read every call or none. Ollama omits ids, so missing or repeated ones
/// are replaced with `call_<n>`.
fn parse_tool_calls(raw: &[Value]) -> std::result::Result<Vec<ToolCallRequest>, String> {
    let mut calls = Vec::with_capacity(raw.len());
    let mut seen = HashSet::new();

    for (index, entry) in raw.iter().enumerate() {
        let function = entry
            .get("function")
            .ok_or_else(|| format!("call {} has no function", index))?;

        let name = function
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| format!("call {} has no name", index))?;

        let arguments = arguments_map(function.get("arguments"))
            .ok_or_else(|| format!("call {} ({}) has unreadable arguments", index, name))?;

        let id = unique_call_id(index, entry.get("id").and_then(Value::as_str), &mut seen);

        calls.push(ToolCallRequest::new(id, name, arguments));
    }

    Ok(calls)
}

/// Arguments arrive as an object, but some models send a JSON string.
pub(crate) fn arguments_map(raw: Option<&Value>) -> Option<Map<String, Value>> {
    match raw {
        None | Some(Value::Null) => Some(Map::new()),
        Some(Value::Object(map)) => Some(map.clone()),
        Some(Value::String(text)) if text.trim().is_empty() => Some(Map::new()),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        Some(_) => None,
    }
}
