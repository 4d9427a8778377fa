use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::ollama::{arguments_map, WireTool};
use super::{
    degrade, excerpt, fallback, request_error, unique_call_id, ModelAdapter, ModelSettings,
};
use crate::error::{Mcp2AiError, Result};
use crate::models::{Conversation, Message, ModelTurn, Role, ToolCallRequest, ToolSchema};

const SERVICE: &str = "inference API";

/// Client for an OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAiAdapter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    system_prompt: Option<String>,
}

impl OpenAiAdapter {
    pub fn new(settings: &ModelSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &settings.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e| {
                    Mcp2AiError::Config(format!("Invalid authorization header: {}", e))
                })?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: normalize_chat_endpoint(&settings.endpoint),
            model: settings.model.clone(),
            system_prompt: settings.system_prompt.clone(),
        })
    }

    fn build_request(&self, conversation: &Conversation, tools: &[ToolSchema]) -> Value {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        if let Some(system) = &self.system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.extend(conversation.iter().map(wire_message));

        let mut request = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });
        if !tools.is_empty() {
            let tools: Vec<WireTool> = tools.iter().map(WireTool::from).collect();
            request["tools"] = json!(tools);
        }
        request
    }

    fn models_url(&self) -> String {
        let base = self
            .endpoint
            .strip_suffix("/chat/completions")
            .unwrap_or(&self.endpoint);
        format!("{}/models", base)
    }
}

fn wire_message(message: &Message) -> Value {
    match message.role {
        Role::User => json!({ "role": "user", "content": message.content }),
        Role::Assistant if message.tool_calls.is_empty() => {
            json!({ "role": "assistant", "content": message.content })
        }
        Role::Assistant => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments_value().to_string(),
                        }
                    })
                })
                .collect();
            json!({
                "role": "assistant",
                "content": if message.content.is_empty() { Value::Null } else { json!(message.content) },
                "tool_calls": calls,
            })
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id,
            "content": message.content,
        }),
    }
}

/// Accept a base URL, a `/v1` URL or a full `chat/completions` URL.
pub fn normalize_chat_endpoint(endpoint: &str) -> String {
    if endpoint.ends_with("/chat/completions") {
        endpoint.to_string()
    } else if endpoint.ends_with("/v1") {
        format!("{}/chat/completions", endpoint)
    } else if endpoint.ends_with("/v1/") {
        format!("{}chat/completions", endpoint)
    } else {
        format!("{}/v1/chat/completions", endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, conversation: &Conversation, tools: &[ToolSchema]) -> Result<ModelTurn> {
        let request = self.build_request(conversation, tools);
        debug!(model = %self.model, endpoint = %self.endpoint, "sending chat completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, &self.endpoint, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| request_error(SERVICE, &self.endpoint, e))?;

        if !status.is_success() {
            return Err(Mcp2AiError::InferenceUnavailable(format!(
                "{} returned {}: {}",
                self.endpoint,
                status,
                excerpt(&body)
            )));
        }

        parse_openai_response(&body)
    }

    async fn ping(&self) -> Result<()> {
        let url = self.models_url();
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, &url, e))?;

        if !response.status().is_success() {
            return Err(Mcp2AiError::InferenceUnavailable(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        Ok(())
    }
}

/// Normalize a non-streaming `chat/completions` body into a [`ModelTurn`].
pub fn parse_openai_response(body: &str) -> Result<ModelTurn> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| Mcp2AiError::MalformedModelOutput(format!("response is not JSON: {}", e)))?;

    let message = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(Value::as_object)
        .ok_or_else(|| Mcp2AiError::MalformedModelOutput("No message in response".into()))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let raw_calls = match message.get("tool_calls") {
        Some(Value::Array(raw)) if !raw.is_empty() => raw,
        Some(Value::Array(_)) | Some(Value::Null) | None => {
            if content.contains("<tool_call>") {
                let (text, calls) = fallback::lift_tagged_calls(&content);
                return Ok(ModelTurn::with_tool_calls(text, calls));
            }
            return Ok(ModelTurn::text(content));
        }
        Some(other) => {
            warn!("discarding tool_calls that are not a list");
            return Ok(degrade(content, other));
        }
    };

    let mut calls = Vec::with_capacity(raw_calls.len());
    let mut seen = HashSet::new();
    for (index, entry) in raw_calls.iter().enumerate() {
        let function = entry.get("function");
        let name = function
            .and_then(|f| f.get("name"))
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty());
        let arguments = function.and_then(|f| arguments_map(f.get("arguments")));

        match (name, arguments) {
            (Some(name), Some(arguments)) => {
                let id = unique_call_id(index, entry.get("id").and_then(Value::as_str), &mut seen);
                calls.push(ToolCallRequest::new(id, name.trim(), arguments));
            }
            _ => {
                warn!("discarding unreadable tool call at position {}", index);
                return Ok(degrade(content, &Value::Array(raw_calls.clone())));
            }
        }
    }

    Ok(ModelTurn::with_tool_calls(content, calls))
}
