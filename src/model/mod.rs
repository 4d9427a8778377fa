pub mod fallback;
mod ollama;
mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Mcp2AiError, Result};
use crate::models::{Conversation, ModelTurn, ToolSchema};

pub use ollama::{parse_ollama_response, OllamaAdapter};
pub use openai::{normalize_chat_endpoint, parse_openai_response, OpenAiAdapter};

/// Inference framing spoken by the configured service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    #[default]
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

impl FromStr for Provider {
    type Err = Mcp2AiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama),
            "openai" => Ok(Provider::OpenAi),
            other => Err(Mcp2AiError::Config(format!(
                "unknown provider '{}' (expected 'ollama' or 'openai')",
                other
            ))),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Ollama => f.write_str("ollama"),
            Provider::OpenAi => f.write_str("openai"),
        }
    }
}

/// Everything an adapter needs to reach its inference service.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub provider: Provider,
    pub endpoint: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub timeout: Duration,
    pub api_key: Option<String>,
}

/// Normalizes one inference service into [`ModelTurn`]s. Adapters hold no
/// conversation state between calls.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, conversation: &Conversation, tools: &[ToolSchema])
        -> Result<ModelTurn>;

    /// Cheap reachability check used before the first query.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

pub fn build_adapter(settings: &ModelSettings) -> Result<Arc<dyn ModelAdapter>> {
    let adapter: Arc<dyn ModelAdapter> = match settings.provider {
        Provider::Ollama => Arc::new(OllamaAdapter::new(settings)?),
        Provider::OpenAi => Arc::new(OpenAiAdapter::new(settings)?),
    };
    Ok(adapter)
}

pub(crate) fn request_error(service: &str, endpoint: &str, err: reqwest::Error) -> Mcp2AiError {
    if err.is_timeout() {
        Mcp2AiError::InferenceUnavailable(format!("{} at {} timed out: {}", service, endpoint, err))
    } else if err.is_connect() {
        Mcp2AiError::InferenceUnavailable(format!(
            "cannot connect to {} at {}: {}",
            service, endpoint, err
        ))
    } else {
        Mcp2AiError::InferenceUnavailable(format!("{} request failed: {}", service, err))
    }
}

/// Strip a body down to something short enough for an error line.
pub(crate) fn excerpt(body: &str) -> String {
    const LIMIT: usize = 200;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Replacement for unreadable tool calls: the text if there is any,
/// otherwise the raw calls so the answer is never empty.
pub(crate) fn degrade(content: String, raw_calls: &Value) -> ModelTurn {
    if content.trim().is_empty() {
        ModelTurn::text(raw_calls.to_string())
    } else {
        ModelTurn::text(content)
    }
}

/// Keep the call's own id unless it is missing or already used in this
/// turn; otherwise take the first free `call_<n>` from `index + 1` upwards.
pub(crate) fn unique_call_id(index: usize, id: Option<&str>, seen: &mut HashSet<String>) -> String {
    let id = match id {
        Some(id) if !id.is_empty() && !seen.contains(id) => id.to_string(),
        _ => {
            let mut n = index + 1;
            loop {
                let candidate = format!("call_{}", n);
                if !seen.contains(&candidate) {
                    break candidate;
                }
                n += 1;
            }
        }
    };
    seen.insert(id.clone());
    id
}
