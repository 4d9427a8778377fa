use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// A tool as advertised to the model: name, description and the JSON schema
/// its arguments must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    UnknownTool,
    InvalidArguments,
    BackendUnavailable,
    BackendInvocation,
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ToolErrorKind::UnknownTool => "unknown_tool",
            ToolErrorKind::InvalidArguments => "invalid_arguments",
            ToolErrorKind::BackendUnavailable => "backend_unavailable",
            ToolErrorKind::BackendInvocation => "backend_invocation",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Terminal outcome of one tool call. Failures are carried as data so the
/// conversation can always continue.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallResult {
    pub call_id: String,
    pub outcome: Result<Value, ToolError>,
}

impl ToolCallResult {
    pub fn success(call_id: impl Into<String>, content: Value) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: Ok(content),
        }
    }

    pub fn failure(call_id: impl Into<String>, kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: Err(ToolError::new(kind, message)),
        }
    }

    pub fn content(&self) -> Option<&Value> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ToolError> {
        self.outcome.as_ref().err()
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    /// Text placed in the `tool` message. Plain string payloads are passed
    /// through; everything else is serialized as JSON.
    pub fn to_message_content(&self) -> String {
        match &self.outcome {
            Ok(Value::String(text)) => text.clone(),
            Ok(other) => other.to_string(),
            Err(error) => json!({
                "error": {
                    "kind": error.kind,
                    "message": error.message,
                }
            })
            .to_string(),
        }
    }
}
