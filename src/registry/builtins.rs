use serde_json::{json, Map, Value};

use crate::models::ToolSchema;

/// Tools executed in-process. Adding one means adding a variant here and
/// registering it in [`BuiltinTool::all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinTool {
    TimeNow,
}

impl BuiltinTool {
    pub fn all() -> &'static [BuiltinTool] {
        &[BuiltinTool::TimeNow]
    }

    pub fn schema(&self) -> ToolSchema {
        match self {
            BuiltinTool::TimeNow => ToolSchema::new(
                "time_now",
                "Get the current date and time in ISO-8601 format.",
                json!({
                    "type": "object",
                    "properties": {},
                    "additionalProperties": false
                }),
            ),
        }
    }

    pub async fn run(&self, _arguments: &Map<String, Value>) -> Result<Value, String> {
        match self {
            BuiltinTool::TimeNow => Ok(Value::String(chrono::Utc::now().to_rfc3339())),
        }
    }
}
