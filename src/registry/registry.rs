use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::builtins::BuiltinTool;
use super::validation;
use crate::backend::ToolBackend;
use crate::error::{Mcp2AiError, Result};
use crate::models::ToolSchema;

/// How a registered tool is executed.
#[derive(Clone)]
pub enum ToolHandler {
    /// Forwarded to a tool backend session.
    Backend(Arc<dyn ToolBackend>),
    /// Run in-process.
    Builtin(BuiltinTool),
}

impl fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolHandler::Backend(_) => f.write_str("Backend"),
            ToolHandler::Builtin(tool) => f.debug_tuple("Builtin").field(tool).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisteredTool {
    pub schema: ToolSchema,
    pub handler: ToolHandler,
}

/// Name-indexed tool table. Iteration order is registration order, which is
/// also the order tools are advertised to the model.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: ToolSchema, handler: ToolHandler) -> Result<()> {
        if self.tools.contains_key(&schema.name) {
            return Err(Mcp2AiError::DuplicateTool(schema.name));
        }

        self.tools
            .insert(schema.name.clone(), RegisteredTool { schema, handler });
        Ok(())
    }

    pub fn register_builtin_tools(&mut self) -> Result<()> {
        for tool in BuiltinTool::all() {
            self.register(tool.schema(), ToolHandler::Builtin(*tool))?;
        }
        Ok(())
    }

    /// Register every discovered schema against `backend`. Names that are
    /// already taken are skipped; their errors are returned so the caller
    /// can report them.
    pub fn register_backend_tools(
        &mut self,
        backend: Arc<dyn ToolBackend>,
        schemas: &[ToolSchema],
    ) -> Vec<Mcp2AiError> {
        let mut skipped = Vec::new();
        for schema in schemas {
            if let Err(e) = self.register(schema.clone(), ToolHandler::Backend(backend.clone())) {
                tracing::warn!(tool = %schema.name, "skipping discovered tool: {}", e);
                skipped.push(e);
            }
        }
        skipped
    }

    pub fn lookup(&self, name: &str) -> Result<&RegisteredTool> {
        self.tools
            .get(name)
            .ok_or_else(|| Mcp2AiError::UnknownTool(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema.clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn validate_arguments(&self, tool_name: &str, arguments: &Value) -> Result<()> {
        let tool = self.lookup(tool_name)?;
        validation::validate_arguments(&tool.schema.input_schema, arguments).map_err(|message| {
            Mcp2AiError::InvalidArguments {
                tool: tool_name.to_string(),
                message,
            }
        })
    }
}
