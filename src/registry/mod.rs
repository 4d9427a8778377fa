mod builtins;
mod registry;
mod validation;

pub use builtins::BuiltinTool;
pub use registry::{RegisteredTool, ToolHandler, ToolRegistry};
pub use validation::validate_arguments;
