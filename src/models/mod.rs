mod message;
mod tool;
mod turn;

pub use message::{Conversation, Message, Role};
pub use tool::{ToolCallRequest, ToolCallResult, ToolError, ToolErrorKind, ToolSchema};
pub use turn::ModelTurn;
