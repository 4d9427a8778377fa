pub mod session;
pub mod transport;
pub mod types;

use async_trait::async_trait;

use crate::models::{ToolCallRequest, ToolCallResult};

pub use session::{BackendSession, BackendSettings};
pub use transport::{ServerCommand, StdioTransport, Transport};

/// Something that executes tool calls. Failures come back inside the
/// result; implementations never error past this boundary and never retry.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn invoke(&self, call: &ToolCallRequest) -> ToolCallResult;
}
