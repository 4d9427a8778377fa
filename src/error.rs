use thiserror::Error;

#[derive(Debug, Error)]
pub enum Mcp2AiError {
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Tool '{0}' not found")]
    UnknownTool(String),

    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Tool backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Inference service unavailable: {0}")]
    InferenceUnavailable(String),

    #[error("Malformed model output: {0}")]
    MalformedModelOutput(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Mcp2AiError {
    fn from(err: anyhow::Error) -> Self {
        Mcp2AiError::Other(format!("{:#}", err))
    }
}

impl From<String> for Mcp2AiError {
    fn from(msg: String) -> Self {
        Mcp2AiError::Other(msg)
    }
}

impl From<&str> for Mcp2AiError {
    fn from(msg: &str) -> Self {
        Mcp2AiError::Other(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Mcp2AiError>;
