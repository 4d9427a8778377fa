use crate::model::Provider;

pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:7b";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SERVER_COMMAND: &str = "weather-mcp";

pub fn default_endpoint(provider: Provider) -> &'static str {
    match provider {
        Provider::Ollama => DEFAULT_OLLAMA_ENDPOINT,
        Provider::OpenAi => DEFAULT_OPENAI_ENDPOINT,
    }
}

pub fn default_model(provider: Provider) -> &'static str {
    match provider {
        Provider::Ollama => DEFAULT_OLLAMA_MODEL,
        Provider::OpenAi => DEFAULT_OPENAI_MODEL,
    }
}

pub fn default_model_timeout_secs() -> u64 {
    120 // local models can be slow to load
}

pub fn default_server_command() -> String {
    DEFAULT_SERVER_COMMAND.to_string()
}

pub fn default_connect_timeout_secs() -> u64 {
    10
}

pub fn default_call_timeout_secs() -> u64 {
    30
}

pub fn default_max_iterations() -> u32 {
    5
}

pub fn default_max_concurrency() -> usize {
    4
}

pub fn default_local_tool_timeout_secs() -> u64 {
    10
}

pub fn default_local_tools_enabled() -> bool {
    true
}

pub fn default_max_attempts() -> u32 {
    1
}

pub fn default_initial_backoff_ms() -> u64 {
    500
}

pub fn default_backoff_multiplier() -> f64 {
    2.0
}

pub fn default_max_backoff_ms() -> u64 {
    5_000
}
