use serde::{Deserialize, Serialize};

use crate::config::defaults::{
    default_local_tool_timeout_secs, default_local_tools_enabled, default_max_concurrency,
    default_max_iterations,
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoopConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_local_tool_timeout_secs")]
    pub local_tool_timeout_secs: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_concurrency: default_max_concurrency(),
            local_tool_timeout_secs: default_local_tool_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalToolsConfig {
    #[serde(default = "default_local_tools_enabled")]
    pub enabled: bool,
}

impl Default for LocalToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_local_tools_enabled(),
        }
    }
}
