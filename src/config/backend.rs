use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::defaults::{
    default_call_timeout_secs, default_connect_timeout_secs, default_server_command,
};
use crate::retry::RetryPolicy;

/// The `backend` section: which tool server to launch and how long to wait
/// for it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_server_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Values may reference `${VAR}` from the client's environment.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default)]
    pub discover_retry: RetryPolicy,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: default_server_command(),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            connect_timeout_secs: default_connect_timeout_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            discover_retry: RetryPolicy::default(),
        }
    }
}
