use serde::{Deserialize, Serialize};

use crate::config::defaults::default_model_timeout_secs;
use crate::model::Provider;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: None,
            endpoint: None,
            model: None,
            system_prompt: None,
            timeout_secs: default_model_timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }
}
