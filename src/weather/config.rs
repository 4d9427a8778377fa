use std::time::Duration;

use crate::error::{Mcp2AiError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Clone)]
pub struct WeatherSettings {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

// The key stays out of debug output.
impl std::fmt::Debug for WeatherSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherSettings")
            .field("api_key", &"<hidden>")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl WeatherSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENWEATHERMAP_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                Mcp2AiError::Config("OPENWEATHERMAP_API_KEY environment variable not set".into())
            })?;

        let base_url = lookup("OPENWEATHERMAP_BASE_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let request_timeout = match lookup("REQUEST_TIMEOUT") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                Mcp2AiError::Config(format!("REQUEST_TIMEOUT must be a number of seconds, got '{}'", raw))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(request_timeout),
        })
    }

    pub fn weather_api_url(&self) -> String {
        format!("{}/weather", self.base_url)
    }
}
