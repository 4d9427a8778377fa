mod backend;
pub mod defaults;
mod model;
mod orchestrator;
mod validation;

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::{BackendSettings, ServerCommand};
use crate::cli::{parse_server_spec, split_list, Args};
use crate::error::{Mcp2AiError, Result};
use crate::model::{ModelSettings, Provider};
use crate::orchestrator::OrchestratorConfig;

pub use backend::BackendConfig;
pub use defaults::{default_endpoint, default_model};
pub use model::ModelConfig;
pub use orchestrator::{LocalToolsConfig, LoopConfig};
pub use validation::{expand_env_var_in_string, expand_env_var_in_string_with, expand_env_vars};

pub const LOCAL_CONFIG_FILE: &str = ".mcp2ai.yaml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub verbose: Option<bool>,
}

/// On-disk configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JsonConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub orchestrator: LoopConfig,
    #[serde(default)]
    pub local_tools: LocalToolsConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Fully resolved settings for one client process.
#[derive(Debug, Clone)]
pub struct Config {
    pub model: ModelSettings,
    pub server: ServerCommand,
    pub backend: BackendSettings,
    pub orchestrator: OrchestratorConfig,
    pub tools_enabled: bool,
    pub local_tools_enabled: bool,
    pub verbose: bool,
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

impl Config {
    pub fn from_env_and_args(args: &Args) -> Result<Self> {
        let json_config =
            JsonConfig::load().map_err(|e| Mcp2AiError::Config(format!("{:#}", e)))?;
        Self::resolve(args, json_config, |name| env::var(name).ok())
    }

    /// Layer CLI args over environment over file over defaults. `env` is
    /// the variable lookup, so callers can resolve against a fixed set.
    pub fn resolve<F>(args: &Args, json_config: JsonConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        // Provider: CLI args > env var > config file > default
        let provider = match args.provider.clone().or_else(|| var("AI_PROVIDER")) {
            Some(raw) => raw.parse::<Provider>()?,
            None => json_config.model.provider.unwrap_or_default(),
        };

        // Endpoint: CLI args > env var > config file > provider default
        let ollama_only = |name: &str| {
            if provider == Provider::Ollama {
                var(name)
            } else {
                None
            }
        };
        let endpoint = args
            .api_endpoint
            .clone()
            .or_else(|| var("AI_API_ENDPOINT"))
            .or_else(|| ollama_only("OLLAMA_BASE_URL"))
            .or(json_config.model.endpoint.clone())
            .unwrap_or_else(|| default_endpoint(provider).to_string());

        let model = args
            .model
            .clone()
            .or_else(|| var("AI_MODEL"))
            .or_else(|| ollama_only("OLLAMA_MODEL"))
            .or(json_config.model.model.clone())
            .unwrap_or_else(|| default_model(provider).to_string());

        let system_prompt = var("AI_SYSTEM_PROMPT").or(json_config.model.system_prompt.clone());

        // Credentials only ever come from the environment
        let api_key = var("OPENAI_API_KEY");

        let max_iterations = match args.max_iterations {
            Some(n) => n,
            None => match var("AI_MAX_ITERATIONS") {
                Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                    Mcp2AiError::Config(format!("AI_MAX_ITERATIONS must be a number, got '{}'", raw))
                })?,
                None => json_config.orchestrator.max_iterations,
            },
        };

        let verbose = args.verbose
            || var("AI_VERBOSE").map(|v| is_truthy(&v)).unwrap_or(false)
            || json_config.session.verbose.unwrap_or(false);

        let server = Self::resolve_server(args, &json_config.backend, &var, verbose)?;

        let config = Config {
            model: ModelSettings {
                provider,
                endpoint,
                model,
                system_prompt,
                timeout: Duration::from_secs(json_config.model.timeout_secs),
                api_key,
            },
            server,
            backend: BackendSettings {
                connect_timeout: Duration::from_secs(json_config.backend.connect_timeout_secs),
                call_timeout: Duration::from_secs(json_config.backend.call_timeout_secs),
                discover_retry: json_config.backend.discover_retry,
            },
            orchestrator: OrchestratorConfig {
                max_iterations,
                max_concurrency: json_config.orchestrator.max_concurrency,
                model_retry: json_config.model.retry,
                local_tool_timeout: Duration::from_secs(
                    json_config.orchestrator.local_tool_timeout_secs,
                ),
                ..OrchestratorConfig::default()
            },
            tools_enabled: !args.no_tools,
            local_tools_enabled: json_config.local_tools.enabled,
            verbose,
        };

        config.validate()?;
        Ok(config)
    }

    fn resolve_server<F>(
        args: &Args,
        backend: &BackendConfig,
        var: &F,
        verbose: bool,
    ) -> Result<ServerCommand>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (command, server_args) = if let Some(spec) = &args.mcp_server {
            parse_server_spec(spec).ok_or_else(|| {
                Mcp2AiError::Config(format!(
                    "invalid --mcp-server '{}' (expected command:arg1,arg2)",
                    spec
                ))
            })?
        } else if let Some(command) = var("MCP_SERVER_COMMAND") {
            let server_args = var("MCP_SERVER_ARGS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default();
            (command, server_args)
        } else {
            let server_args = var("MCP_SERVER_ARGS")
                .map(|raw| split_list(&raw))
                .unwrap_or_else(|| backend.args.clone());
            (backend.command.clone(), server_args)
        };

        let cwd = var("MCP_SERVER_PATH")
            .or_else(|| backend.cwd.clone())
            .map(PathBuf::from);

        Ok(ServerCommand {
            command,
            args: server_args,
            cwd,
            env: expand_env_vars(&backend.env, |name| var(name)),
            inherit_stderr: verbose,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.max_iterations == 0 {
            return Err(Mcp2AiError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.orchestrator.max_concurrency == 0 {
            return Err(Mcp2AiError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.model.model.trim().is_empty() {
            return Err(Mcp2AiError::Config("model name is empty".to_string()));
        }
        if self.server.command.trim().is_empty() {
            return Err(Mcp2AiError::Config(
                "backend command is empty".to_string(),
            ));
        }
        if self.model.provider == Provider::OpenAi && self.model.api_key.is_none() {
            return Err(Mcp2AiError::Config(
                "OPENAI_API_KEY environment variable not set".to_string(),
            ));
        }
        Ok(())
    }

    /// Write the example configuration to `path`, never replacing a file.
    pub fn init_file(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(Mcp2AiError::Config(format!(
                "{} already exists; not overwriting",
                path.display()
            )));
        }
        fs::write(path, EXAMPLE_CONFIG)?;
        Ok(())
    }
}

impl JsonConfig {
    pub fn load() -> AnyResult<Self> {
        for path in Self::get_config_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        // No config file found, return default
        Ok(JsonConfig::default())
    }

    pub fn load_from(path: &Path) -> AnyResult<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|s| s.to_str());
        let config = if matches!(extension, Some("yaml") | Some("yml")) {
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config file: {}", path.display()))?
        } else {
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config file: {}", path.display()))?
        };

        Ok(config)
    }

    pub fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            // Current directory (local override)
            PathBuf::from(".mcp2ai.yaml"),
            PathBuf::from(".mcp2ai.yml"),
            PathBuf::from(".mcp2ai.json"),
        ];

        if let Some(home_dir) = dirs::home_dir() {
            let config_dir = home_dir.join(".config").join("mcp2ai");
            paths.push(config_dir.join("mcp2ai.yaml"));
            paths.push(config_dir.join("mcp2ai.yml"));
            paths.push(config_dir.join("mcp2ai.json"));
        }

        paths
    }
}

pub const EXAMPLE_CONFIG: &str = r#"# mcp2ai configuration
# Precedence: command-line flags > environment variables > this file > defaults.

model:
  provider: ollama            # ollama | openai
  endpoint: http://localhost:11434
  model: qwen2.5:7b
  # system_prompt: "You are a helpful assistant."
  timeout_secs: 120
  retry:
    max_attempts: 1
    initial_backoff_ms: 500
    multiplier: 2.0
    max_backoff_ms: 5000

backend:
  command: weather-mcp
  args: []
  # cwd: /path/to/server
  env:
    OPENWEATHERMAP_API_KEY: ${OPENWEATHERMAP_API_KEY}
  connect_timeout_secs: 10
  call_timeout_secs: 30
  discover_retry:
    max_attempts: 3
    initial_backoff_ms: 500

orchestrator:
  max_iterations: 5
  max_concurrency: 4
  local_tool_timeout_secs: 10

local_tools:
  enabled: true

session:
  verbose: false
"#;
