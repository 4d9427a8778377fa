use mcp2ai::cli::{is_exit_command, parse_server_spec, Args};
use mcp2ai::config::{expand_env_var_in_string_with, Config, JsonConfig, EXAMPLE_CONFIG};
use mcp2ai::error::Mcp2AiError;
use mcp2ai::model::Provider;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::{Builder, NamedTempFile, TempDir};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

fn temp_file(suffix: &str) -> NamedTempFile {
    Builder::new().suffix(suffix).tempfile().unwrap()
}

fn resolve(args: &Args, json: JsonConfig, pairs: &[(&str, &str)]) -> Config {
    Config::resolve(args, json, env_from(pairs)).unwrap()
}

#[test]
fn test_defaults_without_any_input() {
    let config = resolve(&Args::default(), JsonConfig::default(), &[]);

    assert_eq!(config.model.provider, Provider::Ollama);
    assert_eq!(config.model.endpoint, "http://localhost:11434");
    assert_eq!(config.model.model, "qwen2.5:7b");
    assert_eq!(config.model.timeout, Duration::from_secs(120));
    assert!(config.model.api_key.is_none());
    assert_eq!(config.server.command, "weather-mcp");
    assert!(config.server.args.is_empty());
    assert_eq!(config.orchestrator.max_iterations, 5);
    assert_eq!(config.orchestrator.max_concurrency, 4);
    assert_eq!(config.backend.connect_timeout, Duration::from_secs(10));
    assert_eq!(config.backend.call_timeout, Duration::from_secs(30));
    assert!(config.tools_enabled);
    assert!(config.local_tools_enabled);
    assert!(!config.verbose);
}

#[test]
fn test_env_overrides_file_and_args_override_env() {
    let mut json = JsonConfig::default();
    json.model.model = Some("llama3.1:8b".to_string());
    json.orchestrator.max_iterations = 3;

    let config = resolve(
        &Args::default(),
        json.clone(),
        &[("OLLAMA_MODEL", "mistral:7b"), ("AI_MAX_ITERATIONS", "7")],
    );
    assert_eq!(config.model.model, "mistral:7b");
    assert_eq!(config.orchestrator.max_iterations, 7);

    let args = Args {
        model: Some("qwen2.5:14b".to_string()),
        max_iterations: Some(2),
        ..Args::default()
    };
    let config = resolve(
        &args,
        json.clone(),
        &[("OLLAMA_MODEL", "mistral:7b"), ("AI_MAX_ITERATIONS", "7")],
    );
    assert_eq!(config.model.model, "qwen2.5:14b");
    assert_eq!(config.orchestrator.max_iterations, 2);

    let config = resolve(&Args::default(), json, &[]);
    assert_eq!(config.model.model, "llama3.1:8b");
    assert_eq!(config.orchestrator.max_iterations, 3);
}

#[test]
fn test_blank_env_values_are_ignored() {
    let config = resolve(
        &Args::default(),
        JsonConfig::default(),
        &[("OLLAMA_BASE_URL", "  "), ("AI_MODEL", "")],
    );
    assert_eq!(config.model.endpoint, "http://localhost:11434");
    assert_eq!(config.model.model, "qwen2.5:7b");
}

#[test]
fn test_openai_provider_defaults_and_key() {
    let config = resolve(
        &Args::default(),
        JsonConfig::default(),
        &[
            ("AI_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OLLAMA_MODEL", "ignored:1b"),
        ],
    );
    assert_eq!(config.model.provider, Provider::OpenAi);
    assert_eq!(config.model.endpoint, "https://api.openai.com/v1");
    assert_eq!(config.model.model, "gpt-4o-mini");
    assert_eq!(config.model.api_key.as_deref(), Some("sk-test"));
}

#[test]
fn test_openai_without_key_is_rejected() {
    let args = Args {
        provider: Some("openai".to_string()),
        ..Args::default()
    };
    let err = Config::resolve(&args, JsonConfig::default(), env_from(&[])).unwrap_err();
    match err {
        Mcp2AiError::Config(message) => {
            assert_eq!(message, "OPENAI_API_KEY environment variable not set")
        }
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn test_invalid_values_are_config_errors() {
    let cases: Vec<(Args, Vec<(&str, &str)>)> = vec![
        (Args::default(), vec![("AI_MAX_ITERATIONS", "many")]),
        (
            Args {
                max_iterations: Some(0),
                ..Args::default()
            },
            vec![],
        ),
        (
            Args {
                provider: Some("anthropic".to_string()),
                ..Args::default()
            },
            vec![],
        ),
        (
            Args {
                mcp_server: Some(":--flag".to_string()),
                ..Args::default()
            },
            vec![],
        ),
    ];

    for (args, pairs) in cases {
        let result = Config::resolve(&args, JsonConfig::default(), env_from(&pairs));
        assert!(
            matches!(result, Err(Mcp2AiError::Config(_))),
            "expected Config error for {:?} / {:?}",
            args,
            pairs
        );
    }
}

#[test]
fn test_server_command_layering() {
    let mut json = JsonConfig::default();
    json.backend.command = "python".to_string();
    json.backend.args = vec!["server.py".to_string()];
    json.backend.cwd = Some("/srv/file".to_string());
    json.backend
        .env
        .insert("OPENWEATHERMAP_API_KEY".to_string(), "${OWM_KEY}".to_string());

    let config = resolve(&Args::default(), json.clone(), &[("OWM_KEY", "secret")]);
    assert_eq!(config.server.command, "python");
    assert_eq!(config.server.args, vec!["server.py"]);
    assert_eq!(config.server.cwd, Some(PathBuf::from("/srv/file")));
    assert_eq!(config.server.env["OPENWEATHERMAP_API_KEY"], "secret");

    let config = resolve(
        &Args::default(),
        json.clone(),
        &[
            ("MCP_SERVER_COMMAND", "node"),
            ("MCP_SERVER_PATH", "/srv/env"),
        ],
    );
    assert_eq!(config.server.command, "node");
    assert!(config.server.args.is_empty());
    assert_eq!(config.server.cwd, Some(PathBuf::from("/srv/env")));

    let args = Args {
        mcp_server: Some("uv:run,weather.py".to_string()),
        ..Args::default()
    };
    let config = resolve(&args, json, &[("MCP_SERVER_COMMAND", "node")]);
    assert_eq!(config.server.command, "uv");
    assert_eq!(config.server.args, vec!["run", "weather.py"]);
    assert_eq!(config.server.display(), "uv run weather.py");
}

#[test]
fn test_no_tools_and_verbose_flags() {
    let args = Args {
        no_tools: true,
        ..Args::default()
    };
    let config = resolve(&args, JsonConfig::default(), &[("AI_VERBOSE", "yes")]);
    assert!(!config.tools_enabled);
    assert!(config.verbose);
    assert!(config.server.inherit_stderr);
}

#[test]
fn test_load_yaml_file() {
    let mut file = temp_file(".yaml");
    write!(
        file,
        r#"
model:
  provider: openai
  model: gpt-4o
  timeout_secs: 30
  retry:
    max_attempts: 3
backend:
  command: weather-mcp
  call_timeout_secs: 5
orchestrator:
  max_iterations: 8
local_tools:
  enabled: false
"#
    )
    .unwrap();

    let json = JsonConfig::load_from(file.path()).unwrap();
    assert_eq!(json.model.provider, Some(Provider::OpenAi));
    assert_eq!(json.model.retry.max_attempts, 3);
    assert_eq!(json.model.retry.initial_backoff_ms, 500);
    assert_eq!(json.backend.connect_timeout_secs, 10);
    assert_eq!(json.orchestrator.max_concurrency, 4);

    let config = resolve(&Args::default(), json, &[("OPENAI_API_KEY", "sk-test")]);
    assert_eq!(config.model.model, "gpt-4o");
    assert_eq!(config.model.timeout, Duration::from_secs(30));
    assert_eq!(config.backend.call_timeout, Duration::from_secs(5));
    assert_eq!(config.orchestrator.max_iterations, 8);
    assert_eq!(config.orchestrator.model_retry.max_attempts, 3);
    assert!(!config.local_tools_enabled);
}

#[test]
fn test_load_json_file_and_bad_file() {
    let mut file = temp_file(".json");
    write!(file, r#"{{"model": {{"model": "phi3"}}}}"#).unwrap();
    let json = JsonConfig::load_from(file.path()).unwrap();
    assert_eq!(json.model.model.as_deref(), Some("phi3"));

    let mut broken = temp_file(".yaml");
    write!(broken, "model: [unclosed").unwrap();
    let err = JsonConfig::load_from(broken.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse YAML config file"));
}

#[test]
fn test_example_config_parses() {
    let json: JsonConfig = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
    assert_eq!(json.model.provider, Some(Provider::Ollama));
    assert_eq!(json.backend.discover_retry.max_attempts, 3);
    assert_eq!(json.orchestrator.max_iterations, 5);
}

#[test]
fn test_init_file_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".mcp2ai.yaml");

    Config::init_file(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), EXAMPLE_CONFIG);

    let err = Config::init_file(&path).unwrap_err();
    assert!(matches!(err, Mcp2AiError::Config(_)));
}

#[test]
fn test_expand_env_var_in_string() {
    let lookup = env_from(&[("HOME_DIR", "/home/me"), ("PORT", "8080")]);
    assert_eq!(
        expand_env_var_in_string_with("${HOME_DIR}/data:${PORT}", &lookup),
        "/home/me/data:8080"
    );
    assert_eq!(
        expand_env_var_in_string_with("${MISSING}-x", &lookup),
        "${MISSING}-x"
    );
    assert_eq!(expand_env_var_in_string_with("plain", &lookup), "plain");
}

#[test]
fn test_parse_server_spec() {
    assert_eq!(
        parse_server_spec("python:server.py, --port ,8080"),
        Some((
            "python".to_string(),
            vec!["server.py".to_string(), "--port".to_string(), "8080".to_string()]
        ))
    );
    assert_eq!(parse_server_spec("weather-mcp"), Some(("weather-mcp".to_string(), vec![])));
    assert_eq!(parse_server_spec("  :x"), None);
}

#[test]
fn test_exit_commands() {
    for input in ["exit", "QUIT", " q "] {
        assert!(is_exit_command(input), "{}", input);
    }
    assert!(!is_exit_command("quite"));
}
